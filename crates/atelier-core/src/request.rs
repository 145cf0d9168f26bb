use serde::{Deserialize, Serialize};

/// A capability an agent can provide.
///
/// A closed set: the planner resolves capabilities to agents through an
/// explicit lookup table rather than open-ended string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Gathers and condenses reference material for downstream agents.
    Research,
    /// Produces prose content.
    Writing,
    /// Polishes and tightens an existing draft.
    Editing,
    /// Reviews a draft and renders a quality verdict.
    Critique,
    /// Designs outlines and section structure.
    Structuring,
    /// Condenses long content into summaries.
    Summarization,
    /// Verifies factual claims against the provided material.
    FactChecking,
    /// Plans the visual treatment of slide-style deliverables.
    VisualDesign,
    /// Writes quizzes and exercises for learning content.
    Assessment,
    /// General-purpose fallback used when no specialist is registered.
    General,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Research => "research",
            Capability::Writing => "writing",
            Capability::Editing => "editing",
            Capability::Critique => "critique",
            Capability::Structuring => "structuring",
            Capability::Summarization => "summarization",
            Capability::FactChecking => "fact_checking",
            Capability::VisualDesign => "visual_design",
            Capability::Assessment => "assessment",
            Capability::General => "general",
        };
        write!(f, "{name}")
    }
}

/// An abstract cost/quality/speed profile for a model invocation.
///
/// Decoupled from any concrete backend: providers map tiers to whatever
/// models they serve. Ordered from cheapest to most capable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheapest and fastest; fine for mechanical transformations.
    Economy,
    /// The workhorse default.
    #[default]
    Standard,
    /// Higher quality for complex reasoning or long-form drafting.
    Advanced,
    /// Best available; reserved for quality-critical work.
    Premium,
}

impl ModelTier {
    /// Flat per-call cost estimate used for budget admission checks.
    pub fn estimated_cost_per_call(&self) -> f64 {
        match self {
            ModelTier::Economy => 0.002,
            ModelTier::Standard => 0.01,
            ModelTier::Advanced => 0.04,
            ModelTier::Premium => 0.12,
        }
    }

    /// Cost per thousand tokens, used to price a completed invocation.
    pub fn cost_per_1k_tokens(&self) -> f64 {
        match self {
            ModelTier::Economy => 0.0005,
            ModelTier::Standard => 0.0025,
            ModelTier::Advanced => 0.01,
            ModelTier::Premium => 0.03,
        }
    }

    /// One tier up, saturating at [`ModelTier::Premium`].
    pub fn escalate(&self) -> ModelTier {
        match self {
            ModelTier::Economy => ModelTier::Standard,
            ModelTier::Standard => ModelTier::Advanced,
            ModelTier::Advanced | ModelTier::Premium => ModelTier::Premium,
        }
    }

    /// One tier down, saturating at [`ModelTier::Economy`].
    pub fn de_escalate(&self) -> ModelTier {
        match self {
            ModelTier::Premium => ModelTier::Advanced,
            ModelTier::Advanced => ModelTier::Standard,
            ModelTier::Standard | ModelTier::Economy => ModelTier::Economy,
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Economy => write!(f, "economy"),
            ModelTier::Standard => write!(f, "standard"),
            ModelTier::Advanced => write!(f, "advanced"),
            ModelTier::Premium => write!(f, "premium"),
        }
    }
}

/// The kind of deliverable a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliverableType {
    /// Long-form prose.
    Essay,
    /// Slide-style content.
    Presentation,
    /// Structured learning content with assessments.
    Course,
    /// Grounded analytical write-up.
    Report,
    /// Anything that doesn't match a known shape.
    #[default]
    General,
}

/// A three-step preference dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// De-prioritized.
    Low,
    /// The default.
    #[default]
    Medium,
    /// Prioritized.
    High,
}

/// Caller preferences that steer model-tier selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Preferences {
    /// How much output quality matters.
    #[serde(default)]
    pub quality: Level,
    /// How much turnaround time matters.
    #[serde(default)]
    pub speed_priority: Level,
    /// How much spend matters.
    #[serde(default)]
    pub cost_sensitivity: Level,
    /// Forbid tool-using invocations even when the request implies them.
    #[serde(default)]
    pub disable_tool_use: bool,
}

/// A caller's high-level content request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    /// Free-text description of what to produce.
    pub task: String,
    /// Explicit deliverable type; detected from the text when absent.
    #[serde(default)]
    pub deliverable_type: Option<DeliverableType>,
    /// Tier-selection preferences.
    #[serde(default)]
    pub preferences: Preferences,
    /// Opaque, already-authenticated caller identifier.
    pub user_id: String,
}

impl ContentRequest {
    /// Creates a request with default preferences and no explicit type.
    pub fn new(task: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            deliverable_type: None,
            preferences: Preferences::default(),
            user_id: user_id.into(),
        }
    }

    /// Sets an explicit deliverable type.
    pub fn with_deliverable(mut self, deliverable: DeliverableType) -> Self {
        self.deliverable_type = Some(deliverable);
        self
    }

    /// Replaces the preferences.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }
}
