use atelier_core::{Capability, ModelTier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered, role-specific agent.
///
/// Immutable: definitions are loaded once at startup and owned by the
/// registry. `prompt_template` carries `{task}` and `{context}` slots the
/// executor fills per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Stable registry id, referenced by planned tasks.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Capabilities this agent covers.
    pub capabilities: Vec<Capability>,
    /// The minimum tier this agent works well at.
    pub default_tier: ModelTier,
    /// Role prompt with `{task}` and `{context}` slots.
    pub prompt_template: String,
    /// Output token ceiling for invocations of this agent.
    pub max_tokens: u32,
    /// Sampling temperature for invocations of this agent.
    pub temperature: f32,
    /// Tie-break priority for capability lookups (higher wins).
    pub priority: u8,
}

/// Static catalog of available agents.
///
/// Constructed once at process start as an immutable value and passed
/// explicitly into the planner and engine, so tests can substitute a fake.
pub struct AgentRegistry {
    agents: HashMap<String, AgentDefinition>,
    // Capability -> agent ids, best candidate first.
    by_capability: HashMap<Capability, Vec<String>>,
}

impl AgentRegistry {
    /// Builds a registry from the given definitions.
    ///
    /// Capability lookups are tie-broken by declared priority (higher
    /// first), then by id so resolution stays deterministic.
    pub fn new(definitions: Vec<AgentDefinition>) -> Self {
        let mut by_capability: HashMap<Capability, Vec<(u8, String)>> = HashMap::new();
        for def in &definitions {
            for cap in &def.capabilities {
                by_capability
                    .entry(*cap)
                    .or_default()
                    .push((def.priority, def.id.clone()));
            }
        }
        let by_capability = by_capability
            .into_iter()
            .map(|(cap, mut ids)| {
                ids.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
                (cap, ids.into_iter().map(|(_, id)| id).collect())
            })
            .collect();

        let agents = definitions.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self {
            agents,
            by_capability,
        }
    }

    /// The built-in agent catalog.
    pub fn builtin() -> Self {
        Self::new(builtin_agents())
    }

    /// Looks an agent up by id.
    pub fn get(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.get(id)
    }

    /// The best-fit agent for a capability, or `None` when nothing is
    /// registered for it.
    pub fn find_by_capability(&self, capability: Capability) -> Option<&AgentDefinition> {
        self.by_capability
            .get(&capability)
            .and_then(|ids| ids.first())
            .and_then(|id| self.agents.get(id))
    }

    /// All registered agents, sorted by id.
    pub fn all(&self) -> Vec<&AgentDefinition> {
        let mut agents: Vec<&AgentDefinition> = self.agents.values().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn agent(
    id: &str,
    name: &str,
    capabilities: Vec<Capability>,
    default_tier: ModelTier,
    prompt_template: &str,
    temperature: f32,
) -> AgentDefinition {
    AgentDefinition {
        id: id.to_string(),
        name: name.to_string(),
        capabilities,
        default_tier,
        prompt_template: prompt_template.to_string(),
        max_tokens: 4096,
        temperature,
        priority: 0,
    }
}

/// The default agent catalog used when no custom registry is injected.
pub fn builtin_agents() -> Vec<AgentDefinition> {
    vec![
        agent(
            "researcher",
            "Researcher",
            vec![Capability::Research],
            ModelTier::Standard,
            RESEARCHER_PROMPT,
            0.3,
        ),
        agent(
            "writer",
            "Writer",
            vec![Capability::Writing],
            ModelTier::Standard,
            WRITER_PROMPT,
            0.7,
        ),
        agent(
            "editor",
            "Editor",
            vec![Capability::Editing],
            ModelTier::Economy,
            EDITOR_PROMPT,
            0.3,
        ),
        agent(
            "critic",
            "Critic",
            vec![Capability::Critique],
            ModelTier::Standard,
            CRITIC_PROMPT,
            0.2,
        ),
        agent(
            "outliner",
            "Outliner",
            vec![Capability::Structuring],
            ModelTier::Economy,
            OUTLINER_PROMPT,
            0.4,
        ),
        agent(
            "summarizer",
            "Summarizer",
            vec![Capability::Summarization],
            ModelTier::Economy,
            SUMMARIZER_PROMPT,
            0.3,
        ),
        agent(
            "fact_checker",
            "Fact Checker",
            vec![Capability::FactChecking],
            ModelTier::Standard,
            FACT_CHECKER_PROMPT,
            0.1,
        ),
        agent(
            "slide_designer",
            "Slide Designer",
            vec![Capability::VisualDesign],
            ModelTier::Standard,
            SLIDE_DESIGNER_PROMPT,
            0.5,
        ),
        agent(
            "assessor",
            "Assessor",
            vec![Capability::Assessment],
            ModelTier::Economy,
            ASSESSOR_PROMPT,
            0.4,
        ),
        agent(
            "generalist",
            "Generalist",
            vec![Capability::General],
            ModelTier::Standard,
            GENERALIST_PROMPT,
            0.6,
        ),
    ]
}

const RESEARCHER_PROMPT: &str = "\
You are the research agent in a content production pipeline. Gather the key \
facts, arguments, and reference points a writer will need, and present them \
as a concise, well-organized briefing. Cite where each point comes from when \
you can.

Task: {task}

Prior material:
{context}
";

const WRITER_PROMPT: &str = "\
You are the drafting agent in a content production pipeline. Write clear, \
engaging prose that follows the briefing and outline you were handed. Stay \
on topic and do not invent facts that the research does not support.

Task: {task}

Prior material:
{context}
";

const EDITOR_PROMPT: &str = "\
You are the editing agent in a content production pipeline. Tighten the \
draft you are given: fix grammar, cut repetition, improve flow, and keep \
the author's voice. Return the full edited text, not a list of suggestions.

Task: {task}

Prior material:
{context}
";

const CRITIC_PROMPT: &str = "\
You are the quality-control agent in a content production pipeline. Review \
the draft against the original request. If it is ready to ship, reply with \
APPROVED and one sentence of justification. If it is not, reply with REVISE \
followed by the specific changes required.

Task: {task}

Prior material:
{context}
";

const OUTLINER_PROMPT: &str = "\
You are the structuring agent in a content production pipeline. Design the \
section-by-section structure for the deliverable: headings, the purpose of \
each section, and roughly how much space each deserves.

Task: {task}

Prior material:
{context}
";

const SUMMARIZER_PROMPT: &str = "\
You are the summarization agent in a content production pipeline. Condense \
the material you are handed into a faithful executive summary. Keep every \
load-bearing claim and drop everything else.

Task: {task}

Prior material:
{context}
";

const FACT_CHECKER_PROMPT: &str = "\
You are the fact-checking agent in a content production pipeline. Verify \
each factual claim in the material against the provided sources. Flag every \
claim you cannot verify.

Task: {task}

Prior material:
{context}
";

const SLIDE_DESIGNER_PROMPT: &str = "\
You are the visual-design agent in a content production pipeline. Turn the \
content into a slide-by-slide treatment: title, key message, and suggested \
visual for each slide.

Task: {task}

Prior material:
{context}
";

const ASSESSOR_PROMPT: &str = "\
You are the assessment agent in a content production pipeline. Write quiz \
questions and exercises that test the learning objectives of the material, \
with an answer key.

Task: {task}

Prior material:
{context}
";

const GENERALIST_PROMPT: &str = "\
You are a general-purpose content agent. Complete the task directly and \
competently, using any prior material you are handed.

Task: {task}

Prior material:
{context}
";
