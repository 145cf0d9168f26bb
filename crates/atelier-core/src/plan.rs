use crate::request::{Capability, DeliverableType, ModelTier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// How demanding a request is, estimated by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Short, single-part ask.
    Simple,
    /// The default when classification is uncertain.
    Moderate,
    /// Long or multi-part ask, or one requiring factual grounding.
    Complex,
}

/// The analyzer's classification of a content request.
///
/// Immutable once produced; consumed only by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAnalysis {
    /// Detected (or caller-supplied) deliverable type.
    pub deliverable_type: DeliverableType,
    /// Capabilities a complete plan must cover.
    pub required_capabilities: Vec<Capability>,
    /// Complexity estimate steering tier selection.
    pub complexity: Complexity,
    /// How many agent invocations the plan is expected to need.
    pub estimated_agent_count: usize,
    /// Whether any agent will need tool use (e.g. retrieval).
    pub requires_tool_use: bool,
}

/// One planned agent invocation.
///
/// Never mutated after planning: a retry produces a new attempt record,
/// not a task mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    /// Unique task id, referenced by dependent tasks.
    pub id: Uuid,
    /// The registry id of the agent that will execute this task.
    pub agent_id: String,
    /// The task-specific portion of the prompt.
    pub prompt_input: String,
    /// Tier selected for this invocation.
    pub model_tier: ModelTier,
    /// Ids of tasks in strictly earlier phases whose outputs feed this one.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    /// Retries allowed on transient failure (attempts = retries + 1).
    pub max_retries: u32,
    /// Per-attempt provider-call timeout.
    pub timeout_ms: u64,
    /// Tie-break priority within a phase (higher first).
    #[serde(default)]
    pub priority: u8,
}

impl AgentTask {
    /// Creates a task with a fresh id and no dependencies.
    pub fn new(
        agent_id: impl Into<String>,
        prompt_input: impl Into<String>,
        model_tier: ModelTier,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            prompt_input: prompt_input.into(),
            model_tier,
            dependencies: Vec::new(),
            max_retries: 2,
            timeout_ms: 60_000,
            priority: 0,
        }
    }

    /// Sets the dependency list.
    pub fn with_dependencies(mut self, deps: Vec<Uuid>) -> Self {
        self.dependencies = deps;
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A barrier-synchronized group of tasks.
///
/// The orchestrator never dispatches phase N+1 until every task in
/// phase N has reached a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPhase {
    /// Unique phase id.
    pub id: Uuid,
    /// Short name ("research", "drafting", ...), used in logs and cost keys.
    pub name: String,
    /// Whether tasks in this phase may run concurrently.
    pub parallel: bool,
    /// The tasks this phase contains.
    pub tasks: Vec<AgentTask>,
    /// Ids of phases whose completion this phase waits on.
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
}

impl ExecutionPhase {
    /// Creates an empty phase.
    pub fn new(name: impl Into<String>, parallel: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parallel,
            tasks: Vec::new(),
            depends_on: Vec::new(),
        }
    }
}

/// An ordered list of phases produced by the planner.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionPlan {
    /// Phases in dispatch order.
    pub phases: Vec<ExecutionPhase>,
}

impl ExecutionPlan {
    /// Total number of tasks across all phases.
    pub fn task_count(&self) -> usize {
        self.phases.iter().map(|p| p.tasks.len()).sum()
    }

    /// Iterate over every task in phase order.
    pub fn tasks(&self) -> impl Iterator<Item = &AgentTask> {
        self.phases.iter().flat_map(|p| p.tasks.iter())
    }

    /// Checks that the plan graph is acyclic and phase-monotonic.
    ///
    /// Every task dependency must resolve to a task in a strictly earlier
    /// phase, and every phase dependency to an earlier phase. A plan that
    /// fails this check must never reach the orchestrator.
    pub fn validate(&self) -> Result<(), String> {
        let mut earlier_tasks: HashSet<Uuid> = HashSet::new();
        let mut earlier_phases: HashSet<Uuid> = HashSet::new();

        for phase in &self.phases {
            for dep in &phase.depends_on {
                if !earlier_phases.contains(dep) {
                    return Err(format!(
                        "phase '{}' depends on phase {dep} which is not earlier",
                        phase.name
                    ));
                }
            }
            for task in &phase.tasks {
                for dep in &task.dependencies {
                    if !earlier_tasks.contains(dep) {
                        return Err(format!(
                            "task {} in phase '{}' depends on task {dep} not in an earlier phase",
                            task.id, phase.name
                        ));
                    }
                }
            }
            // Barrier semantics: tasks only become visible to later phases.
            for task in &phase.tasks {
                earlier_tasks.insert(task.id);
            }
            earlier_phases.insert(phase.id);
        }
        Ok(())
    }
}
