use crate::request::ModelTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// State of a planned task within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Not yet dispatched.
    Pending,
    /// Dispatched, awaiting a terminal outcome.
    Running,
    /// Final attempt succeeded.
    Completed,
    /// Permanently failed (or retries exhausted).
    Failed {
        /// Why the task failed.
        reason: String,
    },
    /// Never dispatched (budget refusal), recorded explicitly.
    Skipped {
        /// Why the task was skipped.
        reason: String,
    },
    /// Abandoned because the session was cancelled.
    Cancelled,
}

impl TaskState {
    /// Whether this state is terminal for phase-barrier purposes.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }
}

/// Append-only record of one agent invocation attempt.
///
/// Every attempt — including failed ones — produces a record; the trace is
/// a complete audit log, not just the winning attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    /// Unique record id.
    pub id: Uuid,
    /// The task this attempt belongs to.
    pub task_id: Uuid,
    /// The agent that executed the attempt.
    pub agent_id: String,
    /// Tier the attempt ran at.
    pub model_tier: ModelTier,
    /// Zero-based attempt index within the task.
    pub attempt: u32,
    /// The full prompt sent to the provider.
    pub input: String,
    /// The provider's text output, when the attempt succeeded.
    pub output: Option<String>,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Failure description, when the attempt failed.
    pub error: Option<String>,
    /// Tokens consumed by the attempt.
    pub tokens_used: u64,
    /// Wall-clock latency of the provider call.
    pub latency_ms: u64,
    /// Actual cost charged for the attempt (zero for failures).
    pub cost: f64,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
    /// Tools the provider reported using.
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Source references the provider reported.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Running cost aggregate for one session.
///
/// Mutated only by the orchestrator's single serialized aggregation path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Total cost across all successful executions.
    pub total: f64,
    /// Cost keyed by agent id.
    #[serde(default)]
    pub by_agent: HashMap<String, f64>,
    /// Cost keyed by model tier.
    #[serde(default)]
    pub by_tier: HashMap<ModelTier, f64>,
    /// Cost keyed by phase id.
    #[serde(default)]
    pub by_phase: HashMap<Uuid, f64>,
}

impl CostBreakdown {
    /// Records the cost of one successful execution.
    pub fn record(&mut self, agent_id: &str, tier: ModelTier, phase_id: Uuid, cost: f64) {
        self.total += cost;
        *self.by_agent.entry(agent_id.to_string()).or_insert(0.0) += cost;
        *self.by_tier.entry(tier).or_insert(0.0) += cost;
        *self.by_phase.entry(phase_id).or_insert(0.0) += cost;
    }
}
