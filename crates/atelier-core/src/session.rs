use crate::execution::{AgentExecution, CostBreakdown, TaskState};
use crate::plan::{ExecutionPlan, TaskAnalysis};
use crate::request::ContentRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle of an orchestration session.
///
/// `Planning -> Executing -> {Completed, Failed}`; terminal states have no
/// outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Analyzing the request and producing a plan.
    Planning,
    /// Walking the plan phase by phase.
    Executing,
    /// All phases terminal and assembly succeeded.
    Completed,
    /// Planning error, dependency-critical task failure, or cancellation.
    Failed,
}

impl SessionStatus {
    /// Whether the session can transition no further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// Flags describing how complete the deliverable is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// True when any non-critical task was skipped or failed.
    pub partial: bool,
    /// Tasks refused dispatch by the budget check.
    pub skipped_tasks: u32,
    /// Tasks that ended in permanent failure.
    pub failed_tasks: u32,
    /// True when quality control triggered its single re-run.
    pub quality_rerun: bool,
}

/// The terminal outcome handed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Whether the session reached `Completed`.
    pub success: bool,
    /// The assembled deliverable, when one could be produced.
    pub deliverable: Option<String>,
    /// One-line human-readable outcome summary.
    pub summary: String,
    /// Partial/degraded-mode flags.
    #[serde(default)]
    pub metadata: ResultMetadata,
}

/// The aggregate root for one orchestrated request.
///
/// Owned exclusively by the orchestrator while in flight; persisted for
/// audit and replay after completion. The `trace` is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSession {
    /// Unique session id, returned to the caller at submit time.
    pub id: Uuid,
    /// The caller this session belongs to.
    pub user_id: String,
    /// The original request.
    pub request: ContentRequest,
    /// Analyzer output, set before planning.
    pub analysis: Option<TaskAnalysis>,
    /// Planner output, set on entering `Executing`.
    pub plan: Option<ExecutionPlan>,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Append-only record of every invocation attempt.
    #[serde(default)]
    pub trace: Vec<AgentExecution>,
    /// Per-task terminal/running states.
    #[serde(default)]
    pub task_states: HashMap<Uuid, TaskState>,
    /// Running cost aggregate.
    #[serde(default)]
    pub cost: CostBreakdown,
    /// Terminal result, written exactly once.
    pub result: Option<OrchestrationResult>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl OrchestrationSession {
    /// Creates a session in `Planning` for the given request.
    pub fn new(request: ContentRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            request,
            analysis: None,
            plan: None,
            status: SessionStatus::Planning,
            trace: Vec::new(),
            task_states: HashMap::new(),
            cost: CostBreakdown::default(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Records the analyzer output.
    pub fn set_analysis(&mut self, analysis: TaskAnalysis) {
        self.analysis = Some(analysis);
        self.touch();
    }

    /// Records the plan and moves `Planning -> Executing`.
    ///
    /// Returns `false` without mutating when the session is not in
    /// `Planning`.
    pub fn mark_executing(&mut self, plan: ExecutionPlan) -> bool {
        if self.status != SessionStatus::Planning {
            return false;
        }
        for task in plan.tasks() {
            self.task_states.insert(task.id, TaskState::Pending);
        }
        self.plan = Some(plan);
        self.status = SessionStatus::Executing;
        self.touch();
        true
    }

    /// Appends one attempt record to the trace.
    pub fn record_execution(&mut self, execution: AgentExecution) {
        self.trace.push(execution);
        self.touch();
    }

    /// Updates a task's state.
    pub fn set_task_state(&mut self, task_id: Uuid, state: TaskState) {
        self.task_states.insert(task_id, state);
        self.touch();
    }

    /// Moves to `Completed` with the given result. One-shot: returns
    /// `false` if the session is already terminal.
    pub fn complete(&mut self, result: OrchestrationResult) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SessionStatus::Completed;
        self.result = Some(result);
        self.touch();
        true
    }

    /// Moves to `Failed` with a failure result. One-shot: returns `false`
    /// if the session is already terminal.
    pub fn fail(&mut self, summary: impl Into<String>, metadata: ResultMetadata) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SessionStatus::Failed;
        self.result = Some(OrchestrationResult {
            success: false,
            deliverable: None,
            summary: summary.into(),
            metadata,
        });
        self.touch();
        true
    }

    /// Attempt records belonging to one task, in append order.
    pub fn attempts_for(&self, task_id: Uuid) -> Vec<&AgentExecution> {
        self.trace.iter().filter(|e| e.task_id == task_id).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::plan::{AgentTask, ExecutionPhase};
    use crate::request::ModelTier;

    fn session() -> OrchestrationSession {
        OrchestrationSession::new(ContentRequest::new("Write an essay", "user-1"))
    }

    fn one_task_plan() -> (ExecutionPlan, Uuid) {
        let task = AgentTask::new("writer", "draft", ModelTier::Standard);
        let task_id = task.id;
        let mut phase = ExecutionPhase::new("drafting", false);
        phase.tasks.push(task);
        (
            ExecutionPlan {
                phases: vec![phase],
            },
            task_id,
        )
    }

    #[test]
    fn test_new_session_is_planning() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Planning);
        assert!(s.trace.is_empty());
        assert!(s.result.is_none());
    }

    #[test]
    fn test_mark_executing_seeds_task_states() {
        let mut s = session();
        let (plan, task_id) = one_task_plan();
        assert!(s.mark_executing(plan));
        assert_eq!(s.status, SessionStatus::Executing);
        assert_eq!(s.task_states[&task_id], TaskState::Pending);
    }

    #[test]
    fn test_mark_executing_only_from_planning() {
        let mut s = session();
        let (plan, _) = one_task_plan();
        assert!(s.mark_executing(plan.clone()));
        assert!(!s.mark_executing(plan));
    }

    #[test]
    fn test_terminal_transitions_are_one_shot() {
        let mut s = session();
        assert!(s.fail("planner rejected request", ResultMetadata::default()));
        assert_eq!(s.status, SessionStatus::Failed);

        // No transition out of a terminal state.
        assert!(!s.complete(OrchestrationResult {
            success: true,
            deliverable: Some("text".into()),
            summary: "done".into(),
            metadata: ResultMetadata::default(),
        }));
        assert_eq!(s.status, SessionStatus::Failed);
        assert!(!s.result.as_ref().unwrap().success);
    }

    #[test]
    fn test_complete_writes_result_once() {
        let mut s = session();
        let (plan, _) = one_task_plan();
        s.mark_executing(plan);
        assert!(s.complete(OrchestrationResult {
            success: true,
            deliverable: Some("the essay".into()),
            summary: "1/1 tasks completed".into(),
            metadata: ResultMetadata::default(),
        }));
        assert!(!s.fail("late failure", ResultMetadata::default()));
        assert_eq!(s.status, SessionStatus::Completed);
    }

    #[test]
    fn test_session_serialization_round_trip() {
        let mut s = session();
        let (plan, task_id) = one_task_plan();
        s.mark_executing(plan);
        s.set_task_state(task_id, TaskState::Completed);
        let json = serde_json::to_string(&s).unwrap();
        let parsed: OrchestrationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, s.id);
        assert_eq!(parsed.task_states[&task_id], TaskState::Completed);
    }
}
