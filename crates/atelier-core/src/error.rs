use crate::request::Capability;
use serde::{Deserialize, Serialize};

/// A convenience `Result` alias using [`AtelierError`].
pub type AtelierResult<T> = Result<T, AtelierError>;

/// Top-level error type for the Atelier engine.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum AtelierError {
    /// The planner could not produce a valid execution plan. Fatal for the
    /// session, never retried.
    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    /// A capability-provider invocation failed. The [`FailureKind`] decides
    /// whether the executor retries.
    #[error("Invocation error ({kind}): {message}")]
    Invocation {
        /// Transient failures are retried; permanent ones are not.
        kind: FailureKind,
        /// Human-readable failure description.
        message: String,
    },

    /// A task was refused dispatch because it would exceed the session budget.
    #[error("Budget exceeded: spent {spent:.4} of limit {limit:.4}")]
    BudgetExceeded {
        /// Total already charged to the session.
        spent: f64,
        /// The configured budget limit.
        limit: f64,
    },

    /// An error from a capability provider outside the invocation contract.
    #[error("Provider error: {0}")]
    Provider(String),

    /// An error related to session persistence or lookup.
    #[error("Session error: {0}")]
    Session(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons the planner can reject a request outright.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PlanningError {
    /// No registered agent covers the capability and no general-purpose
    /// substitute is available.
    #[error("no registered agent for capability '{0}'")]
    MissingCapability(Capability),

    /// The plan would exceed the configured task ceiling. Rejected, never
    /// silently truncated.
    #[error("plan requires {tasks} tasks, exceeding the ceiling of {max}")]
    PlanTooLarge {
        /// Number of tasks the plan would contain.
        tasks: usize,
        /// The configured ceiling.
        max: usize,
    },

    /// The produced graph violated phase-monotonic dependency ordering.
    #[error("invalid plan graph: {0}")]
    InvalidGraph(String),
}

/// Classification of an invocation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Timeout, rate limit, or 5xx-equivalent. Worth retrying with backoff.
    Transient,
    /// Invalid input or policy rejection. Retrying cannot succeed.
    Permanent,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_error_display() {
        let err = PlanningError::PlanTooLarge { tasks: 20, max: 12 };
        assert_eq!(
            err.to_string(),
            "plan requires 20 tasks, exceeding the ceiling of 12"
        );
    }

    #[test]
    fn test_missing_capability_display() {
        let err = AtelierError::Planning(PlanningError::MissingCapability(Capability::Research));
        assert!(err.to_string().contains("research"));
    }

    #[test]
    fn test_invocation_error_carries_kind() {
        let err = AtelierError::Invocation {
            kind: FailureKind::Transient,
            message: "429 rate limited".to_string(),
        };
        assert!(err.to_string().contains("transient"));
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_string(&FailureKind::Permanent).unwrap();
        assert_eq!(json, "\"permanent\"");
    }
}
