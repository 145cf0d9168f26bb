//! Core types and error definitions for the Atelier orchestration engine.
//!
//! This crate provides the foundational types shared across all Atelier
//! crates: the unified error enum, the content request model, and the
//! orchestration data model (analysis, plan, execution trace, session).
//!
//! # Main types
//!
//! - [`AtelierError`] — Unified error enum for all Atelier subsystems.
//! - [`AtelierResult`] — Convenience alias for `Result<T, AtelierError>`.
//! - [`ContentRequest`] — A caller's high-level content request.
//! - [`TaskAnalysis`] — Classification of a request into capabilities and complexity.
//! - [`ExecutionPlan`] — Dependency-ordered phases of agent tasks.
//! - [`AgentExecution`] — Append-only record of one agent invocation attempt.
//! - [`OrchestrationSession`] — The aggregate root for one in-flight request.

/// Unified error enum and domain error payloads.
pub mod error;
/// One agent attempt record, task states, and cost aggregation.
pub mod execution;
/// Execution plans: analysis, tasks, and phases.
pub mod plan;
/// Content requests, preferences, capability tags, and model tiers.
pub mod request;
/// The orchestration session aggregate and its result.
pub mod session;

pub use error::{AtelierError, AtelierResult, FailureKind, PlanningError};
pub use execution::{AgentExecution, CostBreakdown, TaskState};
pub use plan::{AgentTask, Complexity, ExecutionPhase, ExecutionPlan, TaskAnalysis};
pub use request::{Capability, ContentRequest, DeliverableType, Level, ModelTier, Preferences};
pub use session::{OrchestrationResult, OrchestrationSession, ResultMetadata, SessionStatus};
