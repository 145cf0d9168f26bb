//! Multi-agent content orchestration engine.
//!
//! Turns a raw content request into a dependency-ordered execution plan of
//! specialist agent invocations, runs it phase by phase under a concurrency
//! cap with retries and budget enforcement, and assembles the surviving
//! outputs into a deliverable with a full execution trace.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Session state machine: analyze, plan, execute, assemble.
//! - [`OrchestrationService`] — Background submission, lookup, and cancellation.
//! - [`Planner`] — Workflow-template planner over the agent registry.
//! - [`AgentRegistry`] — Capability-indexed catalog of agent definitions.
//! - [`AgentExecutor`] — Single-task runner with timeout, retry, and backoff.
//! - [`CostMonitor`] — Per-session budget admission and charging.

/// Request classification.
pub mod analyzer;
/// Per-session budget enforcement.
pub mod budget;
/// Orchestration engine and session state machine.
pub mod engine;
/// Single-task execution with retry and timeout.
pub mod executor;
/// Workflow-template execution planning.
pub mod planner;
/// Agent definitions and capability index.
pub mod registry;
/// Model-tier selection rules.
pub mod selector;
/// Session lifecycle service.
pub mod service;

pub use analyzer::analyze;
pub use budget::CostMonitor;
pub use engine::{Orchestrator, OrchestratorConfig, SessionEvent, SessionEventKind};
pub use executor::{AgentExecutor, HandoffContext, TaskOutcome};
pub use planner::{Planner, PlannerConfig};
pub use registry::{builtin_agents, AgentDefinition, AgentRegistry};
pub use selector::{select_tier, tier_for_task};
pub use service::OrchestrationService;
