//! The capability-provider boundary of the Atelier engine.
//!
//! A capability provider is whatever language-model backend actually serves
//! an invocation. The engine only ever sees the [`CapabilityProvider`]
//! trait: any backend satisfying it is pluggable without touching the
//! orchestrator.
//!
//! # Main types
//!
//! - [`CapabilityProvider`] — The `invoke`/`invoke_stream` contract.
//! - [`InvokeOptions`] / [`ProviderResponse`] — The wire shape of one call.
//! - [`StreamEvent`] — Incremental output chunks with a terminal event.
//! - [`RetryPolicy`] — Exponential backoff with jitter for transient failures.

/// Provider trait, invocation options, and streaming events.
pub mod provider;
/// Failure classification and backoff policy.
pub mod retry;

pub use provider::{CapabilityProvider, InvokeOptions, ProviderResponse, StreamEvent};
pub use retry::{classify_failure, RetryPolicy};
