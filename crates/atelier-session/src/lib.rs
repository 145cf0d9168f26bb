//! Durable storage boundary for orchestration sessions.
//!
//! No orchestration logic lives here: the engine persists and retrieves
//! [`atelier_core::OrchestrationSession`] records through the
//! [`SessionStore`] trait and nothing else.

/// Session store trait and its memory/file implementations.
pub mod store;

pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
