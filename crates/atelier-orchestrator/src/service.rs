use crate::engine::{Orchestrator, SessionEvent};
use atelier_core::{AtelierError, AtelierResult, ContentRequest, OrchestrationSession};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Front door for session lifecycle management.
///
/// Wraps an [`Orchestrator`] with background submission, per-session
/// cancellation, and lookup against the shared store. One service instance
/// handles many concurrent sessions.
pub struct OrchestrationService {
    engine: Arc<Orchestrator>,
    cancellations: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

impl OrchestrationService {
    /// Creates a service over the given engine.
    pub fn new(engine: Arc<Orchestrator>) -> Self {
        Self {
            engine,
            cancellations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Accepts a request and starts executing it in the background.
    ///
    /// Returns the session id immediately; progress is observable via
    /// [`subscribe`](Self::subscribe) and [`get`](Self::get).
    pub async fn submit(&self, request: ContentRequest) -> AtelierResult<Uuid> {
        let session = OrchestrationSession::new(request);
        let session_id = session.id;
        self.engine.store().create(&session).await?;

        let token = CancellationToken::new();
        self.cancellations
            .write()
            .await
            .insert(session_id, token.clone());
        info!(%session_id, "session submitted");

        let engine = Arc::clone(&self.engine);
        let cancellations = Arc::clone(&self.cancellations);
        tokio::spawn(async move {
            if let Err(e) = engine.run_session(session, token).await {
                error!(%session_id, error = %e, "session run aborted on infrastructure error");
            }
            cancellations.write().await.remove(&session_id);
        });

        Ok(session_id)
    }

    /// Runs a request to completion on the caller's task.
    pub async fn run_blocking(
        &self,
        request: ContentRequest,
    ) -> AtelierResult<OrchestrationSession> {
        self.engine.run(request).await
    }

    /// Looks up a session by id.
    pub async fn get(&self, session_id: Uuid) -> AtelierResult<OrchestrationSession> {
        self.engine
            .store()
            .get(session_id)
            .await?
            .ok_or_else(|| AtelierError::Session(format!("session {session_id} not found")))
    }

    /// Lists all known session ids.
    pub async fn list(&self) -> AtelierResult<Vec<Uuid>> {
        self.engine.store().list().await
    }

    /// Requests cancellation of a running session.
    ///
    /// Idempotent; returns `false` when the session is not running (unknown
    /// id or already terminal).
    pub async fn cancel(&self, session_id: Uuid) -> bool {
        let cancellations = self.cancellations.read().await;
        match cancellations.get(&session_id) {
            Some(token) => {
                info!(%session_id, "cancellation requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Subscribes to incremental events across all sessions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.engine.subscribe()
    }
}
