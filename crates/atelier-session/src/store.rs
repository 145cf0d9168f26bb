use atelier_core::{AtelierError, AtelierResult, OrchestrationSession};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persists and retrieves orchestration sessions by id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session.
    async fn create(&self, session: &OrchestrationSession) -> AtelierResult<()>;
    /// Fetches a session by id, `None` when unknown.
    async fn get(&self, id: Uuid) -> AtelierResult<Option<OrchestrationSession>>;
    /// Overwrites an existing session (idempotent over `create`).
    async fn update(&self, session: &OrchestrationSession) -> AtelierResult<()>;
    /// Lists all stored session ids.
    async fn list(&self) -> AtelierResult<Vec<Uuid>>;
}

/// In-memory session store. The default for tests and embedded use.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, OrchestrationSession>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &OrchestrationSession) -> AtelierResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AtelierResult<Option<OrchestrationSession>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn update(&self, session: &OrchestrationSession) -> AtelierResult<()> {
        self.create(session).await
    }

    async fn list(&self) -> AtelierResult<Vec<Uuid>> {
        Ok(self.sessions.read().await.keys().copied().collect())
    }
}

/// File-based session store: one pretty-printed JSON file per session.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Creates the store, ensuring the directory exists.
    pub async fn new(dir: PathBuf) -> AtelierResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, session: &OrchestrationSession) -> AtelierResult<()> {
        let path = self.session_path(session.id);
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AtelierResult<Option<OrchestrationSession>> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let session: OrchestrationSession = serde_json::from_str(&data)
            .map_err(|e| AtelierError::Session(format!("failed to parse session {id}: {e}")))?;
        Ok(Some(session))
    }

    async fn update(&self, session: &OrchestrationSession) -> AtelierResult<()> {
        self.create(session).await
    }

    async fn list(&self) -> AtelierResult<Vec<Uuid>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(id) = stem.parse::<Uuid>() {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}
