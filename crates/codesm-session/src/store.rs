//! The `SessionStore` trait shared by the SQLite and in-memory backends.

use async_trait::async_trait;
use codesm_core::Session;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// Persistent, file-backed storage keyed by session id.
///
/// `add_message` appends one message and saves atomically: implementations
/// must not leave a session readable in a partially-written state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, cwd: std::path::PathBuf) -> SessionStoreResult<Session>;

    async fn get_session(&self, session_id: &str) -> SessionStoreResult<Option<Session>>;

    async fn list_sessions(&self) -> SessionStoreResult<Vec<Session>>;

    async fn delete_session(&self, session_id: &str) -> SessionStoreResult<()>;

    async fn add_message(
        &self,
        session_id: &str,
        message: codesm_core::Message,
    ) -> SessionStoreResult<()>;

    async fn set_title(&self, session_id: &str, title: String) -> SessionStoreResult<()>;
}
