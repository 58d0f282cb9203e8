//! In-memory `SessionStore`, used by tests and ephemeral (`--no-persist`) runs.

use crate::store::{SessionStore, SessionStoreError, SessionStoreResult};
use async_trait::async_trait;
use codesm_core::{Message, Session};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, cwd: PathBuf) -> SessionStoreResult<Session> {
        let session = Session::new(uuid::Uuid::new_v4().to_string(), cwd);
        self.sessions.lock().unwrap().insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> SessionStoreResult<Option<Session>> {
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn list_sessions(&self) -> SessionStoreResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.lock().unwrap().values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &str) -> SessionStoreResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))
    }

    async fn add_message(&self, session_id: &str, message: Message) -> SessionStoreResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))?;
        session.push(message);
        Ok(())
    }

    async fn set_title(&self, session_id: &str, title: String) -> SessionStoreResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionStoreError::NotFound(session_id.to_string()))?;
        session.set_title(title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle() {
        let store = InMemorySessionStore::new();
        let session = store.create_session(PathBuf::from("/work")).await.unwrap();
        store.add_message(&session.id, Message::user("hi")).await.unwrap();
        store.set_title(&session.id, "Greeting".into()).await.unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.messages.len(), 1);
        assert_eq!(fetched.title, "Greeting");

        store.delete_session(&session.id).await.unwrap();
        assert!(store.get_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_session_errors() {
        let store = InMemorySessionStore::new();
        let err = store.add_message("missing", Message::user("hi")).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::NotFound(_)));
    }
}
