//! SQLite-backed `SessionStore`, the default persistence layer.

use crate::store::{SessionStore, SessionStoreError, SessionStoreResult};
use async_trait::async_trait;
use codesm_core::{Message, Role, Session};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub async fn connect(path: PathBuf) -> SessionStoreResult<Self> {
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&path)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            apply_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| SessionStoreError::Backend(format!("spawn_blocking join error: {e}")))?
        .map_err(|e| SessionStoreError::Backend(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens the default store location: `$XDG_DATA_HOME/codesm/sessions.db`.
    pub async fn connect_default() -> SessionStoreResult<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| SessionStoreError::Backend("no data directory available".into()))?
            .join("codesm");
        std::fs::create_dir_all(&dir).map_err(|e| SessionStoreError::Backend(e.to_string()))?;
        Self::connect(dir.join("sessions.db")).await
    }

    async fn run_blocking<F, R>(&self, f: F) -> SessionStoreResult<R>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn_arc = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn_arc.lock().unwrap();
            f(&mut conn)
        })
        .await
        .map_err(|e| SessionStoreError::Backend(format!("spawn_blocking join error: {e}")))?
        .map_err(|e| SessionStoreError::Backend(e.to_string()))
    }
}

fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            cwd TEXT NOT NULL,
            title TEXT NOT NULL,
            title_generated INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            tool_calls_json TEXT NOT NULL,
            tool_call_id TEXT,
            attributes_json TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, sort_order);
        "#,
    )
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::System => "system",
    }
}

fn role_from_str(s: &str) -> Role {
    match s {
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        "system" => Role::System,
        _ => Role::User,
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let role_str: String = row.get(0)?;
    let content: String = row.get(1)?;
    let tool_calls_json: String = row.get(2)?;
    let tool_call_id: Option<String> = row.get(3)?;
    let attributes_json: String = row.get(4)?;
    let timestamp: String = row.get(5)?;

    Ok(Message {
        role: role_from_str(&role_str),
        content,
        tool_calls: serde_json::from_str(&tool_calls_json).unwrap_or_default(),
        tool_call_id,
        timestamp: timestamp.parse().unwrap_or_else(|_| chrono::Utc::now()),
        attributes: serde_json::from_str(&attributes_json).unwrap_or_default(),
    })
}

fn load_session_row(row: &rusqlite::Row) -> rusqlite::Result<(String, PathBuf, String, bool, String, String)> {
    Ok((
        row.get(0)?,
        PathBuf::from(row.get::<_, String>(1)?),
        row.get(2)?,
        row.get::<_, i64>(3)? != 0,
        row.get(4)?,
        row.get(5)?,
    ))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, cwd: PathBuf) -> SessionStoreResult<Session> {
        let session = Session::new(uuid::Uuid::new_v4().to_string(), cwd);
        let s = session.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, cwd, title, title_generated, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    s.id,
                    s.cwd.to_string_lossy(),
                    s.title,
                    s.title_generated as i64,
                    s.created_at.to_rfc3339(),
                    s.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> SessionStoreResult<Option<Session>> {
        let id = session_id.to_string();
        let id_for_messages = id.clone();
        let meta = self
            .run_blocking(move |conn| {
                conn.query_row(
                    "SELECT id, cwd, title, title_generated, created_at, updated_at FROM sessions WHERE id = ?",
                    params![id],
                    load_session_row,
                )
                .optional()
            })
            .await?;

        let Some((id, cwd, title, title_generated, created_at, updated_at)) = meta else {
            return Ok(None);
        };

        let messages = self
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT role, content, tool_calls_json, tool_call_id, attributes_json, timestamp
                     FROM messages WHERE session_id = ? ORDER BY sort_order ASC",
                )?;
                let rows = stmt.query_map(params![id_for_messages], row_to_message)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        Ok(Some(Session {
            id,
            cwd,
            title,
            messages,
            created_at: created_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: updated_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
            title_generated,
        }))
    }

    async fn list_sessions(&self) -> SessionStoreResult<Vec<Session>> {
        let rows = self
            .run_blocking(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, cwd, title, title_generated, created_at, updated_at FROM sessions ORDER BY updated_at DESC",
                )?;
                let rows = stmt.query_map([], load_session_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, cwd, title, title_generated, created_at, updated_at)| Session {
                id,
                cwd,
                title,
                messages: Vec::new(),
                created_at: created_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
                updated_at: updated_at.parse().unwrap_or_else(|_| chrono::Utc::now()),
                title_generated,
            })
            .collect())
    }

    async fn delete_session(&self, session_id: &str) -> SessionStoreResult<()> {
        let id = session_id.to_string();
        let affected = self
            .run_blocking(move |conn| conn.execute("DELETE FROM sessions WHERE id = ?", params![id]))
            .await?;
        if affected == 0 {
            return Err(SessionStoreError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn add_message(&self, session_id: &str, message: Message) -> SessionStoreResult<()> {
        let id = session_id.to_string();
        let tool_calls_json = serde_json::to_string(&message.tool_calls)
            .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;
        let attributes_json = serde_json::to_string(&message.attributes)
            .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;

        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            let next_order: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM messages WHERE session_id = ?",
                params![id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO messages (session_id, sort_order, role, content, tool_calls_json, tool_call_id, attributes_json, timestamp)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id,
                    next_order,
                    role_to_str(message.role),
                    message.content,
                    tool_calls_json,
                    message.tool_call_id,
                    attributes_json,
                    message.timestamp.to_rfc3339(),
                ],
            )?;
            tx.execute(
                "UPDATE sessions SET updated_at = ? WHERE id = ?",
                params![chrono::Utc::now().to_rfc3339(), id],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn set_title(&self, session_id: &str, title: String) -> SessionStoreResult<()> {
        let id = session_id.to_string();
        let affected = self
            .run_blocking(move |conn| {
                conn.execute(
                    "UPDATE sessions SET title = ?, title_generated = 1 WHERE id = ? AND title_generated = 0",
                    params![title, id],
                )
            })
            .await?;
        if affected == 0 {
            tracing::debug!(session_id, "set_title: already generated, ignoring");
        }
        Ok(())
    }
}

#[allow(dead_code)]
fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("codesm").join("sessions.db"))
}

#[allow(dead_code)]
fn is_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn store() -> SqliteSessionStore {
        SqliteSessionStore::connect(PathBuf::from(":memory:")).await.unwrap()
    }

    #[tokio::test]
    async fn create_and_fetch_round_trips() {
        let store = store().await;
        let session = store.create_session(PathBuf::from("/work")).await.unwrap();
        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.cwd, PathBuf::from("/work"));
        assert!(fetched.messages.is_empty());
    }

    #[tokio::test]
    async fn add_message_persists_and_preserves_order() {
        let store = store().await;
        let session = store.create_session(PathBuf::from("/work")).await.unwrap();
        store.add_message(&session.id, Message::user("hello")).await.unwrap();
        store.add_message(&session.id, Message::assistant("hi there")).await.unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(fetched.messages[0].content, "hello");
        assert_eq!(fetched.messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn set_title_is_idempotent() {
        let store = store().await;
        let session = store.create_session(PathBuf::from("/work")).await.unwrap();
        store.set_title(&session.id, "First title".into()).await.unwrap();
        store.set_title(&session.id, "Second title".into()).await.unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "First title");
        assert!(fetched.title_generated);
    }

    #[tokio::test]
    async fn delete_session_removes_its_messages() {
        let store = store().await;
        let session = store.create_session(PathBuf::from("/work")).await.unwrap();
        store.add_message(&session.id, Message::user("hello")).await.unwrap();
        store.delete_session(&session.id).await.unwrap();
        assert!(store.get_session(&session.id).await.unwrap().is_none());
    }
}
