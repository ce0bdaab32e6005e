use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cognition_core::{
    CognitionError, Message, NewMessage, Result, Role, Scope, Session, SessionConfig,
    SessionStatus,
};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::backend::{internal, unavailable, MessagePage, SessionPatch, StorageBackend};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id             TEXT PRIMARY KEY,
    workspace_path TEXT NOT NULL DEFAULT '',
    title          TEXT,
    thread_id      TEXT NOT NULL,
    status         TEXT NOT NULL,
    config         TEXT NOT NULL,
    scopes         TEXT NOT NULL,
    message_count  INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_workspace ON sessions(workspace_path);

CREATE TABLE IF NOT EXISTS messages (
    id            TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    role          TEXT NOT NULL,
    content       TEXT,
    parent_id     TEXT,
    tool_calls    TEXT,
    tool_call_id  TEXT,
    token_count   INTEGER,
    model_used    TEXT,
    metadata      TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_session_created ON messages(session_id, created_at);

CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT PRIMARY KEY,
    blob      BLOB NOT NULL
);
"#;

/// Embedded backend (§4.1, §6.3): one `rusqlite::Connection` behind a
/// `Mutex`, WAL mode, blocking calls dispatched via `spawn_blocking`
/// (mirrors the unified-connection pattern used by comparable embedded
/// session stores in the example pack).
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(internal)?
        .map_err(internal)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("sqlite connection mutex poisoned");
            f(&conn)
        })
        .await
        .map_err(internal)?
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::DatabaseBusy
                    || err.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                unavailable(e)
            }
            other => internal(other),
        })
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let status_raw: String = row.get("status")?;
    let config_raw: String = row.get("config")?;
    let scopes_raw: String = row.get("scopes")?;
    let created_raw: String = row.get("created_at")?;
    let updated_raw: String = row.get("updated_at")?;
    Ok(Session {
        id: row.get("id")?,
        workspace_path: row.get("workspace_path")?,
        title: row.get("title")?,
        thread_id: row.get("thread_id")?,
        status: parse_status(&status_raw),
        config: serde_json::from_str(&config_raw).unwrap_or_default(),
        scopes: serde_json::from_str(&scopes_raw).unwrap_or_default(),
        message_count: row.get::<_, i64>("message_count")? as u64,
        created_at: parse_timestamp(&created_raw),
        updated_at: parse_timestamp(&updated_raw),
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let role_raw: String = row.get("role")?;
    let tool_calls_raw: Option<String> = row.get("tool_calls")?;
    let metadata_raw: String = row.get("metadata")?;
    let created_raw: String = row.get("created_at")?;
    Ok(Message {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        role: parse_role(&role_raw),
        content: row.get("content")?,
        parent_id: row.get("parent_id")?,
        tool_calls: tool_calls_raw.and_then(|s| serde_json::from_str(&s).ok()),
        tool_call_id: row.get("tool_call_id")?,
        token_count: row.get::<_, Option<i64>>("token_count")?.map(|v| v as u32),
        model_used: row.get("model_used")?,
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::Value::Null),
        created_at: parse_timestamp(&created_raw),
    })
}

fn parse_status(raw: &str) -> SessionStatus {
    match raw {
        "inactive" => SessionStatus::Inactive,
        "error" => SessionStatus::Error,
        _ => SessionStatus::Active,
    }
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Inactive => "inactive",
        SessionStatus::Error => "error",
    }
}

fn parse_role(raw: &str) -> Role {
    match raw {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        "tool" => Role::Tool,
        _ => Role::User,
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.run(|conn| conn.query_row("SELECT 1", [], |_| Ok(()))).await
    }

    async fn create_session(
        &self,
        id: &str,
        thread_id: &str,
        workspace_path: &str,
        config: SessionConfig,
        title: Option<String>,
        scopes: Scope,
    ) -> Result<Session> {
        let existing = self.get_session(id).await?;
        if existing.is_some() {
            return Err(CognitionError::AlreadyExists { id: id.to_string() });
        }
        let now = Utc::now();
        let session = Session {
            id: id.to_string(),
            workspace_path: workspace_path.to_string(),
            title,
            thread_id: thread_id.to_string(),
            status: SessionStatus::Active,
            config,
            scopes,
            message_count: 0,
            created_at: now,
            updated_at: now,
        };
        let s = session.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, workspace_path, title, thread_id, status, config, scopes, message_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    s.id,
                    s.workspace_path,
                    s.title,
                    s.thread_id,
                    status_str(s.status),
                    serde_json::to_string(&s.config).unwrap(),
                    serde_json::to_string(&s.scopes).unwrap(),
                    s.message_count as i64,
                    s.created_at.to_rfc3339(),
                    s.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .optional()
        })
        .await
    }

    async fn list_sessions(&self, filter_scopes: &Scope) -> Result<Vec<Session>> {
        let all: Vec<Session> = self
            .run(|conn| {
                let mut stmt = conn.prepare("SELECT * FROM sessions ORDER BY updated_at DESC")?;
                let rows = stmt.query_map([], row_to_session)?;
                rows.collect()
            })
            .await?;
        Ok(all
            .into_iter()
            .filter(|s| filter_scopes.subset_matches(&s.scopes))
            .collect())
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Option<Session>> {
        let Some(mut session) = self.get_session(id).await? else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            session.title = Some(title);
        }
        if let Some(status) = patch.status {
            session.status = status;
        }
        if let Some(config) = patch.config {
            session.config = session.config.merged_with(&config);
        }
        session.updated_at = Utc::now();
        let s = session.clone();
        self.run(move |conn| {
            conn.execute(
                "UPDATE sessions SET title = ?1, status = ?2, config = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    s.title,
                    status_str(s.status),
                    serde_json::to_string(&s.config).unwrap(),
                    s.updated_at.to_rfc3339(),
                    s.id,
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(Some(session))
    }

    async fn update_message_count(&self, id: &str, count: u64) -> Result<()> {
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();
        self.run(move |conn| {
            conn.execute(
                "UPDATE sessions SET message_count = ?1, updated_at = ?2 WHERE id = ?3",
                params![count as i64, now, id],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let affected = self
            .run(move |conn| conn.execute("DELETE FROM sessions WHERE id = ?1", params![id]))
            .await?;
        Ok(affected > 0)
    }

    async fn create_message(&self, session_id: &str, new: NewMessage) -> Result<Message> {
        if self.get_session(session_id).await?.is_none() {
            return Err(CognitionError::NotFound);
        }
        let message = Message {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role: new.role,
            content: new.content,
            parent_id: new.parent_id,
            tool_calls: new.tool_calls,
            tool_call_id: new.tool_call_id,
            token_count: new.token_count,
            model_used: new.model_used,
            metadata: new.metadata,
            created_at: Utc::now(),
        };
        let m = message.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, session_id, role, content, parent_id, tool_calls, tool_call_id, token_count, model_used, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    m.id,
                    m.session_id,
                    role_str(m.role),
                    m.content,
                    m.parent_id,
                    m.tool_calls.as_ref().map(|t| serde_json::to_string(t).unwrap()),
                    m.tool_call_id,
                    m.token_count.map(|v| v as i64),
                    m.model_used,
                    serde_json::to_string(&m.metadata).unwrap(),
                    m.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(message)
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>> {
        let id = id.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT * FROM messages WHERE id = ?1",
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let session_id = session_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM messages WHERE session_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![session_id], row_to_message)?;
            rows.collect()
        })
        .await
    }

    async fn get_messages_by_session(
        &self,
        session_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage> {
        let sid = session_id.to_string();
        let total: i64 = self
            .run({
                let sid = sid.clone();
                move |conn| {
                    conn.query_row(
                        "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                        params![sid],
                        |row| row.get(0),
                    )
                }
            })
            .await?;
        let messages = self
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM messages WHERE session_id = ?1 ORDER BY created_at ASC LIMIT ?2 OFFSET ?3",
                )?;
                let rows =
                    stmt.query_map(params![sid, limit as i64, offset as i64], row_to_message)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        Ok(MessagePage {
            messages,
            total: total as u64,
        })
    }

    async fn delete_messages_for_session(&self, session_id: &str) -> Result<u64> {
        let session_id = session_id.to_string();
        let affected = self
            .run(move |conn| {
                conn.execute(
                    "DELETE FROM messages WHERE session_id = ?1",
                    params![session_id],
                )
            })
            .await?;
        Ok(affected as u64)
    }

    async fn get_checkpoint(&self, thread_id: &str) -> Result<Option<Vec<u8>>> {
        let thread_id = thread_id.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT blob FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn put_checkpoint(&self, thread_id: &str, blob: Vec<u8>) -> Result<()> {
        let thread_id = thread_id.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints (thread_id, blob) VALUES (?1, ?2)
                 ON CONFLICT(thread_id) DO UPDATE SET blob = excluded.blob",
                params![thread_id, blob],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_checkpoint(&self, thread_id: &str) -> Result<()> {
        let thread_id = thread_id.to_string();
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM checkpoints WHERE thread_id = ?1",
                params![thread_id],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognition_core::Role;

    async fn backend() -> (SqliteBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        (SqliteBackend::open(&path).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn session_survives_reopen_against_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let backend = SqliteBackend::open(&path).await.unwrap();
            backend
                .create_session("s1", "t1", "/ws", SessionConfig::default(), None, Scope::empty())
                .await
                .unwrap();
        }
        let reopened = SqliteBackend::open(&path).await.unwrap();
        let session = reopened.get_session("s1").await.unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let (backend, _dir) = backend().await;
        backend
            .create_session("s", "t", "/ws", SessionConfig::default(), None, Scope::empty())
            .await
            .unwrap();
        backend
            .create_message("s", NewMessage { role: Role::User, content: Some("hi".into()), ..Default::default() })
            .await
            .unwrap();
        backend.delete_session("s").await.unwrap();
        let remaining = backend.list_messages("s").await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn health_check_succeeds_on_fresh_db() {
        let (backend, _dir) = backend().await;
        assert!(backend.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn checkpoint_upsert_overwrites() {
        let (backend, _dir) = backend().await;
        backend.put_checkpoint("t", vec![1]).await.unwrap();
        backend.put_checkpoint("t", vec![2, 3]).await.unwrap();
        assert_eq!(backend.get_checkpoint("t").await.unwrap(), Some(vec![2, 3]));
    }
}
