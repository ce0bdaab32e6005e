use chrono::{DateTime, Utc};
use cognition_core::{
    CognitionError, Message, NewMessage, Result, Role, Scope, Session, SessionConfig,
    SessionStatus,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::backend::{internal, unavailable, MessagePage, SessionPatch, StorageBackend};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id             TEXT PRIMARY KEY,
    workspace_path TEXT NOT NULL DEFAULT '',
    title          TEXT,
    thread_id      TEXT NOT NULL,
    status         TEXT NOT NULL,
    config         JSONB NOT NULL,
    scopes         JSONB NOT NULL,
    message_count  BIGINT NOT NULL DEFAULT 0,
    created_at     TIMESTAMPTZ NOT NULL,
    updated_at     TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_workspace ON sessions(workspace_path);

CREATE TABLE IF NOT EXISTS messages (
    id            TEXT PRIMARY KEY,
    session_id    TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    role          TEXT NOT NULL,
    content       TEXT,
    parent_id     TEXT,
    tool_calls    JSONB,
    tool_call_id  TEXT,
    token_count   BIGINT,
    model_used    TEXT,
    metadata      JSONB NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_session_created ON messages(session_id, created_at);

CREATE TABLE IF NOT EXISTS checkpoints (
    thread_id TEXT PRIMARY KEY,
    blob      BYTEA NOT NULL
);
"#;

/// Networked backend (§4.1, §6.3): pooled `sqlx::PgPool`, JSON columns for
/// `config`/`scopes`/`tool_calls`/`metadata`, cascading foreign key from
/// `messages` to `sessions`.
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub async fn connect(connection_string: &str, min_conns: u32, max_conns: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_conns)
            .max_connections(max_conns)
            .connect(connection_string)
            .await
            .map_err(unavailable)?;
        sqlx::query(SCHEMA).execute(&pool).await.map_err(internal)?;
        Ok(Self { pool })
    }

    fn map_query_error(err: sqlx::Error) -> CognitionError {
        match &err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                unavailable(err)
            }
            _ => internal(err),
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    workspace_path: String,
    title: Option<String>,
    thread_id: String,
    status: String,
    config: serde_json::Value,
    scopes: serde_json::Value,
    message_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            workspace_path: row.workspace_path,
            title: row.title,
            thread_id: row.thread_id,
            status: parse_status(&row.status),
            config: serde_json::from_value(row.config).unwrap_or_default(),
            scopes: serde_json::from_value(row.scopes).unwrap_or_default(),
            message_count: row.message_count as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: String,
    session_id: String,
    role: String,
    content: Option<String>,
    parent_id: Option<String>,
    tool_calls: Option<serde_json::Value>,
    tool_call_id: Option<String>,
    token_count: Option<i64>,
    model_used: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            session_id: row.session_id,
            role: parse_role(&row.role),
            content: row.content,
            parent_id: row.parent_id,
            tool_calls: row.tool_calls.and_then(|v| serde_json::from_value(v).ok()),
            tool_call_id: row.tool_call_id,
            token_count: row.token_count.map(|v| v as u32),
            model_used: row.model_used,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
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

#[async_trait::async_trait]
impl StorageBackend for PostgresBackend {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Self::map_query_error)?;
        Ok(())
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
        if self.get_session(id).await?.is_some() {
            return Err(CognitionError::AlreadyExists { id: id.to_string() });
        }
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sessions (id, workspace_path, title, thread_id, status, config, scopes, message_count, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $8)",
        )
        .bind(id)
        .bind(workspace_path)
        .bind(&title)
        .bind(thread_id)
        .bind(status_str(SessionStatus::Active))
        .bind(serde_json::to_value(&config).unwrap())
        .bind(serde_json::to_value(&scopes).unwrap())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Self::map_query_error)?;
        Ok(Session {
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
        })
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_query_error)?;
        Ok(row.map(Session::from))
    }

    async fn list_sessions(&self, filter_scopes: &Scope) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> =
            sqlx::query_as("SELECT * FROM sessions ORDER BY updated_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(Self::map_query_error)?;
        Ok(rows
            .into_iter()
            .map(Session::from)
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
        sqlx::query(
            "UPDATE sessions SET title = $1, status = $2, config = $3, updated_at = $4 WHERE id = $5",
        )
        .bind(&session.title)
        .bind(status_str(session.status))
        .bind(serde_json::to_value(&session.config).unwrap())
        .bind(session.updated_at)
        .bind(&session.id)
        .execute(&self.pool)
        .await
        .map_err(Self::map_query_error)?;
        Ok(Some(session))
    }

    async fn update_message_count(&self, id: &str, count: u64) -> Result<()> {
        sqlx::query("UPDATE sessions SET message_count = $1, updated_at = $2 WHERE id = $3")
            .bind(count as i64)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_query_error)?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_query_error)?;
        Ok(result.rows_affected() > 0)
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
        sqlx::query(
            "INSERT INTO messages (id, session_id, role, content, parent_id, tool_calls, tool_call_id, token_count, model_used, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(role_str(message.role))
        .bind(&message.content)
        .bind(&message.parent_id)
        .bind(message.tool_calls.as_ref().map(|t| serde_json::to_value(t).unwrap()))
        .bind(&message.tool_call_id)
        .bind(message.token_count.map(|v| v as i64))
        .bind(&message.model_used)
        .bind(&message.metadata)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_query_error)?;
        Ok(message)
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_query_error)?;
        Ok(row.map(Message::from))
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM messages WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_query_error)?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn get_messages_by_session(
        &self,
        session_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage> {
        let total: i64 = sqlx::query("SELECT COUNT(*) FROM messages WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_query_error)?
            .get(0);
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT * FROM messages WHERE session_id = $1 ORDER BY created_at ASC LIMIT $2 OFFSET $3",
        )
        .bind(session_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_query_error)?;
        Ok(MessagePage {
            messages: rows.into_iter().map(Message::from).collect(),
            total: total as u64,
        })
    }

    async fn delete_messages_for_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_query_error)?;
        Ok(result.rows_affected())
    }

    async fn get_checkpoint(&self, thread_id: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT blob FROM checkpoints WHERE thread_id = $1")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::map_query_error)?;
        Ok(row.map(|(blob,)| blob))
    }

    async fn put_checkpoint(&self, thread_id: &str, blob: Vec<u8>) -> Result<()> {
        sqlx::query(
            "INSERT INTO checkpoints (thread_id, blob) VALUES ($1, $2)
             ON CONFLICT (thread_id) DO UPDATE SET blob = excluded.blob",
        )
        .bind(thread_id)
        .bind(blob)
        .execute(&self.pool)
        .await
        .map_err(Self::map_query_error)?;
        Ok(())
    }

    async fn delete_checkpoint(&self, thread_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = $1")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_query_error)?;
        Ok(())
    }
}
