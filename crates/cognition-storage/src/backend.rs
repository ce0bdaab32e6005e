use async_trait::async_trait;
use cognition_core::{CognitionError, Message, NewMessage, Result, Scope, Session, SessionConfig};

/// A page of messages plus the total row count for the session, independent
/// of `limit`/`offset` (§4.1 `GetMessagesBySession`).
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub total: u64,
}

/// Fields accepted by `UpdateSession`. `None` means "leave unchanged"; only
/// `config` itself is merged field-by-field (§4.1 `UpdateSession`).
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub status: Option<cognition_core::SessionStatus>,
    pub config: Option<SessionConfig>,
}

/// Durable store for sessions, messages, and opaque agent checkpoints (C1).
///
/// Every implementation is interchangeable; callers depend only on this
/// trait. Transport failures map to [`CognitionError::Unavailable`];
/// serialization/schema failures map to [`CognitionError::Internal`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
    async fn health_check(&self) -> Result<()>;

    /// Fails with [`CognitionError::AlreadyExists`] if `id` collides.
    async fn create_session(
        &self,
        id: &str,
        thread_id: &str,
        workspace_path: &str,
        config: SessionConfig,
        title: Option<String>,
        scopes: Scope,
    ) -> Result<Session>;

    /// Never fails on a missing id; returns `Ok(None)`.
    async fn get_session(&self, id: &str) -> Result<Option<Session>>;

    /// Ordered by `updated_at` DESC; applies subset filtering when
    /// `filter_scopes` is non-empty.
    async fn list_sessions(&self, filter_scopes: &Scope) -> Result<Vec<Session>>;

    /// `patch.config` is merged field-by-field into the existing config.
    /// Returns `Ok(None)` when the session does not exist.
    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Option<Session>>;

    /// Overwrites `message_count` and refreshes `updated_at`.
    async fn update_message_count(&self, id: &str, count: u64) -> Result<()>;

    /// Cascades to delete all messages for the session. Returns whether a
    /// row was actually removed (idempotent: second call returns `false`).
    async fn delete_session(&self, id: &str) -> Result<bool>;

    /// Fails with [`CognitionError::NotFound`] if the session does not
    /// exist (stands in for the foreign-key violation in §4.1).
    async fn create_message(&self, session_id: &str, message: NewMessage) -> Result<Message>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>>;

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Ordered by `created_at` ASC, stable pagination.
    async fn get_messages_by_session(
        &self,
        session_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage>;

    async fn delete_messages_for_session(&self, session_id: &str) -> Result<u64>;

    /// Opaque checkpoint blob keyed by `thread_id`. Never interpreted by
    /// the core; a lost checkpoint is tolerated.
    async fn get_checkpoint(&self, thread_id: &str) -> Result<Option<Vec<u8>>>;
    async fn put_checkpoint(&self, thread_id: &str, blob: Vec<u8>) -> Result<()>;
    async fn delete_checkpoint(&self, thread_id: &str) -> Result<()>;
}

/// Shorthand used by implementations to map transport-layer failures.
pub(crate) fn unavailable<E: std::fmt::Display>(err: E) -> CognitionError {
    CognitionError::Unavailable(err.to_string())
}

/// Shorthand used by implementations to map schema/serialization failures.
pub(crate) fn internal<E: std::fmt::Display>(err: E) -> CognitionError {
    CognitionError::Internal(err.to_string())
}
