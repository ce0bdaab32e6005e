use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cognition_core::{CognitionError, Message, NewMessage, Result, Scope, Session, SessionStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::{MessagePage, SessionPatch, StorageBackend};

/// In-memory backend used only in tests (§4.1). Data does not survive
/// process restart.
#[derive(Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, Session>>,
    messages: RwLock<HashMap<String, Message>>,
    checkpoints: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn create_session(
        &self,
        id: &str,
        thread_id: &str,
        workspace_path: &str,
        config: cognition_core::SessionConfig,
        title: Option<String>,
        scopes: Scope,
    ) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
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
        sessions.insert(id.to_string(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn list_sessions(&self, filter_scopes: &Scope) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut out: Vec<Session> = sessions
            .values()
            .filter(|s| filter_scopes.subset_matches(&s.scopes))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
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
        Ok(Some(session.clone()))
    }

    async fn update_message_count(&self, id: &str, count: u64) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(id) {
            session.message_count = count;
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            let mut messages = self.messages.write().await;
            messages.retain(|_, m| m.session_id != id);
        }
        Ok(removed)
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
        self.messages
            .write()
            .await
            .insert(message.id.clone(), message.clone());
        Ok(message)
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.messages.read().await.get(id).cloned())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let mut out: Vec<Message> = self
            .messages
            .read()
            .await
            .values()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn get_messages_by_session(
        &self,
        session_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<MessagePage> {
        let all = self.list_messages(session_id).await?;
        let total = all.len() as u64;
        let messages = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(MessagePage { messages, total })
    }

    async fn delete_messages_for_session(&self, session_id: &str) -> Result<u64> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|_, m| m.session_id != session_id);
        Ok((before - messages.len()) as u64)
    }

    async fn get_checkpoint(&self, thread_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.checkpoints.read().await.get(thread_id).cloned())
    }

    async fn put_checkpoint(&self, thread_id: &str, blob: Vec<u8>) -> Result<()> {
        self.checkpoints
            .write()
            .await
            .insert(thread_id.to_string(), blob);
        Ok(())
    }

    async fn delete_checkpoint(&self, thread_id: &str) -> Result<()> {
        self.checkpoints.write().await.remove(thread_id);
        Ok(())
    }
}

/// Convenience constructor for call sites that want a shareable handle.
pub fn shared() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new())
}
