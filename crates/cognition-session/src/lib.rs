//! Session lifecycle facade over [`cognition_storage::StorageBackend`] (C4):
//! ID generation, an LRU read cache, and post-mutation lifecycle hooks.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use cognition_core::{CognitionError, Result, Scope, Session, SessionConfig};
use cognition_storage::{SessionPatch, StorageBackend};
use lru::LruCache;
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_CACHE_CAPACITY: usize = 512;

/// A resolved session plus the scope it was looked up under, handed to
/// `MessageService` so admission and turn execution share one lookup
/// (§ "Supplemented features", reproducing `session_manager.py`'s
/// `CreateContext`).
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session: Session,
    pub scope: Scope,
}

/// Invoked after each mutating storage call succeeds. Failures are logged
/// and never roll back the underlying change (§4.4).
#[async_trait]
pub trait SessionLifecycleHook: Send + Sync {
    async fn on_created(&self, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }
    async fn on_updated(&self, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }
    async fn on_deleted(&self, _session_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct SessionManager {
    storage: Arc<dyn StorageBackend>,
    cache: Mutex<LruCache<String, Session>>,
    hooks: Vec<Arc<dyn SessionLifecycleHook>>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_cache_capacity(storage, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(storage: Arc<dyn StorageBackend>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity must be non-zero");
        Self {
            storage,
            cache: Mutex::new(LruCache::new(capacity)),
            hooks: Vec::new(),
        }
    }

    pub fn add_hook(&mut self, hook: Arc<dyn SessionLifecycleHook>) {
        self.hooks.push(hook);
    }

    pub async fn create(
        &self,
        workspace_path: String,
        config: SessionConfig,
        title: Option<String>,
        scopes: Scope,
    ) -> Result<Session> {
        let id = Uuid::new_v4().to_string();
        let thread_id = Uuid::new_v4().to_string();
        let session = self
            .storage
            .create_session(&id, &thread_id, &workspace_path, config, title, scopes)
            .await?;
        self.cache.lock().await.put(id.clone(), session.clone());
        for hook in &self.hooks {
            if let Err(err) = hook.on_created(&session).await {
                tracing::warn!(session_id = %id, error = %err, "session creation hook failed");
            }
        }
        Ok(session)
    }

    /// Bypasses the cache entry when its scope doesn't subset-match the
    /// caller's filter, and never leaks existence across scopes (§4.3).
    pub async fn get(&self, id: &str, filter: &Scope) -> Result<Option<Session>> {
        if let Some(cached) = self.cache.lock().await.get(id).cloned() {
            if filter.subset_matches(&cached.scopes) {
                return Ok(Some(cached));
            }
        }
        let Some(session) = self.storage.get_session(id).await? else {
            return Ok(None);
        };
        if !filter.subset_matches(&session.scopes) {
            return Ok(None);
        }
        self.cache.lock().await.put(id.to_string(), session.clone());
        Ok(Some(session))
    }

    pub async fn list(&self, filter: &Scope) -> Result<Vec<Session>> {
        self.storage.list_sessions(filter).await
    }

    pub async fn update(
        &self,
        id: &str,
        filter: &Scope,
        patch: SessionPatch,
    ) -> Result<Option<Session>> {
        if self.get(id, filter).await?.is_none() {
            return Ok(None);
        }
        let Some(session) = self.storage.update_session(id, patch).await? else {
            return Ok(None);
        };
        self.cache.lock().await.put(id.to_string(), session.clone());
        for hook in &self.hooks {
            if let Err(err) = hook.on_updated(&session).await {
                tracing::warn!(session_id = %id, error = %err, "session update hook failed");
            }
        }
        Ok(Some(session))
    }

    pub async fn delete(&self, id: &str, filter: &Scope) -> Result<bool> {
        if self.get(id, filter).await?.is_none() {
            return Ok(false);
        }
        let deleted = self.storage.delete_session(id).await?;
        if deleted {
            self.cache.lock().await.pop(id);
            for hook in &self.hooks {
                if let Err(err) = hook.on_deleted(id).await {
                    tracing::warn!(session_id = %id, error = %err, "session deletion hook failed");
                }
            }
        }
        Ok(deleted)
    }

    pub async fn create_context(
        &self,
        session_id: &str,
        filter: &Scope,
    ) -> Result<Option<SessionContext>> {
        let Some(session) = self.get(session_id, filter).await? else {
            return Ok(None);
        };
        Ok(Some(SessionContext {
            session,
            scope: filter.clone(),
        }))
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}
