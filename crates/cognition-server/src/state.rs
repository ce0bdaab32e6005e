//! Process-wide server state (§9: "explicit `Server` value constructed at
//! startup and passed by reference" replacing the source's module globals).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cognition_agent::AgentDriver;
use cognition_core::CancelHandle;
use cognition_policy::{RateLimiter, ScopeHarness};
use cognition_session::SessionManager;
use cognition_storage::StorageBackend;
use cognition_stream::EventBuffer;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a request handler needs, constructed once at startup and
/// shared behind one `Arc` (§9 dependency-injection seam).
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub sessions: SessionManager,
    pub rate_limiter: Arc<RateLimiter>,
    pub scope_harness: ScopeHarness,
    pub agent_driver: AgentDriver,

    pub active_turns: DashMap<String, CancelHandle>,
    buffers: DashMap<String, Arc<Mutex<EventBuffer>>>,
    session_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    pub turn_semaphore: Arc<Semaphore>,

    pub event_buffer_capacity: usize,
    pub heartbeat_interval: Duration,
    pub retry_ms: u64,
    pub strict_serial: bool,

    pub started_at: DateTime<Utc>,
}

/// Handler-facing shared state: a single `Arc` clone per task, same
/// instance on every axum route (§6.1).
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        rate_limiter: Arc<RateLimiter>,
        scope_harness: ScopeHarness,
        agent_driver: AgentDriver,
        max_sessions: usize,
        event_buffer_capacity: usize,
        heartbeat_interval: Duration,
        retry_ms: u64,
        strict_serial: bool,
    ) -> Self {
        Self {
            sessions: SessionManager::new(Arc::clone(&storage)),
            storage,
            rate_limiter,
            scope_harness,
            agent_driver,
            active_turns: DashMap::new(),
            buffers: DashMap::new(),
            session_locks: DashMap::new(),
            turn_semaphore: Arc::new(Semaphore::new(max_sessions)),
            event_buffer_capacity,
            heartbeat_interval,
            retry_ms,
            strict_serial,
            started_at: Utc::now(),
        }
    }

    /// The per-session replay buffer, created lazily on first use (§4.5).
    pub fn buffer_for(&self, session_id: &str) -> Arc<Mutex<EventBuffer>> {
        Arc::clone(
            &self.buffers
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(EventBuffer::new(self.event_buffer_capacity)))),
        )
    }

    /// The per-session serialization mutex, created lazily (§4.7 concurrency
    /// bounds).
    pub fn session_lock_for(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            &self.session_locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    pub fn active_session_count(&self) -> usize {
        self.active_turns.len()
    }
}
