//! Token-bucket admission control per key (C2), grounded on the original
//! `server/app/rate_limiter.py` algorithm.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use cognition_core::{CognitionError, Result};
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const DEFAULT_WINDOW_SECONDS: u64 = 60;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

struct Bucket {
    tokens: f64,
    last_update: Instant,
}

impl Bucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    /// `tokens = min(capacity, tokens + elapsed*rate); if tokens >= 1 {
    /// tokens -= 1; admit } else { reject }` — the exact per-key formula.
    fn acquire(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_update = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn wait_seconds(&self, rate: f64) -> f64 {
        if self.tokens >= 1.0 {
            0.0
        } else {
            (1.0 - self.tokens) / rate
        }
    }
}

/// Requests-per-minute + burst configuration for one limiter instance.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

impl RateLimitConfig {
    fn rate_per_second(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }

    fn capacity(&self) -> f64 {
        self.burst_size as f64
    }
}

struct SweepHandle {
    stop: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Per-key token-bucket limiter backed by a `DashMap` (C2). Construct one
/// per distinct rate-limit policy; call [`RateLimiter::start_sweeper`] to
/// enable background eviction of idle buckets.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Mutex<Bucket>>,
    sweep: Mutex<Option<SweepHandle>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            sweep: Mutex::new(None),
        }
    }

    /// Acquires one token for `key`, creating a full bucket on first use.
    /// Fails with [`CognitionError::RateLimited`] when none are available.
    pub fn check_rate_limit(&self, key: &str) -> Result<()> {
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(Bucket::full(self.config.capacity())));
        let mut bucket = entry.lock().expect("rate limit bucket mutex poisoned");
        if bucket.acquire(self.config.rate_per_second(), self.config.capacity()) {
            Ok(())
        } else {
            Err(CognitionError::RateLimited {
                resource: key.to_string(),
                limit: self.config.requests_per_minute,
                window_seconds: DEFAULT_WINDOW_SECONDS,
            })
        }
    }

    /// Seconds until `key`'s bucket would admit the next request.
    pub fn wait_time(&self, key: &str) -> f64 {
        self.buckets
            .get(key)
            .map(|entry| {
                entry
                    .lock()
                    .expect("rate limit bucket mutex poisoned")
                    .wait_seconds(self.config.rate_per_second())
            })
            .unwrap_or(0.0)
    }

    fn sweep_once(&self, idle_timeout: Duration) {
        let now = Instant::now();
        self.buckets.retain(|_, bucket| {
            let last_update = bucket.lock().expect("rate limit bucket mutex poisoned").last_update;
            now.duration_since(last_update) < idle_timeout
        });
    }
}

/// Start/stop lifecycle for the background sweep task (§4.2: opt-in, not
/// started by default; when not started buckets are retained forever,
/// bounded by distinct keys).
impl RateLimiter {
    pub fn start_sweeper(self: &std::sync::Arc<Self>) {
        self.start_sweeper_with(DEFAULT_SWEEP_INTERVAL, DEFAULT_IDLE_TIMEOUT);
    }

    pub fn start_sweeper_with(self: &std::sync::Arc<Self>, interval: Duration, idle_timeout: Duration) {
        let mut guard = self.sweep.lock().expect("sweep handle mutex poisoned");
        if guard.is_some() {
            return;
        }
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let limiter = self.clone();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        limiter.sweep_once(idle_timeout);
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });
        *guard = Some(SweepHandle { stop: stop_tx, join });
    }

    pub async fn stop_sweeper(&self) {
        let handle = self.sweep.lock().expect("sweep handle mutex poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.stop.send(());
            let _ = handle.join.await;
        }
    }
}
