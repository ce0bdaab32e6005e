use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

/// Idempotent, cloneable wrapper around a one-shot cancellation signal.
///
/// An explicit `Abort` call and a client disconnecting its SSE stream may
/// both race to cancel the same turn; only the first trigger has an
/// effect, matching the idempotent-abort property every turn must satisfy.
#[derive(Clone)]
pub struct CancelHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl CancelHandle {
    /// Returns the handle plus the receiver the driver adapter races
    /// against the next native event via `tokio::select!`.
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn trigger(&self) {
        if let Some(tx) = self
            .sender
            .lock()
            .expect("cancel handle mutex poisoned")
            .take()
        {
            let _ = tx.send(());
        }
    }
}
