//! Wraps an [`AgentExecutor`] for a single turn, translating its events and
//! racing cancellation against the next native event (§4.6, §5).

use std::sync::Arc;

use cognition_core::CoreEvent;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::executor::{AgentExecutor, ExecutionRequest};
use crate::translate::EventTranslator;

/// Bounded channel capacity between the driver task and the fan-out task
/// (§9: "route them through a bounded channel, capacity ~32").
const CHANNEL_CAPACITY: usize = 32;

pub struct AgentDriver {
    executor: Arc<dyn AgentExecutor>,
}

impl AgentDriver {
    pub fn new(executor: Arc<dyn AgentExecutor>) -> Self {
        Self { executor }
    }

    /// Start one turn. Spawns a task that drives `executor`, translates its
    /// native events, and forwards `CoreEvent`s on the returned channel.
    /// `cancel` is raced against each native event via `tokio::select!`; on
    /// trigger, the adapter emits `Error{code=Cancelled}` then `Done` and
    /// stops consuming further native events (§4.6 cancellation).
    pub fn spawn(
        &self,
        request: ExecutionRequest,
        cancel: oneshot::Receiver<()>,
    ) -> mpsc::Receiver<CoreEvent> {
        let executor = Arc::clone(&self.executor);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut translator = EventTranslator::new(
                request.config.provider.clone(),
                request.config.model.clone(),
                &request.user_message,
            );

            let mut stream = match executor.execute(request).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "agent executor failed to start");
                    let _ = tx
                        .send(CoreEvent::Error {
                            message: e.to_string(),
                            code: Some("internal".into()),
                        })
                        .await;
                    let _ = tx.send(CoreEvent::Done).await;
                    return;
                }
            };

            let mut cancel = cancel;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel => {
                        let _ = tx
                            .send(CoreEvent::Error {
                                message: "turn cancelled".into(),
                                code: Some("cancelled".into()),
                            })
                            .await;
                        let _ = tx.send(CoreEvent::Done).await;
                        return;
                    }
                    native = stream.next() => {
                        match native {
                            None => break,
                            Some(crate::executor::NativeEvent::Terminal) => break,
                            Some(ev) => {
                                if let Some(core_ev) = translator.translate(ev) {
                                    if tx.send(core_ev).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                    }
                }
            }

            let _ = tx.send(translator.usage_event()).await;
            let _ = tx.send(CoreEvent::Done).await;
        });

        rx
    }
}
