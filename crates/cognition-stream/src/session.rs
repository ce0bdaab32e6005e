//! SSE stream protocol (§4.5): retry directive, `Last-Event-ID` replay,
//! live forwarding, heartbeats, and disconnect-triggered cancellation.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use cognition_core::{CancelHandle, CoreEvent, StreamEvent};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::buffer::EventBuffer;
use crate::frame;

pub const DEFAULT_RETRY_MS: u64 = 3000;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const OUTPUT_CHANNEL_CAPACITY: usize = 32;

/// A live SSE body: framed text chunks, with disconnect detection wired
/// to the turn's [`CancelHandle`] via `Drop`.
pub struct SseBody {
    inner: ReceiverStream<String>,
    cancel: Option<CancelHandle>,
}

impl Stream for SseBody {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for SseBody {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.trigger();
        }
    }
}

/// Drives one SSE response end-to-end per §4.5's numbered protocol.
///
/// `driver_events` is `None` on the replay-only path (a reconnect after
/// the turn has already finished, or after `Last-Event-ID` without a
/// fresh driver start) — only buffered content and the `reconnected`
/// marker are emitted, then the stream closes.
pub fn spawn(
    buffer: Arc<Mutex<EventBuffer>>,
    driver_events: Option<mpsc::Receiver<CoreEvent>>,
    last_event_id: Option<String>,
    cancel: CancelHandle,
    retry_ms: u64,
    heartbeat_interval: Duration,
) -> SseBody {
    let (tx, rx) = mpsc::channel::<String>(OUTPUT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        if tx.send(frame::format_retry(retry_ms)).await.is_err() {
            return;
        }

        if let Some(last_id) = &last_event_id {
            let replay = buffer.lock().await.get_events_after(Some(last_id));
            for event in &replay {
                if tx.send(frame::format_stream_event(event)).await.is_err() {
                    return;
                }
            }
            let reconnected_id = buffer.lock().await.next_id();
            let reconnected = StreamEvent::reconnected(reconnected_id, last_id);
            if tx.send(frame::format_stream_event(&reconnected)).await.is_err() {
                return;
            }
        }

        let Some(mut driver_events) = driver_events else {
            return;
        };

        loop {
            tokio::select! {
                received = driver_events.recv() => {
                    match received {
                        Some(event) => {
                            let framed = buffer.lock().await.push(&event);
                            if tx.send(frame::format_stream_event(&framed)).await.is_err() {
                                break;
                            }
                            if matches!(event, CoreEvent::Done) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep(heartbeat_interval) => {
                    if tx.send(frame::format_heartbeat()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    SseBody {
        inner: ReceiverStream::new(rx),
        cancel: Some(cancel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    async fn collect_all(mut body: SseBody) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.push(chunk);
        }
        out
    }

    #[tokio::test]
    async fn fresh_stream_opens_with_retry_then_forwards_live_events() {
        let buffer = Arc::new(Mutex::new(EventBuffer::new(10)));
        let (tx, rx) = mpsc::channel(4);
        let (cancel, _rx_cancel) = CancelHandle::new();
        let body = spawn(buffer, Some(rx), None, cancel, 3000, Duration::from_secs(60));
        tx.send(CoreEvent::Token { content: "hi".into() }).await.unwrap();
        tx.send(CoreEvent::Done).await.unwrap();
        drop(tx);
        let chunks = collect_all(body).await;
        assert!(chunks[0].starts_with("retry: 3000"));
        assert!(chunks[1].contains("event: token"));
        assert!(chunks[2].contains("event: done"));
    }

    #[tokio::test]
    async fn resume_replays_tail_then_reconnected_marker() {
        let buffer = Arc::new(Mutex::new(EventBuffer::new(10)));
        let first_id;
        {
            let mut buf = buffer.lock().await;
            first_id = buf.push(&CoreEvent::Token { content: "a".into() }).event_id;
            buf.push(&CoreEvent::Done);
        }
        let (cancel, _rx_cancel) = CancelHandle::new();
        let body = spawn(buffer, None, Some(first_id.clone()), cancel, 3000, Duration::from_secs(60));
        let chunks = collect_all(body).await;
        assert!(chunks[0].starts_with("retry: 3000"));
        assert!(chunks[1].contains("event: done"));
        assert!(chunks[2].contains("event: reconnected"));
        assert!(chunks[2].contains(&first_id));
    }

    #[tokio::test]
    async fn dropping_the_body_triggers_cancellation() {
        let buffer = Arc::new(Mutex::new(EventBuffer::new(10)));
        let (_tx, rx) = mpsc::channel(4);
        let (cancel, rx_cancel) = CancelHandle::new();
        let body = spawn(buffer, Some(rx), None, cancel, 3000, Duration::from_secs(60));
        drop(body);
        assert!(rx_cancel.await.is_ok());
    }

    #[tokio::test]
    async fn idle_producer_emits_heartbeat_comment() {
        tokio::time::pause();
        let buffer = Arc::new(Mutex::new(EventBuffer::new(10)));
        let (_tx, rx) = mpsc::channel(4);
        let (cancel, _rx_cancel) = CancelHandle::new();
        let mut body = spawn(buffer, Some(rx), None, cancel, 3000, Duration::from_millis(50));
        let first = body.next().await.unwrap();
        assert!(first.starts_with("retry"));
        tokio::time::advance(Duration::from_millis(60)).await;
        let second = body.next().await.unwrap();
        assert!(second.starts_with(':'));
    }
}
