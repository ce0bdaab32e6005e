//! Per-stream ring buffer of recent events keyed by monotonic IDs (C5),
//! grounded on `server/app/api/sse.py`'s `SSEStream`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use cognition_core::{CoreEvent, StreamEvent};
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 100;

/// Per-stream monotonic counter + short random suffix:
/// `"{counter}-{uuid8}"`. Counter starts at 1 (§4.5).
pub struct EventIdGenerator {
    counter: AtomicU64,
}

impl EventIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{n}-{}", &suffix[..8])
    }
}

impl Default for EventIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded deque of the most recent `capacity` events. Append and eviction
/// of the oldest are both O(1) (§4.5).
pub struct EventBuffer {
    capacity: usize,
    events: VecDeque<StreamEvent>,
    ids: EventIdGenerator,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::with_capacity(capacity.max(1)),
            ids: EventIdGenerator::new(),
        }
    }

    /// Mint the next event ID without appending anything — used for
    /// synthetic frames (e.g. `reconnected`) that don't belong in replay.
    pub fn next_id(&self) -> String {
        self.ids.next()
    }

    /// Assign an ID to `event`, append it to the buffer (evicting the
    /// oldest entry past capacity), and return the framed `StreamEvent`.
    pub fn push(&mut self, event: &CoreEvent) -> StreamEvent {
        let id = self.ids.next();
        let stream_event = StreamEvent::new(id, event);
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(stream_event.clone());
        stream_event
    }

    /// Events strictly after `id`, in order. Unknown or absent `id`
    /// returns the entire buffer (conservative replay, §4.5/§8 property 3).
    pub fn get_events_after(&self, id: Option<&str>) -> Vec<StreamEvent> {
        let Some(id) = id else {
            return self.events.iter().cloned().collect();
        };
        match self.events.iter().position(|e| e.event_id == id) {
            Some(pos) => self.events.iter().skip(pos + 1).cloned().collect(),
            None => self.events.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> CoreEvent {
        CoreEvent::Token { content: s.into() }
    }

    #[test]
    fn ids_are_monotonic_and_distinct() {
        let mut buf = EventBuffer::new(10);
        let a = buf.push(&token("a"));
        let b = buf.push(&token("b"));
        assert!(a.event_id.starts_with("1-"));
        assert!(b.event_id.starts_with("2-"));
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn capacity_retains_only_last_n_events() {
        let mut buf = EventBuffer::new(3);
        for i in 0..5 {
            buf.push(&token(&i.to_string()));
        }
        assert_eq!(buf.len(), 3);
        let all = buf.get_events_after(None);
        assert_eq!(all[0].data["content"], "2");
        assert_eq!(all[2].data["content"], "4");
    }

    #[test]
    fn unknown_last_event_id_returns_full_buffer() {
        let mut buf = EventBuffer::new(10);
        buf.push(&token("a"));
        buf.push(&token("b"));
        let replay = buf.get_events_after(Some("not-a-real-id"));
        assert_eq!(replay.len(), 2);
    }

    #[test]
    fn replay_after_known_id_returns_contiguous_suffix() {
        let mut buf = EventBuffer::new(10);
        let first = buf.push(&token("a"));
        buf.push(&token("b"));
        buf.push(&token("c"));
        let replay = buf.get_events_after(Some(&first.event_id));
        assert_eq!(replay.len(), 2);
    }

    #[test]
    fn no_last_event_id_returns_full_buffer() {
        let mut buf = EventBuffer::new(10);
        buf.push(&token("a"));
        buf.push(&token("b"));
        assert_eq!(buf.get_events_after(None).len(), 2);
    }
}
