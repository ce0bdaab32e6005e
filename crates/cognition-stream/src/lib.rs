//! SSE streaming primitives (C5): per-session event buffering, wire
//! framing, and the live-stream orchestrator consumed by the HTTP layer.

mod buffer;
mod frame;
mod session;

pub use buffer::{EventBuffer, EventIdGenerator, DEFAULT_CAPACITY};
pub use frame::{format_heartbeat, format_retry, format_stream_event, format_terminal_error};
pub use session::{spawn, SseBody, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RETRY_MS};
