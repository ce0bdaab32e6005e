//! SSE wire framing (§4.5, §6.2): `id:`, `retry:`, `event:`, `data:` lines
//! plus `:`-prefixed heartbeat comments.

use cognition_core::StreamEvent;

pub fn format_retry(retry_ms: u64) -> String {
    format!("retry: {retry_ms}\n\n")
}

pub fn format_stream_event(event: &StreamEvent) -> String {
    format!(
        "id: {}\nevent: {}\ndata: {}\n\n",
        event.event_id,
        event.event_type,
        event.data
    )
}

/// Heartbeats are unbuffered comment lines carrying no ID (§4.5 step 4).
pub fn format_heartbeat() -> String {
    ": heartbeat\n\n".to_string()
}

/// Terminal error frame flushed when the generator itself fails
/// (§4.5 step 6), distinct from an in-turn `CoreEvent::Error`.
pub fn format_terminal_error(message: &str) -> String {
    format!(
        "event: error\ndata: {}\n\n",
        serde_json::json!({ "message": message })
    )
}
