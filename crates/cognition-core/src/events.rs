use serde::{Deserialize, Serialize};

use crate::message::ToolCallRequest;

/// Tagged union produced by the agent driver adapter (C6) and consumed by
/// the message service (C7) (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoreEvent {
    Token {
        content: String,
    },
    ToolCall {
        name: String,
        args: serde_json::Value,
        id: String,
    },
    ToolResult {
        id: String,
        output: String,
        exit_code: i32,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
        cost_estimate: f64,
        provider: String,
        model: String,
    },
    Planning {
        todos: Vec<serde_json::Value>,
    },
    Error {
        message: String,
        code: Option<String>,
    },
    Done,
}

impl CoreEvent {
    /// The wire `eventType` this variant serialises to (§6.2).
    pub fn wire_type(&self) -> &'static str {
        match self {
            CoreEvent::Token { .. } => "token",
            CoreEvent::ToolCall { .. } => "toolCall",
            CoreEvent::ToolResult { .. } => "toolResult",
            CoreEvent::Usage { .. } => "usage",
            CoreEvent::Planning { .. } => "planning",
            CoreEvent::Error { .. } => "error",
            CoreEvent::Done => "done",
        }
    }

    /// The wire `data` payload for this event (§6.2 schema table).
    pub fn wire_data(&self) -> serde_json::Value {
        match self {
            CoreEvent::Token { content } => serde_json::json!({ "content": content }),
            CoreEvent::ToolCall { name, args, id } => {
                serde_json::json!({ "name": name, "args": args, "id": id })
            }
            CoreEvent::ToolResult {
                id,
                output,
                exit_code,
            } => serde_json::json!({
                "tool_call_id": id,
                "output": output,
                "exit_code": exit_code,
            }),
            CoreEvent::Usage {
                input_tokens,
                output_tokens,
                cost_estimate,
                provider,
                model,
            } => serde_json::json!({
                "input_tokens": input_tokens,
                "output_tokens": output_tokens,
                "estimated_cost": cost_estimate,
                "provider": provider,
                "model": model,
            }),
            CoreEvent::Planning { todos } => serde_json::json!({ "todos": todos }),
            CoreEvent::Error { message, code } => {
                serde_json::json!({ "message": message, "code": code })
            }
            CoreEvent::Done => serde_json::json!({}),
        }
    }

    /// Extract the tool calls recorded during the turn, used to populate the
    /// final assistant row's `tool_calls` column (§4.7 step 5).
    pub fn as_tool_call_request(&self) -> Option<ToolCallRequest> {
        match self {
            CoreEvent::ToolCall { name, args, id } => Some(ToolCallRequest {
                id: id.clone(),
                name: name.clone(),
                args: args.clone(),
            }),
            _ => None,
        }
    }
}

/// The wire-level SSE payload (§3, §6.2): `{eventID, eventType, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event_id: String,
    pub event_type: String,
    pub data: serde_json::Value,
}

impl StreamEvent {
    pub fn new(event_id: String, event: &CoreEvent) -> Self {
        Self {
            event_id,
            event_type: event.wire_type().to_string(),
            data: event.wire_data(),
        }
    }

    /// Build the synthetic `reconnected` event (§4.5 step 2, §6.2).
    pub fn reconnected(event_id: String, last_event_id: &str) -> Self {
        Self {
            event_id,
            event_type: "reconnected".to_string(),
            data: serde_json::json!({
                "last_event_id": last_event_id,
                "resumed": true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_wire_type_and_data() {
        let ev = CoreEvent::Token {
            content: "hi".into(),
        };
        assert_eq!(ev.wire_type(), "token");
        assert_eq!(ev.wire_data()["content"], "hi");
    }

    #[test]
    fn done_has_empty_object_data() {
        assert_eq!(CoreEvent::Done.wire_data(), serde_json::json!({}));
    }

    #[test]
    fn tool_call_extracts_request() {
        let ev = CoreEvent::ToolCall {
            name: "read_file".into(),
            args: serde_json::json!({"path": "a.rs"}),
            id: "call-1".into(),
        };
        let req = ev.as_tool_call_request().unwrap();
        assert_eq!(req.name, "read_file");
        assert_eq!(req.id, "call-1");
    }

    #[test]
    fn non_tool_call_event_has_no_tool_call_request() {
        assert!(CoreEvent::Done.as_tool_call_request().is_none());
    }

    #[test]
    fn reconnected_event_carries_last_id_and_resumed_flag() {
        let ev = StreamEvent::reconnected("4-abcd1234".into(), "2-abc");
        assert_eq!(ev.event_type, "reconnected");
        assert_eq!(ev.data["last_event_id"], "2-abc");
        assert_eq!(ev.data["resumed"], true);
    }
}
