use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One entry of `Message.tool_calls` — the ordered list of tool invocations
/// an assistant turn made (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// A persisted turn row (§3). Immutable once written; ordering is by
/// `created_at` ascending; pagination is stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: Option<String>,
    pub parent_id: Option<String>,
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    pub tool_call_id: Option<String>,
    pub token_count: Option<u32>,
    pub model_used: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields a caller may supply when creating a message; the backend fills
/// in `id` and `created_at` (§4.1 `CreateMessage`).
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub role: Role,
    pub content: Option<String>,
    pub parent_id: Option<String>,
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    pub tool_call_id: Option<String>,
    pub token_count: Option<u32>,
    pub model_used: Option<String>,
    pub metadata: serde_json::Value,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}
