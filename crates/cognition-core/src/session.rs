use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
    Error,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Active
    }
}

/// Per-session model overrides (§3). All fields optional; `None` means
/// "use the server default" and is preserved across config merges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
}

impl SessionConfig {
    /// Merge a `PATCH` payload into the current config. `None` fields in
    /// the patch keep the existing value (§4.1 `UpdateSession`).
    pub fn merged_with(&self, patch: &SessionConfig) -> SessionConfig {
        SessionConfig {
            provider: patch.provider.clone().or_else(|| self.provider.clone()),
            model: patch.model.clone().or_else(|| self.model.clone()),
            temperature: patch.temperature.or(self.temperature),
            max_tokens: patch.max_tokens.or(self.max_tokens),
            system_prompt: patch
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
        }
    }
}

/// An agent conversation bound to a workspace (§3).
///
/// `scopes` is set at creation and never mutated — a session is owned by
/// the `(workspace_path, scopes)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub workspace_path: String,
    pub title: Option<String>,
    pub thread_id: String,
    pub status: SessionStatus,
    pub config: SessionConfig,
    pub scopes: Scope,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_merge_keeps_existing_when_patch_field_absent() {
        let base = SessionConfig {
            provider: Some("anthropic".into()),
            model: Some("claude".into()),
            temperature: Some(0.2),
            max_tokens: Some(4096),
            system_prompt: None,
        };
        let patch = SessionConfig {
            model: Some("claude-opus".into()),
            ..Default::default()
        };
        let merged = base.merged_with(&patch);
        assert_eq!(merged.provider.as_deref(), Some("anthropic"));
        assert_eq!(merged.model.as_deref(), Some("claude-opus"));
        assert_eq!(merged.temperature, Some(0.2));
    }

    #[test]
    fn config_merge_with_empty_patch_is_noop() {
        let base = SessionConfig {
            provider: Some("openai".into()),
            ..Default::default()
        };
        let merged = base.merged_with(&SessionConfig::default());
        assert_eq!(merged.provider.as_deref(), Some("openai"));
    }

    #[test]
    fn default_status_is_active() {
        assert_eq!(SessionStatus::default(), SessionStatus::Active);
    }
}
