//! Native-event → `CoreEvent` translation (§4.6 mapping table).

use cognition_core::CoreEvent;

use crate::cost::estimate_tokens;
use crate::executor::NativeEvent;

const DEFAULT_PROVIDER: &str = "default";
const DEFAULT_MODEL: &str = "default";

/// Per-turn translation state: the last tool-call id seen (so a `ToolEnd`
/// with no id of its own still produces a correctly-correlated
/// `ToolResult`) and the running fallback token counters used when the
/// executor never reports exact `Usage`.
pub struct EventTranslator {
    provider: String,
    model: String,
    last_tool_call_id: Option<String>,
    fallback_input_tokens: u32,
    fallback_output_tokens: u32,
    exact_input_tokens: Option<u32>,
    exact_output_tokens: Option<u32>,
    next_synthetic_id: u32,
}

impl EventTranslator {
    pub fn new(provider: Option<String>, model: Option<String>, input_content: &str) -> Self {
        Self {
            provider: provider.unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            last_tool_call_id: None,
            fallback_input_tokens: estimate_tokens(input_content),
            fallback_output_tokens: 0,
            exact_input_tokens: None,
            exact_output_tokens: None,
            next_synthetic_id: 0,
        }
    }

    fn mint_id(&mut self) -> String {
        self.next_synthetic_id += 1;
        format!("tc-synthetic-{}", self.next_synthetic_id)
    }

    /// Translate one native event. Most map to exactly one `CoreEvent`;
    /// `Usage` updates internal counters without emitting anything itself
    /// (the final `usage` event is built separately via [`Self::usage_event`]).
    pub fn translate(&mut self, native: NativeEvent) -> Option<CoreEvent> {
        match native {
            NativeEvent::ContentDelta { content } => {
                self.fallback_output_tokens += estimate_tokens(&content);
                Some(CoreEvent::Token { content })
            }
            NativeEvent::ToolStart { name, args, id } => {
                let id = if id.is_empty() { self.mint_id() } else { id };
                self.last_tool_call_id = Some(id.clone());
                Some(CoreEvent::ToolCall { name, args, id })
            }
            NativeEvent::ToolEnd {
                id,
                output,
                exit_code,
            } => {
                let id = if id.is_empty() {
                    self.last_tool_call_id.clone().unwrap_or_else(|| self.mint_id())
                } else {
                    id
                };
                Some(CoreEvent::ToolResult {
                    id,
                    output,
                    exit_code,
                })
            }
            NativeEvent::PlanningToolInvoked { todos } => Some(CoreEvent::Planning { todos }),
            NativeEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                if let Some(t) = input_tokens {
                    self.exact_input_tokens = Some(t);
                }
                if let Some(t) = output_tokens {
                    self.exact_output_tokens = Some(t);
                }
                None
            }
            NativeEvent::Error { message, code } => Some(CoreEvent::Error { message, code }),
            NativeEvent::Terminal => None,
        }
    }

    /// Build the final `Usage` event (§4.6), preferring exact counts reported
    /// by the executor over the content-length fallback.
    pub fn usage_event(&self) -> CoreEvent {
        let input_tokens = self.exact_input_tokens.unwrap_or(self.fallback_input_tokens);
        let output_tokens = self.exact_output_tokens.unwrap_or(self.fallback_output_tokens);
        let cost_estimate = crate::cost::estimate_cost(&self.provider, &self.model, input_tokens, output_tokens);
        CoreEvent::Usage {
            input_tokens,
            output_tokens,
            cost_estimate,
            provider: self.provider.clone(),
            model: self.model.clone(),
        }
    }
}
