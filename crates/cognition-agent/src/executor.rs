//! The boundary trait standing in for the out-of-scope LLM+tool runtime (§4.6).

use std::pin::Pin;

use cognition_core::SessionConfig;
use futures::Stream;

/// The executor's own event vocabulary, translated to `CoreEvent` by
/// [`crate::driver::AgentDriver`]. Named distinctly from `CoreEvent` so the
/// translation boundary stays explicit (§4.6).
#[derive(Debug, Clone)]
pub enum NativeEvent {
    ContentDelta {
        content: String,
    },
    ToolStart {
        name: String,
        args: serde_json::Value,
        /// Empty when the executor didn't assign one; the driver mints a
        /// synthetic id in that case.
        id: String,
    },
    ToolEnd {
        id: String,
        output: String,
        exit_code: i32,
    },
    PlanningToolInvoked {
        todos: Vec<serde_json::Value>,
    },
    Usage {
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
    },
    Terminal,
    Error {
        message: String,
        code: Option<String>,
    },
}

pub type NativeEventStream = Pin<Box<dyn Stream<Item = NativeEvent> + Send>>;

/// One turn's invocation request (§4.6 model resolution / system prompt
/// assembly / invocation).
pub struct ExecutionRequest {
    pub thread_id: String,
    pub config: SessionConfig,
    pub system_prompt: String,
    pub user_message: String,
}

/// Stands in for the agent framework's planning loop and tool-execution
/// runtime (out of scope per spec.md §1). A real implementation would drive
/// an LLM and a sandboxed tool runtime; here it is a trait boundary plus, in
/// tests, [`crate::scripted::ScriptedExecutor`].
#[async_trait::async_trait]
pub trait AgentExecutor: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<NativeEventStream>;
}
