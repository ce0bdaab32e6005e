//! Deterministic [`AgentExecutor`] test double, mirroring the teacher's
//! `ScriptedMockProvider` — the out-of-scope LLM is never implemented for
//! real, only scripted for tests.

use std::sync::Mutex;
use std::time::Duration;

use futures::stream;
use futures::StreamExt;

use crate::executor::{AgentExecutor, ExecutionRequest, NativeEvent, NativeEventStream};

pub struct ScriptedExecutor {
    scripts: Mutex<Vec<Vec<NativeEvent>>>,
    delay_between_events: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new(scripts: Vec<Vec<NativeEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            delay_between_events: None,
        }
    }

    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![vec![
            NativeEvent::ContentDelta { content: reply.into() },
            NativeEvent::Terminal,
        ]])
    }

    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
        tool_output: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        let id = tool_id.into();
        Self::new(vec![vec![
            NativeEvent::ToolStart {
                name: tool_name.into(),
                args,
                id: id.clone(),
            },
            NativeEvent::ToolEnd {
                id,
                output: tool_output.into(),
                exit_code: 0,
            },
            NativeEvent::ContentDelta { content: final_text.into() },
            NativeEvent::Terminal,
        ]])
    }

    /// Emits one `ContentDelta` per string, each after `delay_between_events`
    /// has elapsed — used to exercise mid-turn cancellation in tests.
    pub fn slow_tokens(tokens: Vec<&str>) -> Self {
        let events = tokens
            .into_iter()
            .map(|t| NativeEvent::ContentDelta { content: t.to_string() })
            .chain(std::iter::once(NativeEvent::Terminal))
            .collect();
        Self {
            scripts: Mutex::new(vec![events]),
            delay_between_events: Some(Duration::from_millis(100)),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![vec![
            NativeEvent::Error {
                message: message.into(),
                code: Some("internal".into()),
            },
            NativeEvent::Terminal,
        ]])
    }
}

#[async_trait::async_trait]
impl AgentExecutor for ScriptedExecutor {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, _request: ExecutionRequest) -> anyhow::Result<NativeEventStream> {
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                vec![
                    NativeEvent::ContentDelta { content: "[no more scripts]".into() },
                    NativeEvent::Terminal,
                ]
            } else {
                scripts.remove(0)
            }
        };

        if let Some(delay) = self.delay_between_events {
            let s = stream::iter(events).then(move |ev| async move {
                tokio::time::sleep(delay).await;
                ev
            });
            Ok(Box::pin(s))
        } else {
            Ok(Box::pin(stream::iter(events)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognition_core::SessionConfig;
    use futures::StreamExt;

    fn req() -> ExecutionRequest {
        ExecutionRequest {
            thread_id: "t".into(),
            config: SessionConfig::default(),
            system_prompt: "sp".into(),
            user_message: "hi".into(),
        }
    }

    #[tokio::test]
    async fn always_text_emits_content_then_terminal() {
        let e = ScriptedExecutor::always_text("hello");
        let mut s = e.execute(req()).await.unwrap();
        let first = s.next().await.unwrap();
        assert!(matches!(first, NativeEvent::ContentDelta { content } if content == "hello"));
        let second = s.next().await.unwrap();
        assert!(matches!(second, NativeEvent::Terminal));
    }

    #[tokio::test]
    async fn exhausted_scripts_fall_back_to_default_reply() {
        let e = ScriptedExecutor::new(vec![]);
        let mut s = e.execute(req()).await.unwrap();
        let first = s.next().await.unwrap();
        assert!(matches!(first, NativeEvent::ContentDelta { content } if content.contains("no more scripts")));
    }
}
