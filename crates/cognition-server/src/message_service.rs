//! Orchestrates one turn end-to-end (C7, §4.7): admission, persistence,
//! SSE streaming, and cancellation.

use std::collections::HashMap;

use cognition_agent::ExecutionRequest;
use cognition_core::{
    validate_message_content, CancelHandle, CognitionError, CoreEvent, NewMessage, Result, Role,
    Scope,
};
use cognition_stream::SseBody;
use tokio::sync::mpsc;

use crate::state::SharedState;

/// "Scoped principal when available, else session ID" — the open rate-limit
/// key question (§9) resolved this way: sessions outside any configured
/// scope share no identity signal with the caller besides the session
/// itself, so the session ID is the fallback key.
fn rate_limit_key(scope: &Scope, session_id: &str) -> String {
    if scope.is_empty() {
        session_id.to_string()
    } else {
        scope
            .as_map()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// `SendMessage(sessionID, content, parentID?) → SSE response`.
pub async fn send_message(
    state: SharedState,
    session_id: String,
    headers: &HashMap<String, String>,
    content: String,
    parent_id: Option<String>,
    last_event_id: Option<String>,
) -> Result<SseBody> {
    // Step 1: admission.
    let scope = state.scope_harness.extract_and_enforce(headers)?;
    let session = state
        .sessions
        .get(&session_id, &scope)
        .await?
        .ok_or(CognitionError::NotFound)?;
    let key = rate_limit_key(&scope, &session_id);
    state.rate_limiter.check_rate_limit(&key)?;

    // A reconnect carrying `Last-Event-ID` only replays; the producer for
    // the original turn, if still running, keeps feeding the same buffer
    // (§4.5, §4.7 step 3, §9 "resume semantics when producer has ended").
    if let Some(last_id) = last_event_id {
        let buffer = state.buffer_for(&session_id);
        let cancel = state
            .active_turns
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| CancelHandle::new().0);
        return Ok(cognition_stream::spawn(
            buffer,
            None,
            Some(last_id),
            cancel,
            state.retry_ms,
            state.heartbeat_interval,
        ));
    }

    validate_message_content(&content)?;

    // Concurrency bounds (§4.7, §5).
    let permit = state
        .turn_semaphore
        .clone()
        .try_acquire_owned()
        .map_err(|_| CognitionError::ResourceExhausted("max_sessions reached".into()))?;

    let session_lock = state.session_lock_for(&session_id);
    let guard = if state.strict_serial {
        session_lock
            .try_lock_owned()
            .map_err(|_| CognitionError::Conflict(format!("turn already active for session {session_id}")))?
    } else {
        session_lock.lock_owned().await
    };

    // Step 2: persist the user message.
    state
        .storage
        .create_message(
            &session_id,
            NewMessage {
                role: Role::User,
                content: Some(content.clone()),
                parent_id,
                ..Default::default()
            },
        )
        .await?;
    let count_after_user = session.message_count + 1;
    state.storage.update_message_count(&session_id, count_after_user).await?;

    // Step 3: open the SSE response.
    let buffer = state.buffer_for(&session_id);

    // Step 4: start the driver, recording its cancellation handle.
    let (cancel_handle, cancel_rx) = CancelHandle::new();
    state.active_turns.insert(session_id.clone(), cancel_handle.clone());

    let request = ExecutionRequest {
        thread_id: session.thread_id.clone(),
        config: session.config.clone(),
        system_prompt: session.config.system_prompt.clone().unwrap_or_default(),
        user_message: content,
    };
    let driver_rx = state.agent_driver.spawn(request, cancel_rx);

    // Step 5: fan out — a relay task persists side effects and forwards
    // every event unchanged to the SSE writer (§9 "channels + tasks").
    let (fwd_tx, fwd_rx) = mpsc::channel(32);
    let relay_state = state.clone();
    let relay_session_id = session_id.clone();
    tokio::spawn(async move {
        let _permit = permit;
        let _guard = guard;
        relay(&relay_state, &relay_session_id, count_after_user, driver_rx, fwd_tx).await;
        // Step 6: finalize.
        relay_state.active_turns.remove(&relay_session_id);
    });

    Ok(cognition_stream::spawn(
        buffer,
        Some(fwd_rx),
        None,
        cancel_handle,
        state.retry_ms,
        state.heartbeat_interval,
    ))
}

/// `Abort(sessionID)` — idempotent lookup-and-trigger, scoped the same way
/// as every other per-session accessor (§4.3): a session outside the
/// caller's scope must 404, not silently "succeed".
pub async fn abort(state: &SharedState, session_id: &str, headers: &HashMap<String, String>) -> Result<()> {
    let scope = state.scope_harness.extract_and_enforce(headers)?;
    state
        .sessions
        .get(session_id, &scope)
        .await?
        .ok_or(CognitionError::NotFound)?;
    if let Some(entry) = state.active_turns.get(session_id) {
        entry.trigger();
    }
    Ok(())
}

fn assistant_metadata(status: &str, message: Option<&str>) -> serde_json::Value {
    if status == "completed" {
        return serde_json::Value::Null;
    }
    let mut obj = serde_json::json!({ "status": status });
    if let Some(message) = message {
        obj["message"] = serde_json::Value::String(message.to_string());
    }
    obj
}

/// Consumes driver events, persisting the side effects §4.7 step 5
/// requires, and forwards every event unchanged to the SSE writer.
async fn relay(
    state: &SharedState,
    session_id: &str,
    initial_count: u64,
    mut driver_rx: mpsc::Receiver<CoreEvent>,
    fwd_tx: mpsc::Sender<CoreEvent>,
) {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    let mut model_used = None;
    let mut count = initial_count;
    let mut finalized = false;

    while let Some(event) = driver_rx.recv().await {
        match &event {
            CoreEvent::Token { content: delta } => content.push_str(delta),
            CoreEvent::ToolCall { name, args, id } => {
                let request = cognition_core::ToolCallRequest {
                    id: id.clone(),
                    name: name.clone(),
                    args: args.clone(),
                };
                let result = state
                    .storage
                    .create_message(
                        session_id,
                        NewMessage {
                            role: Role::Assistant,
                            tool_calls: Some(vec![request.clone()]),
                            ..Default::default()
                        },
                    )
                    .await;
                if result.is_ok() {
                    count += 1;
                }
                tool_calls.push(request);
            }
            CoreEvent::ToolResult { id, output, exit_code } => {
                let result = state
                    .storage
                    .create_message(
                        session_id,
                        NewMessage {
                            role: Role::Tool,
                            content: Some(output.clone()),
                            tool_call_id: Some(id.clone()),
                            metadata: serde_json::json!({ "exit_code": exit_code }),
                            ..Default::default()
                        },
                    )
                    .await;
                if result.is_ok() {
                    count += 1;
                }
            }
            CoreEvent::Usage { provider, model, .. } => {
                model_used = Some(format!("{provider}/{model}"));
            }
            CoreEvent::Error { message, code } => {
                let status = if code.as_deref() == Some("cancelled") {
                    "interrupted"
                } else {
                    "error"
                };
                let result = state
                    .storage
                    .create_message(
                        session_id,
                        NewMessage {
                            role: Role::Assistant,
                            content: if content.is_empty() { None } else { Some(content.clone()) },
                            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls.clone()) },
                            model_used: model_used.clone(),
                            metadata: assistant_metadata(status, Some(message.as_str())),
                            ..Default::default()
                        },
                    )
                    .await;
                if result.is_ok() {
                    count += 1;
                }
                finalized = true;
            }
            CoreEvent::Done => {
                if !finalized {
                    let result = state
                        .storage
                        .create_message(
                            session_id,
                            NewMessage {
                                role: Role::Assistant,
                                content: if content.is_empty() { None } else { Some(content.clone()) },
                                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls.clone()) },
                                model_used: model_used.clone(),
                                metadata: assistant_metadata("completed", None),
                                ..Default::default()
                            },
                        )
                        .await;
                    if result.is_ok() {
                        count += 1;
                    }
                }
            }
            _ => {}
        }

        if fwd_tx.send(event).await.is_err() {
            break;
        }
    }

    if let Err(err) = state.storage.update_message_count(session_id, count).await {
        tracing::warn!(session_id, error = %err, "failed to update message_count after turn");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognition_core::Scope;

    fn scope(pairs: &[(&str, &str)]) -> Scope {
        Scope::from_map(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn rate_limit_key_falls_back_to_session_id_when_unscoped() {
        assert_eq!(rate_limit_key(&Scope::empty(), "s1"), "s1");
    }

    #[test]
    fn rate_limit_key_uses_scope_principal_when_present() {
        let key = rate_limit_key(&scope(&[("user", "alice")]), "s1");
        assert_eq!(key, "user=alice");
    }

    #[test]
    fn completed_status_has_null_metadata() {
        assert_eq!(assistant_metadata("completed", None), serde_json::Value::Null);
    }

    #[test]
    fn interrupted_status_carries_message() {
        let metadata = assistant_metadata("interrupted", Some("turn cancelled"));
        assert_eq!(metadata["status"], "interrupted");
        assert_eq!(metadata["message"], "turn cancelled");
    }
}
