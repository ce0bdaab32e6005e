/// End-to-end tests driving the HTTP/SSE surface with a real router and an
/// in-memory storage backend, following the shape of the teacher's own
/// `tests/integration_test.rs`.
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use cognition_agent::{AgentDriver, ScriptedExecutor};
use cognition_policy::{RateLimitConfig, RateLimiter, ScopeConfig, ScopeHarness};
use cognition_server::{AppState, SharedState};
use cognition_storage::StorageConfig;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_state(scope: ScopeConfig, rate_limit: RateLimitConfig, strict_serial: bool) -> SharedState {
    let storage = cognition_storage::build(&StorageConfig::Memory).await.unwrap();
    let rate_limiter = Arc::new(RateLimiter::new(rate_limit));
    let scope_harness = ScopeHarness::new(scope);
    let executor = Arc::new(ScriptedExecutor::always_text("hello from the test double"));
    let agent_driver = AgentDriver::new(executor);
    Arc::new(AppState::new(
        storage,
        rate_limiter,
        scope_harness,
        agent_driver,
        /* max_sessions */ 10,
        /* event_buffer_capacity */ 100,
        Duration::from_secs(15),
        /* retry_ms */ 50,
        strict_serial,
    ))
}

fn unscoped() -> ScopeConfig {
    ScopeConfig {
        scope_keys: Vec::new(),
        scoping_enabled: false,
    }
}

fn generous_rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_minute: 600,
        burst_size: 50,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// S1: create a session, send a message, and read the user + assistant
/// turns back through the history endpoint.
#[tokio::test]
async fn happy_path_session_and_message_round_trip() {
    let state = test_state(unscoped(), generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "title": "demo" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);
    let session = body_json(create).await;
    let session_id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["title"], "demo");

    let send = router
        .clone()
        .oneshot(
            Request::post(format!("/sessions/{session_id}/messages"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "content": "hi there" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(send.status(), StatusCode::OK);
    assert_eq!(
        send.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let sse = to_bytes(send.into_body(), usize::MAX).await.unwrap();
    let sse_text = String::from_utf8(sse.to_vec()).unwrap();
    assert!(sse_text.starts_with("retry:"));
    assert!(sse_text.contains("event: token") || sse_text.contains("event: done"));

    let history = router
        .clone()
        .oneshot(
            Request::get(format!("/sessions/{session_id}/messages"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(history.status(), StatusCode::OK);
    let page = body_json(history).await;
    let messages = page["messages"].as_array().unwrap();
    assert!(messages.iter().any(|m| m["role"] == "user"));
    assert!(messages.iter().any(|m| m["role"] == "assistant"));
}

/// S3: a caller in one scope cannot see or mutate a session created under
/// another scope.
#[tokio::test]
async fn scoped_session_is_invisible_outside_its_scope() {
    let scope = ScopeConfig {
        scope_keys: vec!["user".to_string()],
        scoping_enabled: true,
    };
    let state = test_state(scope, generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .header("X-Cognition-Scope-User", "alice")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);
    let session_id = body_json(create).await["id"].as_str().unwrap().to_string();

    let as_bob = router
        .clone()
        .oneshot(
            Request::get(format!("/sessions/{session_id}"))
                .header("X-Cognition-Scope-User", "bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(as_bob.status(), StatusCode::NOT_FOUND);

    let as_alice = router
        .oneshot(
            Request::get(format!("/sessions/{session_id}"))
                .header("X-Cognition-Scope-User", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(as_alice.status(), StatusCode::OK);
}

/// A caller missing a required scope header is rejected before any
/// storage lookup happens.
#[tokio::test]
async fn missing_scope_header_is_rejected_fail_closed() {
    let scope = ScopeConfig {
        scope_keys: vec!["user".to_string()],
        scoping_enabled: true,
    };
    let state = test_state(scope, generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let resp = router
        .oneshot(
            Request::get("/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "forbidden");
    assert_eq!(body["details"]["missing_headers"][0], "X-Cognition-Scope-User");
}

/// S4: once the bucket is exhausted, further sends for the same session
/// are rejected with 429 until it refills.
#[tokio::test]
async fn rate_limit_exhaustion_returns_429() {
    let tight = RateLimitConfig {
        requests_per_minute: 60,
        burst_size: 1,
    };
    let state = test_state(unscoped(), tight, false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let session_id = body_json(create).await["id"].as_str().unwrap().to_string();

    let first = router
        .clone()
        .oneshot(
            Request::post(format!("/sessions/{session_id}/messages"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "content": "one" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let _ = to_bytes(first.into_body(), usize::MAX).await.unwrap();

    let second = router
        .oneshot(
            Request::post(format!("/sessions/{session_id}/messages"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "content": "two" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

/// S5: aborting a session with no active turn is idempotent and never
/// errors.
#[tokio::test]
async fn abort_with_no_active_turn_is_idempotent() {
    let state = test_state(unscoped(), generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let session_id = body_json(create).await["id"].as_str().unwrap().to_string();

    let abort = router
        .oneshot(
            Request::post(format!("/sessions/{session_id}/abort"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(abort.status(), StatusCode::OK);
    let body = body_json(abort).await;
    assert_eq!(body["success"], true);
}

/// Aborting a session that doesn't exist 404s rather than reporting success.
#[tokio::test]
async fn abort_unknown_session_is_not_found() {
    let state = test_state(unscoped(), generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let abort = router
        .oneshot(
            Request::post("/sessions/does-not-exist/abort")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(abort.status(), StatusCode::NOT_FOUND);
}

/// A caller cannot abort a session that belongs to a different scope.
#[tokio::test]
async fn abort_is_scoped_like_every_other_session_accessor() {
    let scope = ScopeConfig {
        scope_keys: vec!["user".to_string()],
        scoping_enabled: true,
    };
    let state = test_state(scope, generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .header("X-Cognition-Scope-User", "alice")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let session_id = body_json(create).await["id"].as_str().unwrap().to_string();

    let as_bob = router
        .oneshot(
            Request::post(format!("/sessions/{session_id}/abort"))
                .header("X-Cognition-Scope-User", "bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(as_bob.status(), StatusCode::NOT_FOUND);
}

/// A caller cannot read another tenant's message history by guessing its
/// session ID.
#[tokio::test]
async fn list_messages_is_scoped_like_send_message() {
    let scope = ScopeConfig {
        scope_keys: vec!["user".to_string()],
        scoping_enabled: true,
    };
    let state = test_state(scope, generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .header("X-Cognition-Scope-User", "alice")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let session_id = body_json(create).await["id"].as_str().unwrap().to_string();

    let as_bob = router
        .clone()
        .oneshot(
            Request::get(format!("/sessions/{session_id}/messages"))
                .header("X-Cognition-Scope-User", "bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(as_bob.status(), StatusCode::NOT_FOUND);

    let as_alice = router
        .oneshot(
            Request::get(format!("/sessions/{session_id}/messages"))
                .header("X-Cognition-Scope-User", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(as_alice.status(), StatusCode::OK);
}

/// Sending to a session that doesn't exist is a 404, not a panic.
#[tokio::test]
async fn send_message_to_unknown_session_is_not_found() {
    let state = test_state(unscoped(), generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let resp = router
        .oneshot(
            Request::post("/sessions/does-not-exist/messages")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "content": "hi" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

/// `/health` always reports healthy; `/ready` reflects the storage
/// backend's own probe.
#[tokio::test]
async fn health_and_ready_reflect_storage_state() {
    let state = test_state(unscoped(), generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let health = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(body_json(health).await["status"], "healthy");

    let ready = router
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(body_json(ready).await["ready"], true);
}

/// Patching a session's title is visible on a subsequent get; empty
/// titles are rejected by the same validation `MessageService` uses.
#[tokio::test]
async fn patch_session_title_validates_and_persists() {
    let state = test_state(unscoped(), generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let session_id = body_json(create).await["id"].as_str().unwrap().to_string();

    let rejected = router
        .clone()
        .oneshot(
            Request::patch(format!("/sessions/{session_id}"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "title": "bad\u{0001}title" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::CONFLICT);

    let patched = router
        .clone()
        .oneshot(
            Request::patch(format!("/sessions/{session_id}"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "title": "renamed" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(patched.status(), StatusCode::OK);
    assert_eq!(body_json(patched).await["title"], "renamed");

    let fetched = router
        .oneshot(
            Request::get(format!("/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(fetched).await["title"], "renamed");
}

/// Deleting a session twice: the second delete is a 404, not a 204.
#[tokio::test]
async fn delete_session_is_not_repeatable() {
    let state = test_state(unscoped(), generous_rate_limit(), false).await;
    let router = cognition_server::build_router(state);

    let create = router
        .clone()
        .oneshot(
            Request::post("/sessions")
                .header("content-type", "application/json")
                .body(Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let session_id = body_json(create).await["id"].as_str().unwrap().to_string();

    let first = router
        .clone()
        .oneshot(
            Request::delete(format!("/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let second = router
        .oneshot(
            Request::delete(format!("/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}
