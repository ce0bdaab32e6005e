//! `/sessions/{id}/messages` routes: SSE turn submission and history (§6.1).

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use cognition_core::validate_message_content;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error_response::ApiError;
use crate::routes::headers::canonicalize;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<cognition_core::Message>,
    pub total: u64,
}

pub async fn send_message(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_message_content(&body.content)?;
    let header_map = canonicalize(&headers);
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body_stream = crate::message_service::send_message(
        state,
        session_id,
        &header_map,
        body.content,
        body.parent_id,
        last_event_id,
    )
    .await?
    .map(|frame| Ok::<_, std::convert::Infallible>(Bytes::from(frame)));

    let mut response = axum::response::Response::new(Body::from_stream(body_stream));
    response
        .headers_mut()
        .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response
        .headers_mut()
        .insert(axum::http::header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

pub async fn list_messages(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let header_map = canonicalize(&headers);
    let scope = state.scope_harness.extract_and_enforce(&header_map)?;
    state
        .sessions
        .get(&session_id, &scope)
        .await?
        .ok_or(cognition_core::CognitionError::NotFound)?;

    let page = state
        .storage
        .get_messages_by_session(&session_id, query.limit.unwrap_or(100), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(MessagesResponse {
        messages: page.messages,
        total: page.total,
    }))
}
