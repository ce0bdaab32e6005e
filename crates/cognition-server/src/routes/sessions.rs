//! `/sessions` CRUD routes (§6.1).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use cognition_core::{validate_title, validate_workspace_path, Session, SessionConfig};
use cognition_storage::SessionPatch;
use serde::{Deserialize, Serialize};

use crate::error_response::ApiError;
use crate::routes::headers::canonicalize;
use crate::state::SharedState;

const DEFAULT_WORKSPACE_PATH: &str = "/workspace";

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub workspace_path: Option<String>,
    pub title: Option<String>,
    pub config: Option<SessionConfig>,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<Session>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct PatchSessionRequest {
    pub title: Option<String>,
    pub config: Option<SessionConfig>,
}

pub async fn create_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let header_map = canonicalize(&headers);
    let scope = state.scope_harness.extract_and_enforce(&header_map)?;

    let workspace_path = body.workspace_path.unwrap_or_else(|| DEFAULT_WORKSPACE_PATH.to_string());
    validate_workspace_path(&workspace_path)?;
    if let Some(title) = &body.title {
        validate_title(title)?;
    }

    let session = state
        .sessions
        .create(workspace_path, body.config.unwrap_or_default(), body.title, scope)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_sessions(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let header_map = canonicalize(&headers);
    let scope = state.scope_harness.extract_and_enforce(&header_map)?;
    let sessions = state.sessions.list(&scope).await?;
    let total = sessions.len();
    Ok(Json(ListSessionsResponse { sessions, total }))
}

pub async fn get_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let header_map = canonicalize(&headers);
    let scope = state.scope_harness.extract_and_enforce(&header_map)?;
    let session = state
        .sessions
        .get(&id, &scope)
        .await?
        .ok_or(cognition_core::CognitionError::NotFound)?;
    Ok(Json(session))
}

pub async fn patch_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PatchSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let header_map = canonicalize(&headers);
    let scope = state.scope_harness.extract_and_enforce(&header_map)?;
    if let Some(title) = &body.title {
        validate_title(title)?;
    }
    let session = state
        .sessions
        .update(
            &id,
            &scope,
            SessionPatch {
                title: body.title,
                status: None,
                config: body.config,
            },
        )
        .await?
        .ok_or(cognition_core::CognitionError::NotFound)?;
    Ok(Json(session))
}

pub async fn delete_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let header_map = canonicalize(&headers);
    let scope = state.scope_harness.extract_and_enforce(&header_map)?;
    let deleted = state.sessions.delete(&id, &scope).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(cognition_core::CognitionError::NotFound.into())
    }
}

pub async fn abort_session(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let header_map = canonicalize(&headers);
    crate::message_service::abort(&state, &id, &header_map).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
