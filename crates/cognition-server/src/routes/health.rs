//! `/health` and `/ready` (§6.1).

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::{SharedState, VERSION};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_sessions: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: VERSION,
        active_sessions: state.active_session_count(),
        timestamp: chrono::Utc::now(),
    })
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
}

pub async fn ready(State(state): State<SharedState>) -> Json<ReadyResponse> {
    let ready = state.storage.health_check().await.is_ok();
    Json(ReadyResponse { ready })
}
