mod headers;
mod health;
mod messages;
mod sessions;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Builds the full HTTP/SSE surface (§6.1), wired to `state`.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/sessions", post(sessions::create_session).get(sessions::list_sessions))
        .route(
            "/sessions/:id",
            get(sessions::get_session).patch(sessions::patch_session).delete(sessions::delete_session),
        )
        .route("/sessions/:id/abort", post(sessions::abort_session))
        .route(
            "/sessions/:id/messages",
            post(messages::send_message).get(messages::list_messages),
        )
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
