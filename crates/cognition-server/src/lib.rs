//! HTTP/SSE surface and turn orchestration (C7): wires C1–C6 into the
//! `Server` value §9 calls for, replacing the source's module globals.

mod error_response;
mod message_service;
mod routes;
mod state;

pub use routes::build_router;
pub use state::{AppState, SharedState};
