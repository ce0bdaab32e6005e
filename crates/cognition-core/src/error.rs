use thiserror::Error;

/// The error kinds carried through every layer of the server (§7).
///
/// Each variant keeps enough structured detail for its HTTP/SSE mapping:
/// `RateLimited` needs the bucket key and window back on the wire,
/// `Forbidden` needs the list of headers the caller was missing.
#[derive(Debug, Error)]
pub enum CognitionError {
    #[error("not found")]
    NotFound,

    #[error("already exists: {id}")]
    AlreadyExists { id: String },

    #[error("forbidden: missing required scope headers: {missing_headers:?}")]
    Forbidden { missing_headers: Vec<String> },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("rate limited")]
    RateLimited {
        resource: String,
        limit: u32,
        window_seconds: u64,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cancelled")]
    Cancelled,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CognitionError {
    /// Stable wire code used in both HTTP error bodies and SSE `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Forbidden { .. } => "forbidden",
            Self::ResourceExhausted(_) => "resource_exhausted",
            Self::RateLimited { .. } => "rate_limited",
            Self::Conflict(_) => "conflict",
            Self::Cancelled => "cancelled",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status this error kind maps to when it aborts a request before
    /// any SSE stream is opened (§7 propagation policy).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::AlreadyExists { .. } => 409,
            Self::Forbidden { .. } => 403,
            Self::ResourceExhausted(_) => 429,
            Self::RateLimited { .. } => 429,
            Self::Conflict(_) => 409,
            Self::Cancelled => 499,
            Self::Unavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Structured `details` payload for the `{error:true, code, message, details}`
    /// HTTP error body (§7).
    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::Forbidden { missing_headers } => serde_json::json!({
                "missing_headers": missing_headers,
            }),
            Self::RateLimited {
                resource,
                limit,
                window_seconds,
            } => serde_json::json!({
                "resource": resource,
                "limit": limit,
                "window_seconds": window_seconds,
            }),
            Self::AlreadyExists { id } => serde_json::json!({ "id": id }),
            _ => serde_json::Value::Null,
        }
    }
}

pub type Result<T> = std::result::Result<T, CognitionError>;
