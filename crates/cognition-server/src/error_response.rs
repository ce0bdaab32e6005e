//! Maps [`CognitionError`] to the `{error:true, code, message, details}`
//! HTTP error body (§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cognition_core::CognitionError;

pub struct ApiError(pub CognitionError);

impl From<CognitionError> for ApiError {
    fn from(err: CognitionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": true,
            "code": self.0.code(),
            "message": self.0.to_string(),
            "details": self.0.details(),
        }));
        (status, body).into_response()
    }
}
