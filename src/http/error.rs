use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::DeckCacheError;

/// Unified error type that renders as a JSON `{"error": "...", "details": "..."}`
/// response with an appropriate HTTP status code.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: String,
    pub details: String,
}

impl AppError {
    pub fn bad_request(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            details: details.into(),
        }
    }

    pub fn internal(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: error.into(),
            details: details.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.error, "details": self.details })),
        )
            .into_response()
    }
}

impl From<DeckCacheError> for AppError {
    fn from(e: DeckCacheError) -> Self {
        match &e {
            DeckCacheError::InvalidRequest(msg) => AppError::bad_request(e.kind(), msg.clone()),
            _ => AppError::internal(e.kind(), e.to_string()),
        }
    }
}
