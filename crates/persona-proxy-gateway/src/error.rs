//! HTTP error mapping for the question endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use persona_proxy_core::CompletionError;
use serde_json::{json, Value};
use thiserror::Error;

pub const QUESTION_REQUIRED: &str = "question required";
pub const INVALID_BODY: &str = "invalid request body";
pub const INTERNAL_ERROR: &str = "internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("question required")]
    QuestionRequired,

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// Anything else that went wrong server-side (e.g. the upstream task aborted).
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error): (StatusCode, Value) = match self {
            ApiError::QuestionRequired => (StatusCode::BAD_REQUEST, json!(QUESTION_REQUIRED)),
            ApiError::InvalidBody(detail) => {
                tracing::debug!(%detail, "[API] Rejected request body");
                (StatusCode::BAD_REQUEST, json!(INVALID_BODY))
            }
            ApiError::Completion(CompletionError::Upstream { status, payload }) => {
                (relay_status(status), payload)
            }
            ApiError::Completion(e) => {
                tracing::error!(error = %e, "[API] Upstream request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!(INTERNAL_ERROR))
            }
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "[API] Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, json!(INTERNAL_ERROR))
            }
        };
        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Upstream status as-is when it is an error status; otherwise 502.
fn relay_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}
