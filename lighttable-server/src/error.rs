//! Error types for lighttable-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
///
/// Every variant renders as `{"error": "<message>"}` with its status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, invalid or expired session (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not permitted (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Conflict (409), e.g. transcode already running
    #[error("{0}")]
    Conflict(String),

    /// Upload exceeds the configured limit (413)
    #[error("File too large")]
    PayloadTooLarge,

    /// Internal server error (500); details are logged, not returned
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn forbidden() -> Self {
        ApiError::Forbidden("Access denied".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<lighttable_common::Error> for ApiError {
    fn from(err: lighttable_common::Error) -> Self {
        use lighttable_common::Error;

        match err {
            Error::NotFound(what) => ApiError::NotFound(format!("Not found: {}", what)),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::ListingFailed(_) => ApiError::Internal("Failed to list files".to_string()),
            Error::Encoder(msg) => {
                error!("Encoder failure: {}", msg);
                ApiError::Internal("Video processing failed".to_string())
            }
            other => {
                error!("Internal error: {}", other);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
