//! HTTP error mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use berth_common::error::BerthError;

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A domain error from the coordinator or registry.
    #[error(transparent)]
    Berth(#[from] BerthError),

    /// The request body could not be decoded.
    #[error("malformed request body: {0}")]
    Body(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection.body_text())
    }
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Berth(e) => match e {
                BerthError::NotFound { .. } => StatusCode::NOT_FOUND,
                BerthError::InvalidSpec { .. } => StatusCode::BAD_REQUEST,
                BerthError::InUse { .. } => StatusCode::CONFLICT,
                BerthError::Busy { .. } => StatusCode::LOCKED,
                BerthError::Runtime { .. } => StatusCode::BAD_GATEWAY,
                BerthError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                BerthError::Io { .. } | BerthError::Config { .. } | BerthError::Serialization { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Body(_) => "invalid_spec",
            Self::Berth(e) => e.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
