//! Gateway error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eg_02_pull_delivery::ReceiveError;
use serde::Serialize;
use shared_types::FormatError;
use std::fmt;

/// Error codes carried in [`ApiError`] bodies
pub mod codes {
    pub const BAD_REQUEST: &str = "BadRequest";
    pub const NOT_FOUND: &str = "NotFound";
    pub const SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";
}

/// Client-visible error, serialized as `{ code, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Body could not be understood
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, details)
    }

    /// Topic, subscription or route does not exist
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            format!("Resource not found: {}", resource.into()),
        )
    }

    /// Emulator is shutting down
    pub fn unavailable(details: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, codes::SERVICE_UNAVAILABLE, details)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<FormatError> for ApiError {
    fn from(e: FormatError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

impl From<ReceiveError> for ApiError {
    fn from(e: ReceiveError) -> Self {
        ApiError::unavailable(e.to_string())
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Gateway-level errors (startup and serving, not per request)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Listener could not be bound
    #[error("server bind error: {0}")]
    Bind(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
