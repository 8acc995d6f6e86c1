//! # API Error Type
//!
//! What HTTP and WebSocket callers receive when an operation fails.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FiscalError (strict mode) ──┐                                          │
//! │  PropertyError ──────────────┼──► ApiError { code, message }            │
//! │  bad request body ───────────┘        │                                 │
//! │                                       ├──► HTTP: status + JSON body     │
//! │                                       └──► WS:   {"id", "error"}        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! In permissive mode operations never fail; callers read the
//! `Exception` property instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fiscal_core::{FiscalError, PropertyError};
use serde::Serialize;

/// API error returned to remote callers.
///
/// ```json
/// {
///   "code": "UNKNOWN_CODE",
///   "message": "Unknown document kind code: 4"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Unknown brand or bad addressing (400)
    ConfigurationError,

    /// Regulatory code not in the mapping (422)
    UnknownCode,

    /// Operation not allowed in the current document state (409)
    InvalidState,

    /// Credit note without reference (422)
    MissingReference,

    /// No printer connected (409)
    NotConnected,

    /// Printer or driver failure (502)
    DriverError,

    /// Input validation failed (400)
    ValidationError,

    /// Unknown property name (404)
    UnknownProperty,

    /// Write to a read-only property (405)
    ReadOnlyProperty,

    /// Request body or frame could not be parsed (400)
    BadRequest,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ConfigurationError
            | ErrorCode::ValidationError
            | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::UnknownCode | ErrorCode::MissingReference => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::InvalidState | ErrorCode::NotConnected => StatusCode::CONFLICT,
            ErrorCode::DriverError => StatusCode::BAD_GATEWAY,
            ErrorCode::UnknownProperty => StatusCode::NOT_FOUND,
            ErrorCode::ReadOnlyProperty => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<FiscalError> for ApiError {
    fn from(err: FiscalError) -> Self {
        let code = match &err {
            FiscalError::Configuration(_) => ErrorCode::ConfigurationError,
            FiscalError::UnknownCode { .. } => ErrorCode::UnknownCode,
            FiscalError::InvalidState { .. } => ErrorCode::InvalidState,
            FiscalError::MissingReference { .. } => ErrorCode::MissingReference,
            FiscalError::NotConnected => ErrorCode::NotConnected,
            FiscalError::Driver(_) => ErrorCode::DriverError,
            FiscalError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<PropertyError> for ApiError {
    fn from(err: PropertyError) -> Self {
        let code = match &err {
            PropertyError::Unknown(_) => ErrorCode::UnknownProperty,
            PropertyError::ReadOnly(_) => ErrorCode::ReadOnlyProperty,
            PropertyError::InvalidValue { .. } => ErrorCode::ValidationError,
        };
        ApiError::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}
