/**
 * Backend Error Types
 *
 * This module defines the error types raised by the server side of the hub.
 *
 * # Error Categories
 *
 * ## Handler Errors
 *
 * Raised while serving REST requests: missing or malformed query parameters,
 * authentication failures, authorization failures.
 *
 * ## Domain Errors
 *
 * Call lifecycle errors (`CallError`) are converted into handler errors with
 * a status code that matches the failed precondition.
 *
 * ## Infrastructure Errors
 *
 * Persistence failures (`StoreError`) surface as 500s on REST paths. On the
 * realtime paths they are logged and dropped by the caller.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::calls::CallError;
use crate::shared::SharedError;

/// Persistence failure in the call store or channel directory
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back into a domain type
    #[error("Corrupt row: {0}")]
    Corrupt(#[from] SharedError),
}

/// Backend-specific error types
///
/// Every variant can be converted to an HTTP response (see `conversion`).
///
/// # Usage
///
/// ```rust
/// use axum::http::StatusCode;
/// use huddle::backend::error::BackendError;
///
/// let err = BackendError::handler(StatusCode::BAD_REQUEST, "channel_id query param required");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (e.g., missing parameters, invalid request)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Call lifecycle error
    #[error(transparent)]
    CallError(#[from] CallError),

    /// Persistence error
    #[error(transparent)]
    StoreError(#[from] StoreError),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    /// 401 with the given message
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::UNAUTHORIZED, message)
    }

    /// 403 with the given message
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::handler(StatusCode::FORBIDDEN, message)
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `HandlerError` - Uses the status code from the error
    /// - `CallError::NotFound` - 404
    /// - `CallError::AlreadyActive` / `CallError::NotRinging` - 409
    /// - `CallError::NotParticipant` - 403
    /// - `CallError::Store` / `StoreError` - 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::CallError(err) => match err {
                CallError::NotFound => StatusCode::NOT_FOUND,
                CallError::AlreadyActive | CallError::NotRinging => StatusCode::CONFLICT,
                CallError::NotParticipant => StatusCode::FORBIDDEN,
                CallError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message shown to clients
    ///
    /// Internal failures are reported generically; details go to the log.
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::CallError(CallError::Store(_)) | Self::StoreError(_) => {
                "internal server error".to_string()
            }
            Self::CallError(err) => err.to_string(),
        }
    }
}
