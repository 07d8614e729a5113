//! Shared Error Types
//!
//! Errors raised while validating the wire types in `shared`. They carry no
//! server dependencies so clients can reuse them.
use thiserror::Error;

/// Errors produced by the shared wire types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// A field held a value outside its domain
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        message: String,
    },
}

impl SharedError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}
