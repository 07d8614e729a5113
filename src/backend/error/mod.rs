//! Backend Error Module
//!
//! Error types specific to the server and their HTTP conversion.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - BackendError and StoreError
//! └── conversion.rs - IntoResponse for BackendError
//! ```
//!
//! Realtime paths never turn these into responses: a failed call transition
//! triggered by a socket frame is logged and dropped, and a backplane failure
//! degrades to local-only delivery.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::{BackendError, StoreError};
