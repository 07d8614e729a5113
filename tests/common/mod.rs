//! Common test utilities and helpers
//!
//! - Token helpers
//! - In-memory application fixtures
//! - A duplex websocket client driving `serve_session`
//! - A publisher that records what the call coordinator emits

pub mod auth_helpers;
pub mod publisher;
pub mod socket;

// Re-export commonly used utilities
pub use app::*;
pub use auth_helpers::*;
pub use publisher::*;
pub use socket::*;
