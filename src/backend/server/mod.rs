//! Server Module
//!
//! Configuration, application state and startup.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs     - Module exports and documentation
//! ├── config.rs  - ServerConfig from HUDDLE_* variables, database and backplane loading
//! ├── state.rs   - AppState and FromRef implementations
//! └── init.rs    - State construction and app creation
//! ```
//!
//! Configuration is passed down explicitly: `RealtimeConfig` to the hub and
//! sessions, `CallConfig` to the coordinator, `WebRtcConfig` to the ICE
//! config endpoint. Nothing reads the environment after startup.

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

// Re-export commonly used types
pub use config::{CallConfig, RealtimeConfig, ServerConfig, ShutdownPolicy, WebRtcConfig};
pub use init::{build_state, create_app};
pub use state::AppState;
