//! Authentication Module
//!
//! Turns bearer tokens into identities for the websocket handshake and the
//! REST middleware. Users and token issuance live in the account service.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs      - Module exports and documentation
//! └── sessions.rs - Claims, TokenValidator and the JWT implementation
//! ```

/// JWT token validation
pub mod sessions;

pub use sessions::{AuthError, Claims, Identity, JwtValidator, TokenValidator};
