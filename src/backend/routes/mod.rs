//! Route Configuration Module
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs         - Module exports and documentation
//! ├── router.rs      - Main router creation (public routes, fallback, tracing)
//! └── api_routes.rs  - Authenticated REST endpoints
//! ```

/// Main router creation
pub mod router;

/// API endpoint routes
pub mod api_routes;

pub use router::create_router;
