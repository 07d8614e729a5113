//! Middleware Module
//!
//! HTTP middleware for the REST routes.
//!
//! - **`auth`** - Bearer-token authentication and the `AuthUser` extractor
//!
//! The websocket route is not wrapped: sessions authenticate with their
//! first frame instead.

pub mod auth;

pub use auth::{auth_middleware, extract_authenticated_user, AuthUser, AuthenticatedUser};
