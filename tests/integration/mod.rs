//! Integration tests
//!
//! Full sessions against in-memory applications.

mod api;
mod calls;
