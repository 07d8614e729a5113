//! Huddle
//!
//! Realtime fan-out hub and call signaling for a team chat server.
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types: the event envelope, call records, shared errors
//! - **`backend`** - The server: realtime hub, cross-instance backplane,
//!   call coordinator, REST routes, configuration
//!
//! # Usage
//!
//! ```rust,no_run
//! use huddle::backend::server::{build_state, create_app, ServerConfig};
//!
//! # async fn example() -> std::io::Result<()> {
//! let state = build_state(ServerConfig::from_env()).await;
//! let app = create_app(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod shared;
pub mod backend;
