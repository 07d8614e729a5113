//! Backend Module
//!
//! All server-side code: an Axum HTTP server whose main job is keeping
//! websocket sessions fed with channel events, plus call coordination.
//!
//! # Architecture
//!
//! - **`server`** - Configuration, application state, initialization
//! - **`routes`** - Router assembly
//! - **`realtime`** - Sessions, hub, presence, backplane bridge
//! - **`calls`** - Call lifecycle, ringing timeout, signaling relay, REST
//! - **`auth`** - Token validation shared by REST and the socket handshake
//! - **`directory`** - Channel membership lookups
//! - **`middleware`** - Bearer authentication for REST routes
//! - **`error`** - Backend error types and their HTTP conversion
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs
//! ├── main.rs        - Binary entry point
//! ├── server/
//! ├── routes/
//! ├── realtime/
//! ├── calls/
//! ├── auth/
//! ├── directory/
//! ├── middleware/
//! └── error/
//! ```
//!
//! # Multi-instance Deployments
//!
//! Several instances can serve the same clients. Channel broadcasts go
//! through the backplane (Redis pub/sub) so every instance re-delivers them
//! to its own sessions. Presence and per-user delivery stay local to the
//! instance holding the connection.

pub mod auth;
pub mod calls;
pub mod directory;
pub mod error;
pub mod middleware;
pub mod realtime;
pub mod routes;
pub mod server;
