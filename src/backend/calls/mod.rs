//! Calls Module
//!
//! Voice and video call lifecycle for channels: initiate, accept, decline,
//! hang up, the ringing timeout, and relaying WebRTC signaling between the
//! two sides. Media never passes through the server.
//!
//! # Module Structure
//!
//! ```text
//! calls/
//! ├── mod.rs          - Module exports and documentation
//! ├── coordinator.rs  - CallCoordinator, ringing timers, inbound call events
//! ├── signaling.rs    - Offer/answer/ICE relay to a single user
//! ├── store.rs        - CallStore trait and in-memory store
//! ├── db.rs           - PostgreSQL store
//! └── handlers.rs     - REST endpoints (history, active call, ICE config)
//! ```
//!
//! # Call States
//!
//! ```text
//! ringing ──accept──> in_progress ──last hangup──> ended
//!    │
//!    ├──decline──> declined
//!    ├──timeout──> missed
//!    └──last hangup──> ended
//! ```
//!
//! Every transition out of `ringing` is a conditional store update, so a
//! ringing call resolves exactly once.

pub mod coordinator;
pub mod db;
pub mod handlers;
pub mod signaling;
pub mod store;

pub use coordinator::{CallCoordinator, CallError, CALL_HISTORY_LIMIT};
pub use db::PgCallStore;
pub use store::{CallStore, MemoryCallStore};
