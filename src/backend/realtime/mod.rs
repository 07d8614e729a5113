//! Real-time Fan-out Module
//!
//! Live websocket sessions, the hub that fans events out to them, and the
//! bridge that carries channel broadcasts between server instances.
//!
//! # Architecture
//!
//! - **`connection`** - One session: outbound queue, subscriptions, read and write loops
//! - **`registry`** - Connection map owned by the hub loop
//! - **`hub`** - Register/unregister lifecycle, channel and user delivery, presence
//! - **`publisher`** - `EventPublisher`, the seam services publish through
//! - **`dispatch`** - Routing of client frames (typing, call events)
//! - **`backplane`** - Bus abstraction, topic naming, in-process bus
//! - **`redis`** - Redis pub/sub bus
//! - **`bridge`** - Publishes local broadcasts, re-delivers remote ones
//! - **`handshake`** - First-frame authentication and session start
//! - **`handler`** - Axum upgrade handler
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs
//! ├── connection.rs
//! ├── registry.rs
//! ├── hub.rs
//! ├── publisher.rs
//! ├── dispatch.rs
//! ├── backplane.rs
//! ├── redis.rs
//! ├── bridge.rs
//! ├── handshake.rs
//! └── handler.rs
//! ```
//!
//! # Data Flow
//!
//! ```text
//! client frame -> read loop -> InboundRouter -> Hub::broadcast_to_channel -> local queues
//!                                  |                       |
//!                                  v                       v
//!                           CallEventHandler        BackplaneBridge -> other instances
//! ```
//!
//! Delivery is best-effort: a connection whose queue is full misses the
//! message, and nothing is retried.

pub mod backplane;
pub mod bridge;
pub mod connection;
pub mod dispatch;
pub mod handler;
pub mod handshake;
pub mod hub;
pub mod publisher;
pub mod redis;
pub mod registry;

pub use backplane::{Backplane, BackplaneError, BackplaneMessage, MemoryBackplane};
pub use connection::Connection;
pub use dispatch::{CallEventHandler, InboundRouter};
pub use handler::{health, online_users, ws_handler};
pub use handshake::{serve_session, HandshakeError, SessionContext};
pub use hub::{Hub, HubError};
pub use publisher::EventPublisher;
pub use self::redis::RedisBackplane;
