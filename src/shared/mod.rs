//! Shared Module
//!
//! Wire types shared by the server and its clients: the realtime event
//! envelope, call records and the errors raised while handling them. Nothing
//! here depends on the server stack, so a client crate can reuse it as-is.

/// Realtime event envelope and hub-produced payloads
pub mod event;

/// Call records and lifecycle statuses
pub mod call;

/// Shared error types
pub mod error;

/// Re-export commonly used types for convenience
pub use event::{Event, EventType, PresencePayload, SignalingMessage, TypingPayload};
pub use call::{Call, CallIdPayload, CallParticipant, CallStatus, CallType, InitiateCallRequest};
pub use error::SharedError;
