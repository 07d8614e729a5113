//! Outbound publishing seam
//!
//! Services that push realtime events (the call coordinator, REST handlers)
//! depend on this trait instead of on `Hub` directly. Tests substitute a
//! recording implementation.

use bytes::Bytes;
use uuid::Uuid;

use crate::shared::Event;

/// Delivery operations a service may use to reach connected clients
///
/// Both operations are fire-and-forget: delivery is best-effort and a full
/// client queue is not reported back.
pub trait EventPublisher: Send + Sync {
    /// Deliver `event` to every subscriber of `channel_id`, on every instance
    fn broadcast(&self, channel_id: Uuid, event: &Event);

    /// Deliver pre-serialized bytes to every local connection of `user_id`
    fn send_to_user(&self, user_id: Uuid, payload: Bytes);
}
