//! Signaling relay
//!
//! SDP offers/answers and ICE candidates are forwarded to the target user's
//! connections only. The server never inspects `data`.

use bytes::Bytes;

use super::coordinator::CallCoordinator;
use crate::shared::{Event, EventType, SignalingMessage};

/// Serialize a signaling message as a channel-less event frame
pub fn signaling_frame(event_type: EventType, message: &SignalingMessage) -> Result<Bytes, serde_json::Error> {
    Event::new(event_type, None, message)?.to_bytes()
}

impl CallCoordinator {
    /// Forward a signaling message to `message.to_user`
    ///
    /// `from_user` must already be the authenticated sender.
    pub fn relay_signaling(&self, event_type: EventType, message: &SignalingMessage) {
        if !event_type.is_signaling() {
            tracing::warn!("[Calls] Refusing to relay {} as signaling", event_type);
            return;
        }

        match signaling_frame(event_type, message) {
            Ok(frame) => {
                tracing::debug!(
                    call_id = %message.call_id,
                    user_id = %message.to_user,
                    "[Calls] Relaying signaling"
                );
                self.publisher().send_to_user(message.to_user, frame);
            }
            Err(e) => tracing::warn!(call_id = %message.call_id, "[Calls] Failed to encode signaling: {}", e),
        }
    }
}
