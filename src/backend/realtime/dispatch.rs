//! Inbound event routing
//!
//! Client frames that survive decoding land here. Typing indicators are
//! re-broadcast by the hub itself; call lifecycle and signaling frames go to
//! the configured `CallEventHandler` with the session's authenticated user id.
//! Every other event type is ignored: clients only originate these two kinds.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use super::connection::Connection;
use super::hub::Hub;
use crate::shared::{Event, EventType, TypingPayload};

/// Consumer of client-originated `call.*` events
#[async_trait]
pub trait CallEventHandler: Send + Sync {
    /// Handle one call event sent by `user_id`
    ///
    /// Identity fields inside the payload are not trusted; `user_id` is.
    async fn handle_call_event(&self, user_id: Uuid, event: Event);
}

/// Routes decoded frames from a connection's read loop
#[derive(Clone)]
pub struct InboundRouter {
    hub: Arc<Hub>,
    calls: Option<Arc<dyn CallEventHandler>>,
}

impl InboundRouter {
    pub fn new(hub: Arc<Hub>, calls: Option<Arc<dyn CallEventHandler>>) -> Self {
        Self { hub, calls }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub async fn dispatch(&self, connection: &Connection, event: Event) {
        if event.event_type == EventType::Typing {
            self.relay_typing(connection, &event);
            return;
        }

        if event.event_type.is_call_request() {
            match &self.calls {
                Some(calls) => calls.handle_call_event(connection.user_id(), event).await,
                None => tracing::debug!("[Session] No call handler configured, dropping {}", event.event_type),
            }
            return;
        }

        tracing::debug!(
            connection_id = %connection.id(),
            "[Session] Ignoring client event {}", event.event_type
        );
    }

    /// Re-broadcast a typing indicator built from the session identity
    ///
    /// Only subscribers of the channel may originate events for it, and the
    /// sender's own connection does not get its indicator echoed back.
    fn relay_typing(&self, connection: &Connection, event: &Event) {
        let Some(channel_id) = event.channel_id else {
            return;
        };
        if !connection.is_subscribed(channel_id) {
            tracing::debug!(
                connection_id = %connection.id(),
                channel_id = %channel_id,
                "[Session] Typing for unsubscribed channel dropped"
            );
            return;
        }

        let payload = TypingPayload {
            user_id: connection.user_id(),
            channel_id,
            user_name: connection.display_name().to_string(),
        };
        let bytes = match Event::new(EventType::Typing, Some(channel_id), &payload).and_then(|e| e.to_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("[Session] Failed to encode typing event: {}", e);
                return;
            }
        };

        self.hub.broadcast_to_channel(channel_id, bytes, Some(connection.id()));
    }
}
