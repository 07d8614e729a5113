/**
 * Backplane Bridge
 *
 * Connects one hub to the cross-instance bus.
 *
 * # Outbound
 *
 * Locally-originated channel broadcasts are queued to a single publisher task,
 * which wraps each payload in a `BackplaneEnvelope` carrying this instance's
 * id and publishes it on the channel's topic. The queue is bounded; when it
 * is full the backplane copy is dropped and local delivery is unaffected.
 *
 * # Inbound
 *
 * One wildcard subscription covers every channel topic. Envelopes stamped
 * with our own instance id are discarded (they were delivered locally before
 * being published). Everything else is delivered to local subscribers of the
 * channel named by the topic, and is never re-published.
 *
 * # Failure
 *
 * Backplane errors are logged and never reach callers. If the subscription
 * cannot be opened the hub runs with local-only fan-out.
 */

use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::backplane::{channel_from_topic, channel_pattern, channel_topic, Backplane, BackplaneEnvelope, BackplaneMessage};
use super::registry::Registry;
use crate::backend::server::config::RealtimeConfig;

/// Handle for queueing outbound backplane publishes
#[derive(Debug)]
pub struct BackplaneBridge {
    instance_id: String,
    publish_tx: mpsc::Sender<(Uuid, Bytes)>,
}

impl BackplaneBridge {
    /// Open the wildcard subscription and spawn the publisher and subscriber
    /// tasks
    ///
    /// The subscription is live when this returns. Both tasks end when
    /// `shutdown` is cancelled.
    pub async fn start(
        backplane: Arc<dyn Backplane>,
        registry: Arc<Registry>,
        config: &RealtimeConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_queue_capacity.max(1));

        tokio::spawn(run_publisher(
            backplane.clone(),
            publish_rx,
            config.instance_id.clone(),
            config.topic_prefix.clone(),
            shutdown.clone(),
        ));

        let pattern = channel_pattern(&config.topic_prefix);
        match backplane.psubscribe(&pattern).await {
            Ok(messages) => {
                tokio::spawn(run_subscriber(
                    messages,
                    registry,
                    config.instance_id.clone(),
                    config.topic_prefix.clone(),
                    shutdown,
                ));
            }
            Err(e) => {
                tracing::error!("[Backplane] Subscribe to {} failed, remote events will not arrive: {}", pattern, e);
            }
        }

        Self {
            instance_id: config.instance_id.clone(),
            publish_tx,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Queue a channel broadcast for other instances
    pub fn publish(&self, channel_id: Uuid, payload: Bytes) {
        match self.publish_tx.try_send((channel_id, payload)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(channel_id = %channel_id, "[Backplane] Publish queue full, event not fanned out");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(channel_id = %channel_id, "[Backplane] Publisher stopped, event not fanned out");
            }
        }
    }
}

async fn run_publisher(
    backplane: Arc<dyn Backplane>,
    mut queue: mpsc::Receiver<(Uuid, Bytes)>,
    instance_id: String,
    topic_prefix: String,
    shutdown: CancellationToken,
) {
    loop {
        let (channel_id, payload) = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = queue.recv() => match next {
                Some(item) => item,
                None => break,
            },
        };

        let envelope = match BackplaneEnvelope::wrap(&instance_id, &payload).and_then(|e| e.encode()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(channel_id = %channel_id, "[Backplane] Could not wrap event: {}", e);
                continue;
            }
        };

        let topic = channel_topic(&topic_prefix, channel_id);
        if let Err(e) = backplane.publish(&topic, envelope).await {
            tracing::warn!(channel_id = %channel_id, "[Backplane] Publish failed: {}", e);
        }
    }

    tracing::debug!("[Backplane] Publisher stopped");
}

async fn run_subscriber(
    mut messages: futures_util::stream::BoxStream<'static, BackplaneMessage>,
    registry: Arc<Registry>,
    instance_id: String,
    topic_prefix: String,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = messages.next() => match next {
                Some(message) => message,
                None => {
                    tracing::warn!("[Backplane] Subscription closed, remote events will not arrive");
                    break;
                }
            },
        };

        if let Some((channel_id, data)) = decode_remote(&instance_id, &topic_prefix, &message) {
            let delivered = registry.deliver_to_channel(channel_id, &data, None);
            tracing::debug!(channel_id = %channel_id, delivered, "[Backplane] Delivered remote event");
        }
    }

    tracing::debug!("[Backplane] Subscriber stopped");
}

/// Extract the channel and event bytes of a remote envelope
///
/// Returns `None` for our own envelopes, foreign topics and undecodable
/// payloads.
pub fn decode_remote(instance_id: &str, topic_prefix: &str, message: &BackplaneMessage) -> Option<(Uuid, Bytes)> {
    let envelope = match BackplaneEnvelope::decode(&message.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(topic = %message.topic, "[Backplane] Undecodable envelope: {}", e);
            return None;
        }
    };

    if envelope.instance_id == instance_id {
        return None;
    }

    let channel_id = channel_from_topic(topic_prefix, &message.topic)?;
    Some((channel_id, envelope.into_data()))
}
