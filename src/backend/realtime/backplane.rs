//! Cross-instance publish/subscribe bus
//!
//! The hub only needs two things from a bus: publish bytes to a topic, and a
//! pattern subscription that yields `(topic, bytes)` pairs. `RedisBackplane`
//! provides them across processes; `MemoryBackplane` provides them inside one
//! process (single-node runs, and tests that stand up several hubs).
//!
//! Topics are one per channel: `<prefix>:channel:<channel_id>`.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use uuid::Uuid;

/// Backplane failure
#[derive(Debug, Error)]
pub enum BackplaneError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Envelope serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backplane closed")]
    Closed,
}

/// A message received from a pattern subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackplaneMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Publish/subscribe bus shared by hub instances
#[async_trait]
pub trait Backplane: Send + Sync {
    /// Publish `payload` on `topic`
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BackplaneError>;

    /// Subscribe to every topic matching `pattern`
    ///
    /// The subscription is live once this returns.
    async fn psubscribe(&self, pattern: &str) -> Result<BoxStream<'static, BackplaneMessage>, BackplaneError>;
}

/// Event bytes tagged with the publishing instance
#[derive(Debug, Serialize, Deserialize)]
pub struct BackplaneEnvelope {
    pub instance_id: String,
    pub data: Box<RawValue>,
}

impl BackplaneEnvelope {
    /// Wrap serialized event bytes
    pub fn wrap(instance_id: &str, data: &[u8]) -> Result<Self, BackplaneError> {
        let data: Box<RawValue> = serde_json::from_slice(data)?;
        Ok(Self {
            instance_id: instance_id.to_string(),
            data,
        })
    }

    pub fn encode(&self) -> Result<Bytes, BackplaneError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, BackplaneError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// The wrapped event bytes
    pub fn into_data(self) -> Bytes {
        let raw: Box<str> = self.data.into();
        Bytes::from(raw.into_string())
    }
}

/// Topic carrying events for one channel
pub fn channel_topic(prefix: &str, channel_id: Uuid) -> String {
    format!("{}:channel:{}", prefix, channel_id)
}

/// Pattern covering every channel topic under `prefix`
pub fn channel_pattern(prefix: &str) -> String {
    format!("{}:channel:*", prefix)
}

/// Channel id encoded in a channel topic
pub fn channel_from_topic(prefix: &str, topic: &str) -> Option<Uuid> {
    topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(":channel:"))
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// Match a topic against a `:`-segmented pattern
///
/// `*` matches exactly one segment and `#` matches the rest of the topic.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }

    let mut pattern_parts = pattern.split(':');
    let mut topic_parts = topic.split(':');

    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(t)) if p == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// In-process bus
///
/// Clones share the same bus, so several hubs built from clones of one
/// `MemoryBackplane` behave like processes sharing a Redis server.
#[derive(Clone)]
pub struct MemoryBackplane {
    tx: broadcast::Sender<BackplaneMessage>,
}

impl MemoryBackplane {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for MemoryBackplane {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backplane for MemoryBackplane {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BackplaneError> {
        // No subscribers is not an error on a pub/sub bus
        let _ = self.tx.send(BackplaneMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<BoxStream<'static, BackplaneMessage>, BackplaneError> {
        let pattern = pattern.to_string();
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| {
            let matched = match item {
                Ok(msg) if topic_matches(&pattern, &msg.topic) => Some(msg),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!("[Backplane] Subscriber lagged, {} messages skipped", skipped);
                    None
                }
            };
            futures_util::future::ready(matched)
        });
        Ok(stream.boxed())
    }
}
