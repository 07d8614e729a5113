//! Redis pub/sub backplane
//!
//! Publishing goes through a `ConnectionManager`, which reconnects on its own
//! and is cheap to clone per call. Each pattern subscription opens its own
//! dedicated pub/sub connection.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::backplane::{Backplane, BackplaneError, BackplaneMessage};

/// Backplane over a Redis server
#[derive(Clone)]
pub struct RedisBackplane {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisBackplane {
    /// Connect to `redis_url` and open the publishing connection
    pub async fn connect(redis_url: &str) -> Result<Self, BackplaneError> {
        let client = redis::Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Backplane for RedisBackplane {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BackplaneError> {
        let mut conn = self.publisher.clone();
        let _receivers: i64 = conn.publish(topic, payload.as_ref()).await?;
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<BoxStream<'static, BackplaneMessage>, BackplaneError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;
        tracing::info!("[Backplane] Subscribed to {}", pattern);

        let stream = pubsub.into_on_message().map(|msg| BackplaneMessage {
            topic: msg.get_channel_name().to_string(),
            payload: Bytes::copy_from_slice(msg.get_payload_bytes()),
        });
        Ok(stream.boxed())
    }
}
