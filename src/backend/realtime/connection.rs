/**
 * Realtime Connection
 *
 * One authenticated session: identity, a bounded outbound queue, the set of
 * channels it is subscribed to, and the two loops that move frames between
 * the queue and the socket.
 *
 * # Loops
 *
 * - `run_write_loop` drains the queue to the socket and sends a keepalive
 *   ping every `ping_period`. Every write has a `write_wait` deadline; a
 *   failed or late write ends the session.
 * - `run_read_loop` decodes inbound frames and hands them to the
 *   `InboundRouter`. A frame that fails to decode is skipped. A transport
 *   error or close frame ends the session and unregisters the connection.
 *
 * The loops share nothing but the queue and the connection's cancellation
 * token, so either loop ending unblocks the other.
 */

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dispatch::InboundRouter;
use crate::shared::Event;

/// Shortest keepalive interval the write loop will run
const MIN_PING_PERIOD: Duration = Duration::from_secs(1);

/// A registered realtime session
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    user_id: Uuid,
    display_name: String,
    sender: mpsc::Sender<Bytes>,
    subscriptions: RwLock<HashSet<Uuid>>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl Connection {
    /// Create a connection with a fresh id and its outbound queue
    ///
    /// The receiver half belongs to the write loop.
    pub fn new(user_id: Uuid, display_name: impl Into<String>, queue_capacity: usize) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            display_name: display_name.into(),
            sender,
            subscriptions: RwLock::new(HashSet::new()),
            cancel: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        });
        (connection, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Queue bytes for the write loop without waiting
    ///
    /// Returns `false` if the message was dropped because the queue is full
    /// or the connection is closing.
    pub fn send(&self, payload: Bytes) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.sender.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    connection_id = %self.id,
                    user_id = %self.user_id,
                    "[Hub] Send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn subscribe(&self, channel_id: Uuid) {
        self.subscriptions.write().insert(channel_id);
    }

    pub fn unsubscribe(&self, channel_id: Uuid) {
        self.subscriptions.write().remove(&channel_id);
    }

    pub fn is_subscribed(&self, channel_id: Uuid) -> bool {
        self.subscriptions.read().contains(&channel_id)
    }

    /// Snapshot of the subscription set
    pub fn subscribed_channels(&self) -> Vec<Uuid> {
        self.subscriptions.read().iter().copied().collect()
    }

    /// Number of messages dropped because the queue was full
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Signal both loops to stop
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection has been closed
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }
}

/// Turn queued bytes into a websocket frame
///
/// Event envelopes are JSON, so they go out as text frames.
fn outbound_frame(payload: Bytes) -> Message {
    match std::str::from_utf8(&payload) {
        Ok(text) => Message::Text(Utf8Bytes::from(text.to_owned())),
        Err(_) => Message::Binary(payload),
    }
}

async fn write_with_deadline<S>(sink: &mut S, message: Message, write_wait: Duration) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(write_wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("write deadline exceeded".to_string()),
    }
}

/// Drain the outbound queue to the socket until the connection closes
pub async fn run_write_loop<S>(
    connection: Arc<Connection>,
    mut queue: mpsc::Receiver<Bytes>,
    mut sink: S,
    write_wait: Duration,
    ping_period: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let ping_period = ping_period.max(MIN_PING_PERIOD);
    let mut keepalive = interval_at(Instant::now() + ping_period, ping_period);

    loop {
        let outcome = tokio::select! {
            biased;
            _ = connection.cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(payload) => write_with_deadline(&mut sink, outbound_frame(payload), write_wait).await,
                None => break,
            },
            _ = keepalive.tick() => write_with_deadline(&mut sink, Message::Ping(Bytes::new()), write_wait).await,
        };

        if let Err(e) = outcome {
            tracing::debug!(
                connection_id = %connection.id,
                user_id = %connection.user_id,
                "[Session] Write failed: {}", e
            );
            break;
        }
    }

    connection.close();

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static(""),
    }));
    let _ = write_with_deadline(&mut sink, close, write_wait).await;
}

/// Read and dispatch inbound frames until the session ends, then unregister
pub async fn run_read_loop<S, E>(connection: Arc<Connection>, mut stream: S, router: InboundRouter)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            _ = connection.cancel.cancelled() => break,
            frame = stream.next() => frame,
        };

        let event = match frame {
            Some(Ok(Message::Text(text))) => Event::decode(text.as_str().as_bytes()),
            Some(Ok(Message::Binary(data))) => Event::decode(&data),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::debug!(
                    connection_id = %connection.id,
                    user_id = %connection.user_id,
                    "[Session] Read error: {}", e
                );
                break;
            }
        };

        match event {
            Ok(event) => router.dispatch(&connection, event).await,
            Err(e) => {
                tracing::debug!(connection_id = %connection.id, "[Session] Skipping malformed frame: {}", e);
            }
        }
    }

    connection.close();
    router.hub().unregister(&connection).await;
}
