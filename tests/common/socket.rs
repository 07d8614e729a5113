//! Duplex websocket client for session tests
//!
//! `serve_session` is generic over its sink and stream, so tests drive it
//! with a pair of mpsc channels instead of a real socket.

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::PollSender;
use uuid::Uuid;

use huddle::backend::realtime::{serve_session, SessionContext};

use super::auth_helpers::token_for;

const RECV_WAIT: Duration = Duration::from_secs(2);

pub struct TestClient {
    outbound: mpsc::Sender<Result<Message, Infallible>>,
    inbound: mpsc::Receiver<Message>,
    pub session: JoinHandle<()>,
}

/// Start a session and return the client end
pub fn connect(ctx: SessionContext) -> TestClient {
    let (client_tx, server_rx) = mpsc::channel(64);
    let (server_tx, client_rx) = mpsc::channel(64);

    let stream = ReceiverStream::new(server_rx);
    let sink = PollSender::new(server_tx);
    let session = tokio::spawn(serve_session(sink, stream, ctx));

    TestClient {
        outbound: client_tx,
        inbound: client_rx,
        session,
    }
}

/// Start a session and send a valid auth frame for `user_id`
pub async fn connect_as(ctx: SessionContext, user_id: Uuid, name: &str) -> TestClient {
    let client = connect(ctx);
    client.authenticate(&token_for(user_id, name)).await;
    client
}

impl TestClient {
    pub async fn send_json(&self, frame: serde_json::Value) {
        self.send(Message::Text(Utf8Bytes::from(frame.to_string()))).await;
    }

    pub async fn send(&self, message: Message) {
        self.outbound
            .send(Ok(message))
            .await
            .expect("session stopped reading");
    }

    pub async fn authenticate(&self, token: &str) {
        self.send_json(serde_json::json!({ "type": "auth", "payload": { "token": token } }))
            .await;
    }

    /// Next raw frame other than a ping, or `None` if nothing arrives in time
    pub async fn next_message(&mut self) -> Option<Message> {
        self.next_message_within(RECV_WAIT).await
    }

    pub async fn next_message_within(&mut self, wait: Duration) -> Option<Message> {
        loop {
            match timeout(wait, self.inbound.recv()).await {
                Ok(Some(Message::Ping(_))) => continue,
                Ok(message) => return message,
                Err(_) => return None,
            }
        }
    }

    /// Next event frame as JSON; `None` on close or timeout
    pub async fn next_event(&mut self) -> Option<serde_json::Value> {
        match self.next_message().await? {
            Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
            Message::Binary(data) => serde_json::from_slice(&data).ok(),
            _ => None,
        }
    }

    /// Skip frames until one of `event_type` arrives
    pub async fn next_of_type(&mut self, event_type: &str) -> Option<serde_json::Value> {
        loop {
            let event = self.next_event().await?;
            if event["type"] == event_type {
                return Some(event);
            }
        }
    }

    /// Assert that nothing but pings arrives for a short while
    pub async fn assert_silent(&mut self) {
        let frame = self.next_message_within(Duration::from_millis(200)).await;
        assert!(frame.is_none(), "unexpected frame: {:?}", frame);
    }

    /// Wait for the server's close frame
    pub async fn expect_close(&mut self) -> Option<CloseFrame> {
        loop {
            match self.next_message().await {
                Some(Message::Close(frame)) => return frame,
                Some(_) => continue,
                None => panic!("no close frame received"),
            }
        }
    }

    /// Send a close frame and wait for the session task to finish
    pub async fn close(self) {
        let _ = self.outbound.send(Ok(Message::Close(None))).await;
        drop(self.outbound);
        let _ = timeout(RECV_WAIT, self.session).await;
    }
}
