/**
 * Session Handshake
 *
 * Everything that happens between the websocket upgrade and a running
 * session.
 *
 * # Protocol
 *
 * The first frame a client sends must be
 *
 * ```json
 * {"type": "auth", "payload": {"token": "<bearer>"}}
 * ```
 *
 * and it must arrive within the auth timeout. Otherwise the socket is closed
 * with status 1008 (policy violation) and one of these reasons:
 *
 * - `auth timeout` - nothing arrived in time
 * - `first message must be auth` - the frame was not an auth frame
 * - `missing token` - the auth frame carried no token
 * - `invalid token` - the token did not validate
 *
 * Success is silent. No connection exists, and nothing reaches the hub,
 * until the token has been validated.
 *
 * # Session Start
 *
 * The new connection is subscribed to every channel the user belongs to,
 * registered with the hub, and then its write loop is spawned while the
 * read loop runs on the upgrade task.
 */

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use super::connection::{run_read_loop, run_write_loop, Connection};
use super::dispatch::{CallEventHandler, InboundRouter};
use super::hub::Hub;
use crate::backend::auth::{Identity, TokenValidator};
use crate::backend::directory::ChannelDirectory;
use crate::backend::server::config::RealtimeConfig;
use crate::shared::Event;

const AUTH_FRAME_TYPE: &str = "auth";

/// Why a session was refused before it started
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("auth timeout")]
    Timeout,

    #[error("first message must be auth")]
    NotAuth,

    #[error("missing token")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("connection closed before auth")]
    Closed,
}

impl HandshakeError {
    /// Reason string sent in the close frame
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::Timeout => "auth timeout",
            Self::NotAuth => "first message must be auth",
            Self::MissingToken => "missing token",
            Self::InvalidToken => "invalid token",
            Self::Closed => "",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    #[serde(default)]
    token: String,
}

/// Wait for the auth frame and resolve the caller's identity
///
/// Pings and pongs that arrive before the auth frame are skipped; they do
/// not extend the deadline.
pub async fn authenticate_first_frame<S, E>(
    stream: &mut S,
    validator: &dyn TokenValidator,
    auth_timeout: Duration,
) -> Result<Identity, HandshakeError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    let first = timeout(auth_timeout, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(message)) => return Ok(message),
                Some(Err(_)) | None => return Err(HandshakeError::Closed),
            }
        }
    })
    .await
    .map_err(|_| HandshakeError::Timeout)??;

    let event = match first {
        Message::Text(text) => Event::decode(text.as_str().as_bytes()),
        Message::Binary(data) => Event::decode(&data),
        Message::Close(_) => return Err(HandshakeError::Closed),
        _ => return Err(HandshakeError::NotAuth),
    }
    .map_err(|_| HandshakeError::NotAuth)?;

    if event.event_type.as_str() != AUTH_FRAME_TYPE {
        return Err(HandshakeError::NotAuth);
    }

    let token = event
        .payload_as::<AuthPayload>()
        .map(|payload| payload.token)
        .map_err(|_| HandshakeError::MissingToken)?;
    if token.is_empty() {
        return Err(HandshakeError::MissingToken);
    }

    validator.validate_token(&token).map_err(|e| {
        tracing::debug!("[Session] Token rejected: {}", e);
        HandshakeError::InvalidToken
    })
}

/// Close the socket with a policy-violation status
pub async fn reject<S>(sink: &mut S, error: &HandshakeError)
where
    S: Sink<Message> + Unpin,
{
    let frame = Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(error.close_reason()),
    }));
    let _ = sink.send(frame).await;
    let _ = sink.close().await;
}

/// Everything a session needs from the server
#[derive(Clone)]
pub struct SessionContext {
    pub hub: Arc<Hub>,
    pub validator: Arc<dyn TokenValidator>,
    pub directory: Option<Arc<dyn ChannelDirectory>>,
    pub calls: Option<Arc<dyn CallEventHandler>>,
    pub config: RealtimeConfig,
}

/// Authenticate, register and run one session to completion
pub async fn serve_session<Si, St, E>(mut sink: Si, mut stream: St, ctx: SessionContext)
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display + Send,
    St: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
{
    let identity = match authenticate_first_frame(&mut stream, ctx.validator.as_ref(), ctx.config.auth_timeout).await {
        Ok(identity) => identity,
        Err(HandshakeError::Closed) => {
            tracing::debug!("[Session] Client went away before auth");
            return;
        }
        Err(e) => {
            tracing::warn!("[Session] Handshake rejected: {}", e);
            reject(&mut sink, &e).await;
            return;
        }
    };

    let (connection, queue) = Connection::new(
        identity.user_id,
        identity.display_name,
        ctx.config.send_queue_capacity,
    );

    if let Some(directory) = &ctx.directory {
        match directory.user_channel_ids(identity.user_id).await {
            Ok(channel_ids) => {
                for channel_id in channel_ids {
                    connection.subscribe(channel_id);
                }
            }
            Err(e) => {
                tracing::warn!(user_id = %identity.user_id, "[Session] Could not load channel memberships: {}", e);
            }
        }
    }

    if let Err(e) = ctx.hub.register(connection.clone()).await {
        tracing::warn!(user_id = %identity.user_id, "[Session] Register failed: {}", e);
        let frame = Message::Close(Some(CloseFrame {
            code: close_code::AWAY,
            reason: Utf8Bytes::from_static("server shutting down"),
        }));
        let _ = sink.send(frame).await;
        return;
    }

    let writer = tokio::spawn(run_write_loop(
        connection.clone(),
        queue,
        sink,
        ctx.config.write_wait,
        ctx.config.ping_period,
    ));

    let router = InboundRouter::new(ctx.hub.clone(), ctx.calls.clone());
    run_read_loop(connection, stream, router).await;

    if let Err(e) = writer.await {
        tracing::debug!("[Session] Write loop ended abnormally: {}", e);
    }
}
