/**
 * WebSocket Upgrade Handler
 *
 * `GET /ws` upgrades the request and hands the socket to `serve_session`.
 * Authentication happens inside the socket (first-frame handshake), so the
 * route is not behind the bearer middleware.
 *
 * The health and presence endpoints read the hub directly.
 */

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    Json,
};
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::handshake::{serve_session, SessionContext};
use super::hub::Hub;

/// Upgrade to a websocket and run the realtime session
///
/// Inbound messages larger than the configured limit end the session.
pub async fn ws_handler(ws: WebSocketUpgrade, State(ctx): State<SessionContext>) -> Response {
    let max_message_bytes = ctx.config.max_message_bytes;

    ws.max_message_size(max_message_bytes)
        .on_failed_upgrade(|e| tracing::warn!("[Session] Upgrade failed: {}", e))
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            serve_session(sink, stream, ctx).await;
        })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub instance_id: String,
    pub connections: usize,
}

/// Liveness probe (GET /health)
pub async fn health(State(hub): State<Arc<Hub>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        instance_id: hub.instance_id().to_string(),
        connections: hub.connection_count(),
    })
}

/// Users with at least one session on this instance (GET /api/presence/online)
pub async fn online_users(State(hub): State<Arc<Hub>>) -> Json<Vec<Uuid>> {
    Json(hub.online_users())
}
