/**
 * Call REST Handlers
 *
 * Read-only endpoints that complement the websocket call events. All of
 * them sit behind `auth_middleware`.
 *
 * # Routes
 *
 * - `GET /api/channels/{channel_id}/calls` - Recent calls, newest first
 * - `GET /api/calls/active?channel_id=` - The ringing or in-progress call, or `null`
 * - `GET /api/calls/rtc-config` - ICE servers for the browser's peer connection
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::coordinator::CallCoordinator;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::server::config::{ServerConfig, WebRtcConfig};
use crate::shared::Call;

/// STUN server handed out when none is configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Debug, Deserialize)]
pub struct ActiveCallQuery {
    pub channel_id: Option<String>,
}

/// One entry of `RTCConfiguration.iceServers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credential: String,
}

#[derive(Debug, Serialize)]
pub struct RtcConfigResponse {
    pub ice_servers: Vec<IceServer>,
    pub enabled: bool,
}

/// List recent calls in a channel (GET /api/channels/{channel_id}/calls)
///
/// # Errors
///
/// * `400 Bad Request` - `channel_id` is not a UUID
/// * `403 Forbidden` - The caller is not a member of the channel
pub async fn get_call_history(
    State(calls): State<CallCoordinator>,
    AuthUser(user): AuthUser,
    Path(channel_id): Path<String>,
) -> Result<Json<Vec<Call>>, BackendError> {
    let channel_id = Uuid::parse_str(&channel_id)
        .map_err(|_| BackendError::handler(StatusCode::BAD_REQUEST, "invalid channel id"))?;

    ensure_member(&calls, channel_id, user.user_id).await?;

    let history = calls.call_history(channel_id).await?;
    Ok(Json(history))
}

/// Current call of a channel (GET /api/calls/active?channel_id=)
///
/// Responds with `null` when the channel has no ringing or in-progress call.
pub async fn get_active_call(
    State(calls): State<CallCoordinator>,
    AuthUser(user): AuthUser,
    Query(query): Query<ActiveCallQuery>,
) -> Result<Json<Option<Call>>, BackendError> {
    let raw = query
        .channel_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BackendError::handler(StatusCode::BAD_REQUEST, "channel_id query param required"))?;
    let channel_id = Uuid::parse_str(&raw)
        .map_err(|_| BackendError::handler(StatusCode::BAD_REQUEST, "invalid channel_id"))?;

    ensure_member(&calls, channel_id, user.user_id).await?;

    let call = calls.active_call(channel_id).await?;
    Ok(Json(call))
}

/// ICE configuration for clients (GET /api/calls/rtc-config)
pub async fn get_rtc_config(State(config): State<Arc<ServerConfig>>) -> Json<RtcConfigResponse> {
    Json(RtcConfigResponse {
        ice_servers: ice_servers(&config.webrtc),
        enabled: config.webrtc.enabled,
    })
}

/// STUN entries first, then TURN relays with their credentials
pub fn ice_servers(config: &WebRtcConfig) -> Vec<IceServer> {
    let stun = config.stun_servers.iter().map(|url| IceServer {
        urls: vec![url.clone()],
        username: String::new(),
        credential: String::new(),
    });
    let turn = config.turn_servers.iter().map(|turn| IceServer {
        urls: vec![turn.url.clone()],
        username: turn.username.clone(),
        credential: turn.credential.clone(),
    });

    let servers: Vec<IceServer> = stun.chain(turn).collect();
    if !servers.is_empty() {
        return servers;
    }

    vec![IceServer {
        urls: vec![DEFAULT_STUN_SERVER.to_string()],
        username: String::new(),
        credential: String::new(),
    }]
}

async fn ensure_member(calls: &CallCoordinator, channel_id: Uuid, user_id: Uuid) -> Result<(), BackendError> {
    if calls.is_member(channel_id, user_id).await? {
        Ok(())
    } else {
        Err(BackendError::forbidden("not a member of this channel"))
    }
}
