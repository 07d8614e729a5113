/**
 * API Routes
 *
 * REST endpoints that complement the realtime socket. Every route here is
 * wrapped in `auth_middleware` and answers 401 without a valid bearer token.
 *
 * # Routes
 *
 * ## Calls
 * - `GET /api/channels/{channel_id}/calls` - Call history for a channel
 * - `GET /api/calls/active?channel_id=` - Current call of a channel
 * - `GET /api/calls/rtc-config` - ICE servers
 *
 * ## Presence
 * - `GET /api/presence/online` - Users connected to this instance
 */

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::backend::calls::handlers::{get_active_call, get_call_history, get_rtc_config};
use crate::backend::middleware::auth_middleware;
use crate::backend::realtime::online_users;
use crate::backend::server::state::AppState;

/// Configure API routes
///
/// `route_layer` applies the middleware to matched routes only, so unknown
/// paths still fall through to the 404 fallback.
pub fn configure_api_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        // Call endpoints
        .route("/api/channels/{channel_id}/calls", get(get_call_history))
        .route("/api/calls/active", get(get_active_call))
        .route("/api/calls/rtc-config", get(get_rtc_config))
        // Presence
        .route("/api/presence/online", get(online_users))
        .route_layer(from_fn_with_state(app_state, auth_middleware))
}
