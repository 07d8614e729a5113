/**
 * Router Configuration
 *
 * Combines the public routes and the authenticated API routes into a single
 * Axum router.
 *
 * # Route Order
 *
 * 1. Public routes (`/ws`, `/health`)
 * 2. API routes behind `auth_middleware`
 * 3. Fallback handler (404)
 */

use axum::{http::StatusCode, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::backend::realtime::{health, ws_handler};
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
///
/// # Public Routes
///
/// - `GET /ws` - Websocket upgrade; the session authenticates with its first frame
/// - `GET /health` - Liveness and connection count
///
/// # API Routes
///
/// See `configure_api_routes`. All of them require a bearer token.
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health));

    // Add API routes
    let router = router.merge(configure_api_routes(app_state.clone()));

    // Fallback handler for 404
    let router = router.fallback(|| async { (StatusCode::NOT_FOUND, "404 Not Found") });

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}
