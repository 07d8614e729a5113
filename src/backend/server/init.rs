/**
 * Server Initialization
 *
 * Builds the application state and the router.
 *
 * # Initialization Process
 *
 * 1. Connect the database (optional) and the backplane (Redis or in-process)
 * 2. Pick the call store and channel directory for what is available
 * 3. Start the hub
 * 4. Build the call coordinator and recover calls left ringing by a previous run
 * 5. Create the router
 *
 * A missing database or Redis never prevents startup; the server degrades
 * to in-memory calls and single-instance fan-out.
 */

use axum::Router;
use std::sync::Arc;

use crate::backend::auth::{JwtValidator, TokenValidator};
use crate::backend::calls::{CallCoordinator, CallStore, MemoryCallStore, PgCallStore};
use crate::backend::directory::{ChannelDirectory, PgChannelDirectory};
use crate::backend::realtime::{EventPublisher, Hub};
use crate::backend::routes::create_router;
use crate::backend::server::config::{load_backplane, load_database, ServerConfig};
use crate::backend::server::state::AppState;

/// Build the application state from configuration
///
/// Without a database, calls live in memory and membership checks are
/// skipped (every authenticated user may act in every channel).
pub async fn build_state(config: ServerConfig) -> AppState {
    tracing::info!(instance_id = %config.realtime.instance_id, "Initializing huddle server");

    let db_pool = load_database(config.database_url.as_deref()).await;
    let backplane = load_backplane(config.redis_url.as_deref()).await;

    let (store, directory) = match db_pool {
        Some(pool) => {
            let store: Arc<dyn CallStore> = Arc::new(PgCallStore::new(pool.clone()));
            let directory: Arc<dyn ChannelDirectory> = Arc::new(PgChannelDirectory::new(pool));
            (store, Some(directory))
        }
        None => {
            let store: Arc<dyn CallStore> = Arc::new(MemoryCallStore::new());
            (store, None)
        }
    };

    let hub = Hub::start(&config.realtime, Some(backplane)).await;
    let publisher: Arc<dyn EventPublisher> = hub.clone();
    let calls = CallCoordinator::new(store, publisher, directory.clone(), &config.calls);

    if let Err(e) = calls.recover_stale_calls().await {
        tracing::error!("Failed to recover stale ringing calls: {}", e);
    }

    let validator: Arc<dyn TokenValidator> = Arc::new(JwtValidator::new(&config.jwt_secret));

    AppState {
        hub,
        calls,
        validator,
        directory,
        config: Arc::new(config),
    }
}

/// Create the Axum application for `state`
pub fn create_app(state: AppState) -> Router<()> {
    let app = create_router(state);
    tracing::info!("Router configured");
    app
}
