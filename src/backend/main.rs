/**
 * Huddle Server Entry Point
 *
 * Loads configuration, builds the state, and serves HTTP and websocket
 * traffic until Ctrl-C.
 */

use std::sync::Arc;

use huddle::backend::realtime::Hub;
use huddle::backend::server::{build_state, create_app, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = ServerConfig::from_env();
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = build_state(config).await;
    let hub = state.hub.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl-C, then stop the hub
///
/// The hub's shutdown policy decides whether live sessions are closed or
/// left to finish on their own.
async fn shutdown_signal(hub: Arc<Hub>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown requested");
    hub.stop();
}
