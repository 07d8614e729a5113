/**
 * Application State
 *
 * `AppState` is the single state value of the Axum router. The `FromRef`
 * implementations let handlers extract just the part they use, e.g.
 * `State<Arc<Hub>>` or `State<CallCoordinator>`.
 *
 * # Thread Safety
 *
 * Every field is cheap to clone and shared:
 * - `Arc<Hub>` owns its own loop and registry
 * - `CallCoordinator` is an `Arc` handle around its store and timers
 * - trait objects are `Arc<dyn _ + Send + Sync>`
 */

use axum::extract::FromRef;
use std::sync::Arc;

use crate::backend::auth::TokenValidator;
use crate::backend::calls::CallCoordinator;
use crate::backend::directory::ChannelDirectory;
use crate::backend::realtime::{CallEventHandler, Hub, SessionContext};
use crate::backend::server::config::ServerConfig;

/// Application state shared by every handler
///
/// # Fields
///
/// * `hub` - Realtime hub (connection registry, fan-out, presence)
/// * `calls` - Call lifecycle coordinator
/// * `validator` - Token validator shared by REST auth and the websocket handshake
/// * `directory` - Channel membership lookups; `None` allows every user everywhere
/// * `config` - The loaded server configuration
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub calls: CallCoordinator,
    pub validator: Arc<dyn TokenValidator>,
    pub directory: Option<Arc<dyn ChannelDirectory>>,
    pub config: Arc<ServerConfig>,
}

impl FromRef<AppState> for Arc<Hub> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

impl FromRef<AppState> for CallCoordinator {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.calls.clone()
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}

/// Implement FromRef for SessionContext
///
/// The websocket handler receives everything a session needs without
/// depending on `AppState` itself. Inbound `call.*` frames are routed to
/// the coordinator.
impl FromRef<AppState> for SessionContext {
    fn from_ref(app_state: &AppState) -> Self {
        let calls: Arc<dyn CallEventHandler> = Arc::new(app_state.calls.clone());
        SessionContext {
            hub: app_state.hub.clone(),
            validator: app_state.validator.clone(),
            directory: app_state.directory.clone(),
            calls: Some(calls),
            config: app_state.config.realtime.clone(),
        }
    }
}
