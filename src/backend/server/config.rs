/**
 * Server Configuration
 *
 * This module loads server configuration from environment variables (after
 * `.env` has been applied by the binary) and opens the optional external
 * services: PostgreSQL and the Redis backplane.
 *
 * # Configuration Sources
 *
 * All keys use the `HUDDLE_` prefix. Every key has a default suitable for a
 * single-node development run; values that fail to parse fall back to the
 * default with a warning.
 *
 * # Error Handling
 *
 * Missing or unreachable services do not prevent startup. Without a database
 * the server keeps calls and memberships in memory; without Redis it fans
 * out through an in-process bus and only reaches its own clients.
 */

use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::backend::realtime::backplane::{Backplane, MemoryBackplane};
use crate::backend::realtime::redis::RedisBackplane;

/// Secret used when `HUDDLE_JWT_SECRET` is not set
const DEV_JWT_SECRET: &str = "huddle-development-secret-change-me";

/// What `Hub::stop` does with connections that are still open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Leave sessions to their own read/write error handling
    #[default]
    Detach,
    /// Cancel every registered connection
    CloseConnections,
}

impl FromStr for ShutdownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detach" => Ok(Self::Detach),
            "close" | "close_connections" => Ok(Self::CloseConnections),
            other => Err(format!("unknown shutdown policy '{}'", other)),
        }
    }
}

/// Settings for the hub, its connections and the session handshake
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Identifier stamped on every backplane envelope this process publishes
    pub instance_id: String,
    /// Namespace for backplane topics (`<prefix>:channel:<id>`)
    pub topic_prefix: String,
    /// Per-connection outbound queue capacity
    pub send_queue_capacity: usize,
    /// Capacity of the queue feeding the backplane publisher
    pub publish_queue_capacity: usize,
    /// Window for the first (auth) frame
    pub auth_timeout: Duration,
    /// Deadline for a single outbound write
    pub write_wait: Duration,
    /// Keepalive ping interval
    pub ping_period: Duration,
    /// Largest inbound message accepted
    pub max_message_bytes: usize,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            topic_prefix: "huddle".to_string(),
            send_queue_capacity: 256,
            publish_queue_capacity: 1024,
            auth_timeout: Duration::from_secs(10),
            write_wait: Duration::from_secs(10),
            ping_period: Duration::from_secs(30),
            max_message_bytes: 16384,
            shutdown_policy: ShutdownPolicy::Detach,
        }
    }
}

/// Settings for the call coordinator
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// How long a call may ring before it is marked missed
    pub ringing_timeout: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ringing_timeout: Duration::from_secs(30),
        }
    }
}

/// A TURN relay advertised to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

/// ICE servers handed to clients for peer-to-peer media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebRtcConfig {
    pub enabled: bool,
    pub stun_servers: Vec<String>,
    pub turn_servers: Vec<TurnServer>,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stun_servers: Vec::new(),
            turn_servers: Vec::new(),
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub realtime: RealtimeConfig,
    pub calls: CallConfig,
    pub webrtc: WebRtcConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            redis_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            realtime: RealtimeConfig::default(),
            calls: CallConfig::default(),
            webrtc: WebRtcConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `HUDDLE_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let realtime_defaults = RealtimeConfig::default();

        let jwt_secret = match env_string("HUDDLE_JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("[Config] HUDDLE_JWT_SECRET not set, using the development secret");
                defaults.jwt_secret
            }
        };

        let realtime = RealtimeConfig {
            instance_id: env_string("HUDDLE_INSTANCE_ID").unwrap_or(realtime_defaults.instance_id),
            topic_prefix: env_string("HUDDLE_TOPIC_PREFIX").unwrap_or(realtime_defaults.topic_prefix),
            send_queue_capacity: env_parse("HUDDLE_SEND_QUEUE_CAPACITY", realtime_defaults.send_queue_capacity),
            publish_queue_capacity: env_parse(
                "HUDDLE_PUBLISH_QUEUE_CAPACITY",
                realtime_defaults.publish_queue_capacity,
            ),
            auth_timeout: env_secs_nonzero("HUDDLE_AUTH_TIMEOUT_SECS", realtime_defaults.auth_timeout),
            write_wait: env_secs_nonzero("HUDDLE_WRITE_WAIT_SECS", realtime_defaults.write_wait),
            ping_period: env_secs_nonzero("HUDDLE_PING_PERIOD_SECS", realtime_defaults.ping_period),
            max_message_bytes: env_parse("HUDDLE_MAX_MESSAGE_BYTES", realtime_defaults.max_message_bytes),
            shutdown_policy: env_parse("HUDDLE_SHUTDOWN_POLICY", realtime_defaults.shutdown_policy),
        };

        let calls = CallConfig {
            ringing_timeout: env_secs_nonzero("HUDDLE_RINGING_TIMEOUT_SECS", defaults.calls.ringing_timeout),
        };

        let turn_servers = match env_string("HUDDLE_TURN_URL") {
            Some(url) => vec![TurnServer {
                url,
                username: env_string("HUDDLE_TURN_USERNAME").unwrap_or_default(),
                credential: env_string("HUDDLE_TURN_CREDENTIAL").unwrap_or_default(),
            }],
            None => Vec::new(),
        };

        let webrtc = WebRtcConfig {
            enabled: env_parse("HUDDLE_WEBRTC_ENABLED", defaults.webrtc.enabled),
            stun_servers: env_string("HUDDLE_STUN_SERVERS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            turn_servers,
        };

        Self {
            port: env_parse("HUDDLE_PORT", defaults.port),
            database_url: env_string("HUDDLE_DATABASE_URL"),
            redis_url: env_string("HUDDLE_REDIS_URL"),
            jwt_secret,
            realtime,
            calls,
            webrtc,
        }
    }
}

/// Non-empty value of an environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed value of an environment variable, or `default`
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("[Config] Ignoring {}={:?}: {}", key, raw, e);
                default
            }
        },
        None => default,
    }
}

/// Whole seconds from an environment variable; zero is refused
///
/// Timers built from these values (keepalive interval, deadlines) cannot
/// run with a zero period.
fn env_secs_nonzero(key: &str, default: Duration) -> Duration {
    match env_parse(key, default.as_secs()) {
        0 => {
            tracing::warn!("[Config] Ignoring {}=0, using {}s", key, default.as_secs());
            default
        }
        secs => Duration::from_secs(secs),
    }
}

/// Open the PostgreSQL pool and apply migrations
///
/// Returns `None` when no database is configured or the connection fails;
/// callers fall back to the in-memory stores.
pub async fn load_database(database_url: Option<&str>) -> Option<PgPool> {
    let Some(database_url) = database_url else {
        tracing::warn!("HUDDLE_DATABASE_URL not set. Calls and memberships are kept in memory.");
        return None;
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Calls and memberships are kept in memory.");
            return None;
        }
    };

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}

/// Connect the cross-instance backplane
///
/// Falls back to an in-process bus when Redis is not configured or not
/// reachable, which limits fan-out to this instance's own clients.
pub async fn load_backplane(redis_url: Option<&str>) -> Arc<dyn Backplane> {
    let Some(redis_url) = redis_url else {
        tracing::warn!("HUDDLE_REDIS_URL not set. Fan-out is limited to this instance.");
        return Arc::new(MemoryBackplane::new());
    };

    match RedisBackplane::connect(redis_url).await {
        Ok(backplane) => {
            tracing::info!("[Backplane] Connected to Redis");
            Arc::new(backplane)
        }
        Err(e) => {
            tracing::error!("[Backplane] Failed to connect to Redis: {}", e);
            tracing::warn!("Fan-out is limited to this instance.");
            Arc::new(MemoryBackplane::new())
        }
    }
}
