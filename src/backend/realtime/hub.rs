/**
 * Realtime Hub
 *
 * Process-local registry of live connections and the entry point for every
 * outbound realtime event.
 *
 * # Lifecycle
 *
 * `Hub::start` spawns the hub loop and, when a backplane is given, the
 * backplane bridge. `Hub::stop` ends both. What happens to connections that
 * are still open is governed by `ShutdownPolicy`.
 *
 * # Registry Mutation
 *
 * `register` and `unregister` are commands processed one at a time by the
 * hub loop, which is the only writer to the registry. Delivery reads the
 * registry concurrently from any task.
 *
 * # Delivery
 *
 * Channel broadcasts are delivered to local subscribers first and then handed
 * to the bridge for other instances. Presence and per-user delivery stay on
 * this instance. A full connection queue drops the message silently.
 */

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::backplane::Backplane;
use super::bridge::BackplaneBridge;
use super::connection::Connection;
use super::publisher::EventPublisher;
use super::registry::Registry;
use crate::backend::server::config::{RealtimeConfig, ShutdownPolicy};
use crate::shared::{Event, EventType, PresencePayload};

const COMMAND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is stopped")]
    Stopped,

    #[error("connection {0} is already registered")]
    AlreadyRegistered(Uuid),
}

enum HubCommand {
    Register(Arc<Connection>, oneshot::Sender<bool>),
    Unregister(Arc<Connection>, oneshot::Sender<bool>),
}

/// Fan-out hub for one server process
pub struct Hub {
    instance_id: String,
    registry: Arc<Registry>,
    commands: mpsc::Sender<HubCommand>,
    bridge: Option<BackplaneBridge>,
    shutdown: CancellationToken,
    shutdown_policy: ShutdownPolicy,
}

impl Hub {
    /// Start the hub loop and, if a backplane is given, the bridge
    pub async fn start(config: &RealtimeConfig, backplane: Option<Arc<dyn Backplane>>) -> Arc<Self> {
        let registry = Arc::new(Registry::new());
        let shutdown = CancellationToken::new();

        let bridge = match backplane {
            Some(backplane) => {
                Some(BackplaneBridge::start(backplane, registry.clone(), config, shutdown.child_token()).await)
            }
            None => None,
        };

        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(run_hub_loop(registry.clone(), command_rx, shutdown.clone()));

        tracing::info!(
            instance_id = %config.instance_id,
            backplane = bridge.is_some(),
            "[Hub] Started"
        );

        Arc::new(Self {
            instance_id: config.instance_id.clone(),
            registry,
            commands,
            bridge,
            shutdown,
            shutdown_policy: config.shutdown_policy,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Add a connection to the registry
    ///
    /// Every other connected session receives a `presence.update` with
    /// `online: true` once the connection is in.
    pub async fn register(&self, connection: Arc<Connection>) -> Result<(), HubError> {
        let id = connection.id();
        let (ack, registered) = oneshot::channel();
        self.commands
            .send(HubCommand::Register(connection, ack))
            .await
            .map_err(|_| HubError::Stopped)?;

        match registered.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(HubError::AlreadyRegistered(id)),
            Err(_) => Err(HubError::Stopped),
        }
    }

    /// Remove a connection from the registry
    ///
    /// Returns `false` if it was not registered, in which case nothing is
    /// broadcast.
    pub async fn unregister(&self, connection: &Arc<Connection>) -> bool {
        let (ack, removed) = oneshot::channel();
        if self
            .commands
            .send(HubCommand::Unregister(connection.clone(), ack))
            .await
            .is_err()
        {
            return self.remove_after_stop(connection);
        }
        match removed.await {
            Ok(removed) => removed,
            // The loop exited with the command still queued.
            Err(_) => self.remove_after_stop(connection),
        }
    }

    /// Unregister without the hub loop, which has exited and no longer
    /// writes the registry
    fn remove_after_stop(&self, connection: &Arc<Connection>) -> bool {
        connection.close();
        self.registry.remove(connection.id()).is_some()
    }

    /// Deliver bytes to every subscriber of `channel_id` except `exclude`,
    /// then publish them for other instances
    ///
    /// Returns the number of local connections that accepted the message.
    pub fn broadcast_to_channel(&self, channel_id: Uuid, payload: Bytes, exclude: Option<Uuid>) -> usize {
        let delivered = self.registry.deliver_to_channel(channel_id, &payload, exclude);
        tracing::debug!(channel_id = %channel_id, delivered, "[Hub] Channel broadcast");

        if let Some(bridge) = &self.bridge {
            bridge.publish(channel_id, payload);
        }
        delivered
    }

    /// Serialize `event` and broadcast it to `channel_id`
    pub fn broadcast_event(&self, channel_id: Uuid, event: &Event) -> usize {
        match event.to_bytes() {
            Ok(payload) => self.broadcast_to_channel(channel_id, payload, None),
            Err(e) => {
                tracing::error!(channel_id = %channel_id, "[Hub] Failed to serialize {}: {}", event.event_type, e);
                0
            }
        }
    }

    /// Deliver bytes to every local connection of `user_id`
    pub fn send_to_user(&self, user_id: Uuid, payload: Bytes) -> usize {
        self.registry.deliver_to_user(user_id, &payload)
    }

    /// Subscribe every live connection of `user_id` to `channel_id`
    pub fn subscribe_user_to_channel(&self, user_id: Uuid, channel_id: Uuid) -> usize {
        let connections = self.registry.for_user(user_id);
        for connection in &connections {
            connection.subscribe(channel_id);
        }
        connections.len()
    }

    /// Unsubscribe every live connection of `user_id` from `channel_id`
    pub fn unsubscribe_user_from_channel(&self, user_id: Uuid, channel_id: Uuid) -> usize {
        let connections = self.registry.for_user(user_id);
        for connection in &connections {
            connection.unsubscribe(channel_id);
        }
        connections.len()
    }

    /// Users with at least one connection on this instance
    pub fn online_users(&self) -> Vec<Uuid> {
        self.registry.online_users()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop the hub loop and the backplane subscription
    pub fn stop(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let open = self.registry.snapshot();
        match self.shutdown_policy {
            ShutdownPolicy::Detach => {
                tracing::info!(open_connections = open.len(), "[Hub] Stopped, leaving connections open");
            }
            ShutdownPolicy::CloseConnections => {
                for connection in &open {
                    connection.close();
                }
                tracing::info!(closed_connections = open.len(), "[Hub] Stopped, connections closed");
            }
        }
    }
}

impl EventPublisher for Hub {
    fn broadcast(&self, channel_id: Uuid, event: &Event) {
        self.broadcast_event(channel_id, event);
    }

    fn send_to_user(&self, user_id: Uuid, payload: Bytes) {
        Hub::send_to_user(self, user_id, payload);
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_hub_loop(registry: Arc<Registry>, mut commands: mpsc::Receiver<HubCommand>, shutdown: CancellationToken) {
    loop {
        let command = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = commands.recv() => match next {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            HubCommand::Register(connection, ack) => {
                let inserted = registry.insert(connection.clone());
                if inserted {
                    tracing::info!(
                        user_id = %connection.user_id(),
                        connection_id = %connection.id(),
                        "[Hub] Client connected"
                    );
                    if let Some(frame) = presence_frame(connection.user_id(), true) {
                        registry.deliver_to_all(&frame, Some(connection.id()));
                    }
                }
                let _ = ack.send(inserted);
            }
            HubCommand::Unregister(connection, ack) => {
                let removed = registry.remove(connection.id()).is_some();
                if removed {
                    connection.close();
                    tracing::info!(
                        user_id = %connection.user_id(),
                        connection_id = %connection.id(),
                        "[Hub] Client disconnected"
                    );
                    if let Some(frame) = presence_frame(connection.user_id(), false) {
                        registry.deliver_to_all(&frame, None);
                    }
                }
                let _ = ack.send(removed);
            }
        }
    }

    tracing::debug!("[Hub] Loop exited");
}

fn presence_frame(user_id: Uuid, online: bool) -> Option<Bytes> {
    let payload = PresencePayload { user_id, online };
    match Event::new(EventType::PresenceUpdate, None, &payload).and_then(|event| event.to_bytes()) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!("[Hub] Failed to encode presence update: {}", e);
            None
        }
    }
}
