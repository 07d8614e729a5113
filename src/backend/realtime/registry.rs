//! Connection registry
//!
//! Maps connection id to `Connection`. Only the hub loop inserts and removes
//! entries; delivery paths take the read lock and push into connection
//! queues, which never blocks.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::connection::Connection;

#[derive(Debug, Default)]
pub struct Registry {
    connections: RwLock<HashMap<Uuid, Arc<Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a connection with the same id is already present
    pub(super) fn insert(&self, connection: Arc<Connection>) -> bool {
        let mut connections = self.connections.write();
        if connections.contains_key(&connection.id()) {
            return false;
        }
        connections.insert(connection.id(), connection);
        true
    }

    pub(super) fn remove(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        self.connections.write().remove(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Push `payload` to every subscriber of `channel_id` except `exclude`
    ///
    /// Returns how many queues accepted the message.
    pub fn deliver_to_channel(&self, channel_id: Uuid, payload: &Bytes, exclude: Option<Uuid>) -> usize {
        self.connections
            .read()
            .values()
            .filter(|conn| Some(conn.id()) != exclude && conn.is_subscribed(channel_id))
            .filter(|conn| conn.send(payload.clone()))
            .count()
    }

    /// Push `payload` to every connection of `user_id`
    pub fn deliver_to_user(&self, user_id: Uuid, payload: &Bytes) -> usize {
        self.connections
            .read()
            .values()
            .filter(|conn| conn.user_id() == user_id)
            .filter(|conn| conn.send(payload.clone()))
            .count()
    }

    /// Push `payload` to every connection except `exclude`
    pub fn deliver_to_all(&self, payload: &Bytes, exclude: Option<Uuid>) -> usize {
        self.connections
            .read()
            .values()
            .filter(|conn| Some(conn.id()) != exclude)
            .filter(|conn| conn.send(payload.clone()))
            .count()
    }

    /// Live connections belonging to `user_id`
    pub fn for_user(&self, user_id: Uuid) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .values()
            .filter(|conn| conn.user_id() == user_id)
            .cloned()
            .collect()
    }

    /// Distinct users with at least one connection
    pub fn online_users(&self) -> Vec<Uuid> {
        let users: HashSet<Uuid> = self.connections.read().values().map(|conn| conn.user_id()).collect();
        users.into_iter().collect()
    }

    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }
}
