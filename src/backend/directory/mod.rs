//! Channel Directory
//!
//! Read-only view of channel membership owned by the chat service. The hub
//! uses it to seed a new session's subscriptions; the call coordinator uses
//! it to authorize call actions.
//!
//! # Module Structure
//!
//! ```text
//! directory/
//! ├── mod.rs - ChannelDirectory trait and the in-memory directory
//! └── db.rs  - PostgreSQL directory
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::backend::error::StoreError;

/// PostgreSQL-backed directory
pub mod db;

pub use db::PgChannelDirectory;

/// Channel membership lookups
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn is_channel_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn user_channel_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

/// Membership kept in process memory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    members: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, channel_id: Uuid, user_id: Uuid) {
        self.members.write().entry(channel_id).or_default().insert(user_id);
    }

    pub fn remove_member(&self, channel_id: Uuid, user_id: Uuid) {
        let mut members = self.members.write();
        if let Some(users) = members.get_mut(&channel_id) {
            users.remove(&user_id);
            if users.is_empty() {
                members.remove(&channel_id);
            }
        }
    }
}

#[async_trait]
impl ChannelDirectory for MemoryDirectory {
    async fn is_channel_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .members
            .read()
            .get(&channel_id)
            .is_some_and(|users| users.contains(&user_id)))
    }

    async fn user_channel_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .members
            .read()
            .iter()
            .filter(|(_, users)| users.contains(&user_id))
            .map(|(channel_id, _)| *channel_id)
            .collect())
    }
}
