/**
 * Call Persistence
 *
 * `CallStore` is the persistence seam of the call coordinator. Status
 * changes are conditional updates: each one names the statuses it may move
 * from and reports whether it applied. That is what makes a ringing call
 * resolve exactly once when an accept, a decline and the ringing timer race.
 *
 * `MemoryCallStore` backs single-node runs without a database and the tests;
 * `PgCallStore` (in `db`) is the PostgreSQL implementation.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::backend::error::StoreError;
use crate::shared::{Call, CallParticipant, CallStatus};

#[async_trait]
pub trait CallStore: Send + Sync {
    async fn create(&self, call: &Call) -> Result<(), StoreError>;

    async fn get(&self, call_id: Uuid) -> Result<Option<Call>, StoreError>;

    /// Move a ringing call to `in_progress`
    ///
    /// Returns `false` without changing anything if the call is not ringing.
    async fn mark_started(&self, call_id: Uuid, accepted_by: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Move a call to a terminal `status` if it is currently in one of `from`
    async fn mark_ended(
        &self,
        call_id: Uuid,
        status: CallStatus,
        from: &[CallStatus],
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Add a participant, or rejoin one who left
    async fn add_participant(&self, call_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Mark an active participant as left
    ///
    /// Returns `false` if the user was not an active participant.
    async fn remove_participant(&self, call_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn count_active_participants(&self, call_id: Uuid) -> Result<i64, StoreError>;

    /// Most recent ringing or in-progress call in the channel
    async fn find_active_for_channel(&self, channel_id: Uuid) -> Result<Option<Call>, StoreError>;

    /// Calls in the channel, newest first
    async fn list_by_channel(&self, channel_id: Uuid, limit: i64) -> Result<Vec<Call>, StoreError>;

    /// Mark every call still ringing since before `cutoff` as missed
    async fn expire_stale_ringing(&self, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    calls: HashMap<Uuid, Call>,
    participants: HashMap<(Uuid, Uuid), CallParticipant>,
}

/// Call store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryCallStore {
    state: Mutex<MemoryState>,
}

impl MemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn create(&self, call: &Call) -> Result<(), StoreError> {
        self.state.lock().calls.insert(call.id, call.clone());
        Ok(())
    }

    async fn get(&self, call_id: Uuid) -> Result<Option<Call>, StoreError> {
        Ok(self.state.lock().calls.get(&call_id).cloned())
    }

    async fn mark_started(&self, call_id: Uuid, accepted_by: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        match state.calls.get_mut(&call_id) {
            Some(call) if call.status == CallStatus::Ringing => {
                call.status = CallStatus::InProgress;
                call.accepted_by = Some(accepted_by);
                call.started_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_ended(
        &self,
        call_id: Uuid,
        status: CallStatus,
        from: &[CallStatus],
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        match state.calls.get_mut(&call_id) {
            Some(call) if from.contains(&call.status) => {
                call.status = status;
                call.ended_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn add_participant(&self, call_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.state.lock().participants.insert(
            (call_id, user_id),
            CallParticipant {
                call_id,
                user_id,
                joined_at: at,
                left_at: None,
            },
        );
        Ok(())
    }

    async fn remove_participant(&self, call_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        match state.participants.get_mut(&(call_id, user_id)) {
            Some(participant) if participant.left_at.is_none() => {
                participant.left_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_active_participants(&self, call_id: Uuid) -> Result<i64, StoreError> {
        let count = self
            .state
            .lock()
            .participants
            .values()
            .filter(|p| p.call_id == call_id && p.left_at.is_none())
            .count();
        Ok(count as i64)
    }

    async fn find_active_for_channel(&self, channel_id: Uuid) -> Result<Option<Call>, StoreError> {
        Ok(self
            .state
            .lock()
            .calls
            .values()
            .filter(|c| c.channel_id == channel_id && c.status.is_active())
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn list_by_channel(&self, channel_id: Uuid, limit: i64) -> Result<Vec<Call>, StoreError> {
        let mut calls: Vec<Call> = self
            .state
            .lock()
            .calls
            .values()
            .filter(|c| c.channel_id == channel_id)
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        calls.truncate(limit.max(0) as usize);
        Ok(calls)
    }

    async fn expire_stale_ringing(&self, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut expired = 0;
        for call in self.state.lock().calls.values_mut() {
            if call.status == CallStatus::Ringing && call.created_at < cutoff {
                call.status = CallStatus::Missed;
                call.ended_at = Some(at);
                expired += 1;
            }
        }
        Ok(expired)
    }
}
