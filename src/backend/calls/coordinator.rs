/**
 * Call Coordinator
 *
 * Drives the per-call state machine and publishes its transitions.
 *
 * # State Machine
 *
 * ```text
 * ringing --accept--> in_progress --hangup(last participant)--> ended
 * ringing --decline--> declined
 * ringing --timeout--> missed
 * ringing --hangup(initiator, alone)--> ended
 * ```
 *
 * Every status change is a conditional update in the `CallStore`, so when an
 * accept, a decline and the ringing timer race for the same call, exactly one
 * of them wins and exactly one event is published.
 *
 * # Events
 *
 * Transitions are broadcast to the call's channel with the updated `Call` as
 * payload: `call.ringing`, `call.accepted`, `call.declined`, `call.ended`,
 * `call.missed`. Signaling (`call.offer`, `call.answer`,
 * `call.ice_candidate`) is point-to-point, see `signaling`.
 *
 * # Ringing Timers
 *
 * Each ringing call has exactly one timer task, tracked in `RingingTimers`.
 * Arming and cancelling happen under the same lock. A timer that fires takes
 * its own entry out of the map before touching the store.
 */

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::store::CallStore;
use crate::backend::directory::ChannelDirectory;
use crate::backend::error::StoreError;
use crate::backend::realtime::{CallEventHandler, EventPublisher};
use crate::backend::server::config::CallConfig;
use crate::shared::{Call, CallIdPayload, CallStatus, CallType, Event, EventType, InitiateCallRequest, SignalingMessage};

/// Number of calls returned by `call_history`
pub const CALL_HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("call not found")]
    NotFound,

    #[error("there is already an active call in this channel")]
    AlreadyActive,

    #[error("call is not in ringing state")]
    NotRinging,

    #[error("not a call participant")]
    NotParticipant,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pending ringing timeouts keyed by call id
#[derive(Debug, Default)]
pub struct RingingTimers {
    timers: Mutex<HashMap<Uuid, AbortHandle>>,
}

impl RingingTimers {
    /// Spawn a timer through `spawn` and record it, both under the lock
    ///
    /// A timer that fires immediately blocks in `take` until its own entry
    /// is in the map.
    fn arm<F>(&self, call_id: Uuid, spawn: F)
    where
        F: FnOnce() -> AbortHandle,
    {
        let mut timers = self.timers.lock();
        let handle = spawn();
        if let Some(previous) = timers.insert(call_id, handle) {
            previous.abort();
        }
    }

    /// Cancel the timer for `call_id`; returns whether one was pending
    fn cancel(&self, call_id: Uuid) -> bool {
        match self.timers.lock().remove(&call_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Called by a timer that has fired
    fn take(&self, call_id: Uuid) -> bool {
        self.timers.lock().remove(&call_id).is_some()
    }

    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

struct Inner {
    store: Arc<dyn CallStore>,
    publisher: Arc<dyn EventPublisher>,
    directory: Option<Arc<dyn ChannelDirectory>>,
    timers: RingingTimers,
    ringing_timeout: Duration,
}

/// Call lifecycle service
#[derive(Clone)]
pub struct CallCoordinator {
    inner: Arc<Inner>,
}

impl CallCoordinator {
    /// Create a coordinator
    ///
    /// Without a `directory`, membership checks are skipped.
    pub fn new(
        store: Arc<dyn CallStore>,
        publisher: Arc<dyn EventPublisher>,
        directory: Option<Arc<dyn ChannelDirectory>>,
        config: &CallConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                publisher,
                directory,
                timers: RingingTimers::default(),
                ringing_timeout: config.ringing_timeout,
            }),
        }
    }

    /// Start a call in `channel_id`
    ///
    /// The active-call check and the insert are separate store operations.
    /// Two initiates racing on the same channel can both pass the check and
    /// ring at once; no per-channel lock or unique constraint prevents it.
    pub async fn initiate(&self, channel_id: Uuid, initiator_id: Uuid, call_type: CallType) -> Result<Call, CallError> {
        self.require_member(channel_id, initiator_id).await?;

        if self.inner.store.find_active_for_channel(channel_id).await?.is_some() {
            return Err(CallError::AlreadyActive);
        }

        let call = Call::ringing(channel_id, initiator_id, call_type);
        self.inner.store.create(&call).await?;

        if let Err(e) = self.inner.store.add_participant(call.id, initiator_id, call.created_at).await {
            tracing::error!(call_id = %call.id, "[Calls] Failed to add initiator as participant: {}", e);
        }

        tracing::info!(
            call_id = %call.id,
            channel_id = %channel_id,
            user_id = %initiator_id,
            "[Calls] Call ringing"
        );
        self.publish(EventType::CallRinging, &call);
        self.arm_ringing_timer(call.id);

        Ok(call)
    }

    /// Accept a ringing call
    pub async fn accept(&self, call_id: Uuid, user_id: Uuid) -> Result<Call, CallError> {
        let mut call = self.load(call_id).await?;
        self.require_member(call.channel_id, user_id).await?;
        if call.status != CallStatus::Ringing {
            return Err(CallError::NotRinging);
        }

        let now = Utc::now();
        if !self.inner.store.mark_started(call_id, user_id, now).await? {
            return Err(CallError::NotRinging);
        }
        self.inner.timers.cancel(call_id);

        if let Err(e) = self.inner.store.add_participant(call_id, user_id, now).await {
            tracing::error!(call_id = %call_id, "[Calls] Failed to add participant: {}", e);
        }

        call.status = CallStatus::InProgress;
        call.accepted_by = Some(user_id);
        call.started_at = Some(now);

        tracing::info!(call_id = %call_id, user_id = %user_id, "[Calls] Call accepted");
        self.publish(EventType::CallAccepted, &call);
        Ok(call)
    }

    /// Decline a ringing call
    pub async fn decline(&self, call_id: Uuid, user_id: Uuid) -> Result<Call, CallError> {
        let mut call = self.load(call_id).await?;
        self.require_member(call.channel_id, user_id).await?;
        if call.status != CallStatus::Ringing {
            return Err(CallError::NotRinging);
        }

        let now = Utc::now();
        if !self
            .inner
            .store
            .mark_ended(call_id, CallStatus::Declined, &[CallStatus::Ringing], now)
            .await?
        {
            return Err(CallError::NotRinging);
        }
        self.inner.timers.cancel(call_id);

        call.status = CallStatus::Declined;
        call.ended_at = Some(now);

        tracing::info!(call_id = %call_id, user_id = %user_id, "[Calls] Call declined");
        self.publish(EventType::CallDeclined, &call);
        Ok(call)
    }

    /// Leave a call
    ///
    /// The call ends, and `call.ended` is broadcast, when the last active
    /// participant leaves. Otherwise it carries on for the others.
    pub async fn hangup(&self, call_id: Uuid, user_id: Uuid) -> Result<Call, CallError> {
        let mut call = self.load(call_id).await?;

        let now = Utc::now();
        if !self.inner.store.remove_participant(call_id, user_id, now).await? {
            return Err(CallError::NotParticipant);
        }
        self.inner.timers.cancel(call_id);

        let remaining = self.inner.store.count_active_participants(call_id).await?;
        if remaining > 0 {
            tracing::debug!(call_id = %call_id, remaining, "[Calls] Participant left");
            return Ok(call);
        }

        let ended = self
            .inner
            .store
            .mark_ended(call_id, CallStatus::Ended, &[CallStatus::Ringing, CallStatus::InProgress], now)
            .await?;
        if ended {
            call.status = CallStatus::Ended;
            call.ended_at = Some(now);
            tracing::info!(call_id = %call_id, "[Calls] Call ended");
            self.publish(EventType::CallEnded, &call);
        }
        Ok(call)
    }

    /// Mark calls left ringing by a previous process as missed
    ///
    /// Run once at startup, before clients connect.
    pub async fn recover_stale_calls(&self) -> Result<u64, CallError> {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.inner.ringing_timeout).unwrap_or_else(|_| chrono::Duration::seconds(30));
        let recovered = self.inner.store.expire_stale_ringing(now - window, now).await?;
        if recovered > 0 {
            tracing::info!(count = recovered, "[Calls] Recovered stale ringing calls");
        }
        Ok(recovered)
    }

    /// Ringing or in-progress call in the channel, if any
    pub async fn active_call(&self, channel_id: Uuid) -> Result<Option<Call>, CallError> {
        Ok(self.inner.store.find_active_for_channel(channel_id).await?)
    }

    /// Most recent calls in the channel, newest first
    pub async fn call_history(&self, channel_id: Uuid) -> Result<Vec<Call>, CallError> {
        Ok(self.inner.store.list_by_channel(channel_id, CALL_HISTORY_LIMIT).await?)
    }

    /// Whether `user_id` may act on calls in `channel_id`
    pub async fn is_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool, CallError> {
        match &self.inner.directory {
            Some(directory) => Ok(directory.is_channel_member(channel_id, user_id).await?),
            None => Ok(true),
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.pending()
    }

    pub(super) fn publisher(&self) -> &Arc<dyn EventPublisher> {
        &self.inner.publisher
    }

    async fn load(&self, call_id: Uuid) -> Result<Call, CallError> {
        self.inner.store.get(call_id).await?.ok_or(CallError::NotFound)
    }

    async fn require_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<(), CallError> {
        if self.is_member(channel_id, user_id).await? {
            Ok(())
        } else {
            Err(CallError::NotParticipant)
        }
    }

    fn publish(&self, event_type: EventType, call: &Call) {
        match Event::new(event_type, Some(call.channel_id), call) {
            Ok(event) => self.inner.publisher.broadcast(call.channel_id, &event),
            Err(e) => tracing::error!(call_id = %call.id, "[Calls] Failed to encode call event: {}", e),
        }
    }

    fn arm_ringing_timer(&self, call_id: Uuid) {
        let coordinator = self.clone();
        let timeout = self.inner.ringing_timeout;
        self.inner.timers.arm(call_id, || {
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if coordinator.inner.timers.take(call_id) {
                    coordinator.expire_ringing(call_id).await;
                }
            })
            .abort_handle()
        });
    }

    async fn expire_ringing(&self, call_id: Uuid) {
        let now = Utc::now();
        let missed = match self
            .inner
            .store
            .mark_ended(call_id, CallStatus::Missed, &[CallStatus::Ringing], now)
            .await
        {
            Ok(missed) => missed,
            Err(e) => {
                tracing::error!(call_id = %call_id, "[Calls] Failed to mark call missed: {}", e);
                return;
            }
        };
        if !missed {
            return;
        }

        match self.inner.store.get(call_id).await {
            Ok(Some(call)) => {
                tracing::info!(call_id = %call_id, "[Calls] Call missed");
                self.publish(EventType::CallMissed, &call);
            }
            Ok(None) => {}
            Err(e) => tracing::error!(call_id = %call_id, "[Calls] Failed to load missed call: {}", e),
        }
    }
}

impl CallCoordinator {
    /// Run one client call event; the outer error is a payload that did not decode
    async fn route_inbound(&self, user_id: Uuid, event: &Event) -> Result<Result<(), CallError>, serde_json::Error> {
        let outcome = match &event.event_type {
            EventType::CallInitiate => {
                let request: InitiateCallRequest = event.payload_as()?;
                self.initiate(request.channel_id, user_id, request.call_type).await.map(drop)
            }
            EventType::CallAccept => {
                let CallIdPayload { call_id } = event.payload_as()?;
                self.accept(call_id, user_id).await.map(drop)
            }
            EventType::CallDecline => {
                let CallIdPayload { call_id } = event.payload_as()?;
                self.decline(call_id, user_id).await.map(drop)
            }
            EventType::CallHangup => {
                let CallIdPayload { call_id } = event.payload_as()?;
                self.hangup(call_id, user_id).await.map(drop)
            }
            signaling if signaling.is_signaling() => {
                let mut message: SignalingMessage = event.payload_as()?;
                message.from_user = user_id;
                self.relay_signaling(signaling.clone(), &message);
                Ok(())
            }
            _ => Ok(()),
        };
        Ok(outcome)
    }
}

#[async_trait]
impl CallEventHandler for CallCoordinator {
    async fn handle_call_event(&self, user_id: Uuid, event: Event) {
        match self.route_inbound(user_id, &event).await {
            Ok(Ok(())) => {}
            Ok(Err(CallError::Store(e))) => {
                tracing::error!(user_id = %user_id, "[Calls] {} failed: {}", event.event_type, e);
            }
            Ok(Err(e)) => {
                tracing::debug!(user_id = %user_id, "[Calls] {} rejected: {}", event.event_type, e);
            }
            Err(e) => {
                tracing::debug!(user_id = %user_id, "[Calls] Bad {} payload: {}", event.event_type, e);
            }
        }
    }
}
