//! Concurrent resolution of a ringing call
//!
//! Accept, decline and the ringing timeout race; exactly one wins and
//! exactly one event is published for it.

use assert_matches::assert_matches;
use std::sync::Arc;
use std::time::Duration;
use huddle::backend::calls::{CallCoordinator, CallError, CallStore, MemoryCallStore};
use huddle::backend::directory::{ChannelDirectory, MemoryDirectory};
use huddle::backend::realtime::EventPublisher;
use huddle::backend::server::CallConfig;
use huddle::shared::{CallStatus, CallType, EventType};

use uuid::Uuid;

use crate::common::RecordingPublisher;

struct Fixture {
    calls: CallCoordinator,
    publisher: Arc<RecordingPublisher>,
    store: Arc<MemoryCallStore>,
    channel: Uuid,
    caller: Uuid,
    callee: Uuid,
}

fn fixture(ringing_timeout: Duration) -> Fixture {
    let publisher = Arc::new(RecordingPublisher::default());
    let store = Arc::new(MemoryCallStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let (channel, caller, callee) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    directory.add_member(channel, caller);
    directory.add_member(channel, callee);

    let call_store: Arc<dyn CallStore> = store.clone();
    let event_publisher: Arc<dyn EventPublisher> = publisher.clone();
    let channel_directory: Arc<dyn ChannelDirectory> = directory;
    let calls = CallCoordinator::new(
        call_store,
        event_publisher,
        Some(channel_directory),
        &CallConfig { ringing_timeout },
    );

    Fixture {
        calls,
        publisher,
        store,
        channel,
        caller,
        callee,
    }
}

#[tokio::test]
async fn test_accept_and_decline_race() {
    let f = fixture(Duration::from_secs(30));
    let call = f.calls.initiate(f.channel, f.caller, CallType::Audio).await.unwrap();

    let (accepted, declined) = tokio::join!(f.calls.accept(call.id, f.callee), f.calls.decline(call.id, f.callee));

    assert!(accepted.is_ok() != declined.is_ok());
    let loser = if accepted.is_ok() { declined.map(drop) } else { accepted.map(drop) };
    assert_matches!(loser, Err(CallError::NotRinging));

    let resolved = f.publisher.count_of(EventType::CallAccepted) + f.publisher.count_of(EventType::CallDeclined);
    assert_eq!(resolved, 1);
    assert_eq!(f.calls.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_after_accept_is_noop() {
    let f = fixture(Duration::from_secs(30));
    let call = f.calls.initiate(f.channel, f.caller, CallType::Video).await.unwrap();

    tokio::time::sleep(Duration::from_secs(29)).await;
    f.calls.accept(call.id, f.callee).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(f.publisher.count_of(EventType::CallMissed), 0);
    let stored = f.store.get(call.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CallStatus::InProgress);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_call_is_missed_once() {
    let f = fixture(Duration::from_secs(30));
    let call = f.calls.initiate(f.channel, f.caller, CallType::Audio).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(f.publisher.count_of(EventType::CallMissed), 1);
    assert_matches!(f.calls.accept(call.id, f.callee).await, Err(CallError::NotRinging));
    assert_matches!(f.calls.decline(call.id, f.callee).await, Err(CallError::NotRinging));
    assert_eq!(
        f.publisher.broadcast_types(),
        vec![EventType::CallRinging, EventType::CallMissed]
    );

    // The channel is free for a new call
    f.calls.initiate(f.channel, f.callee, CallType::Audio).await.unwrap();
}

#[tokio::test]
async fn test_second_initiate_is_rejected_while_ringing() {
    let f = fixture(Duration::from_secs(30));
    f.calls.initiate(f.channel, f.caller, CallType::Audio).await.unwrap();

    assert_matches!(
        f.calls.initiate(f.channel, f.callee, CallType::Audio).await,
        Err(CallError::AlreadyActive)
    );
    assert_eq!(f.publisher.count_of(EventType::CallRinging), 1);
}

#[tokio::test]
async fn test_signaling_is_relayed_not_broadcast() {
    let f = fixture(Duration::from_secs(30));
    let call = f.calls.initiate(f.channel, f.caller, CallType::Video).await.unwrap();

    let message = huddle::shared::SignalingMessage {
        call_id: call.id,
        from_user: f.caller,
        to_user: f.callee,
        data: serde_json::value::RawValue::from_string(r#"{"sdp":"v=0"}"#.to_string()).unwrap(),
    };
    f.calls.relay_signaling(EventType::CallAnswer, &message);
    f.calls.relay_signaling(EventType::CallRinging, &message);

    let direct = f.publisher.direct_messages();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].0, f.callee);
    assert_eq!(f.publisher.broadcast_types(), vec![EventType::CallRinging]);
}
