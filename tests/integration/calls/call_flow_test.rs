//! Calls driven entirely through websocket frames

use huddle::shared::CallStatus;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::common::{connect_as, eventually, test_app, TestApp, TestClient};

struct Pair {
    app: TestApp,
    channel: Uuid,
    ana: Uuid,
    bo: Uuid,
    ana_client: TestClient,
    bo_client: TestClient,
}

async fn pair_in_channel() -> Pair {
    let app = test_app().await;
    let (channel, ana, bo) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    app.directory.add_member(channel, ana);
    app.directory.add_member(channel, bo);

    let mut ana_client = connect_as(app.session_context(), ana, "ana").await;
    assert!(eventually(|| app.hub().connection_count() == 1).await);
    let bo_client = connect_as(app.session_context(), bo, "bo").await;
    ana_client.next_of_type("presence.update").await.unwrap();

    Pair {
        app,
        channel,
        ana,
        bo,
        ana_client,
        bo_client,
    }
}

async fn initiate(client: &TestClient, channel: Uuid) {
    client
        .send_json(serde_json::json!({
            "type": "call.initiate",
            "payload": { "channel_id": channel, "call_type": "video" }
        }))
        .await;
}

fn call_id_of(event: &serde_json::Value) -> Uuid {
    event["payload"]["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_ring_accept_hangup() {
    let Pair {
        app,
        channel,
        ana,
        bo,
        mut ana_client,
        mut bo_client,
    } = pair_in_channel().await;

    initiate(&ana_client, channel).await;

    let ringing = bo_client.next_of_type("call.ringing").await.unwrap();
    assert_eq!(ringing["channel_id"], channel.to_string());
    assert_eq!(ringing["payload"]["initiator_id"], ana.to_string());
    assert_eq!(ringing["payload"]["call_type"], "video");
    assert_eq!(ringing["payload"]["status"], "ringing");
    let call_id = call_id_of(&ringing);
    ana_client.next_of_type("call.ringing").await.unwrap();

    bo_client
        .send_json(serde_json::json!({ "type": "call.accept", "payload": { "call_id": call_id } }))
        .await;

    let accepted = ana_client.next_of_type("call.accepted").await.unwrap();
    assert_eq!(accepted["payload"]["status"], "in_progress");
    assert_eq!(accepted["payload"]["accepted_by"], bo.to_string());
    bo_client.next_of_type("call.accepted").await.unwrap();
    assert_eq!(app.calls().pending_timers(), 0);

    // First hangup leaves the call running for the other participant
    ana_client
        .send_json(serde_json::json!({ "type": "call.hangup", "payload": { "call_id": call_id } }))
        .await;
    bo_client
        .send_json(serde_json::json!({ "type": "call.hangup", "payload": { "call_id": call_id } }))
        .await;

    let ended = ana_client.next_of_type("call.ended").await.unwrap();
    assert_eq!(ended["payload"]["id"], call_id.to_string());
    assert_eq!(ended["payload"]["status"], "ended");

    let history = app.calls().call_history(channel).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, CallStatus::Ended);
    assert!(app.calls().active_call(channel).await.unwrap().is_none());
}

#[tokio::test]
async fn test_decline_broadcasts_once() {
    let Pair {
        app,
        channel,
        mut ana_client,
        mut bo_client,
        ..
    } = pair_in_channel().await;

    initiate(&ana_client, channel).await;
    let ringing = bo_client.next_of_type("call.ringing").await.unwrap();
    let call_id = call_id_of(&ringing);

    bo_client
        .send_json(serde_json::json!({ "type": "call.decline", "payload": { "call_id": call_id } }))
        .await;
    bo_client
        .send_json(serde_json::json!({ "type": "call.decline", "payload": { "call_id": call_id } }))
        .await;

    let declined = ana_client.next_of_type("call.declined").await.unwrap();
    assert_eq!(declined["payload"]["status"], "declined");
    assert!(ana_client.next_of_type("call.declined").await.is_none());

    assert_eq!(app.calls().pending_timers(), 0);
    let stored = app.calls().call_history(channel).await.unwrap();
    assert_eq!(stored[0].status, CallStatus::Declined);
}

#[tokio::test]
async fn test_signaling_goes_to_target_only() {
    let Pair {
        app,
        channel,
        ana,
        bo,
        mut ana_client,
        mut bo_client,
    } = pair_in_channel().await;

    // A third member watching the channel
    let cy = Uuid::new_v4();
    app.directory.add_member(channel, cy);
    let mut cy_client = connect_as(app.session_context(), cy, "cy").await;
    assert!(eventually(|| app.hub().connection_count() == 3).await);

    let call_id = Uuid::new_v4();
    ana_client
        .send_json(serde_json::json!({
            "type": "call.offer",
            "payload": {
                "call_id": call_id,
                "from_user": cy,
                "to_user": bo,
                "data": { "type": "offer", "sdp": "v=0" }
            }
        }))
        .await;

    let offer = bo_client.next_of_type("call.offer").await.unwrap();
    assert_eq!(offer["payload"]["from_user"], ana.to_string());
    assert_eq!(offer["payload"]["data"]["sdp"], "v=0");
    assert!(offer.get("channel_id").is_none());

    assert!(ana_client.next_of_type("call.offer").await.is_none());
    assert!(cy_client.next_of_type("call.offer").await.is_none());
}

#[tokio::test]
async fn test_non_member_cannot_initiate() {
    let Pair {
        app,
        channel,
        mut bo_client,
        ..
    } = pair_in_channel().await;

    let outsider = Uuid::new_v4();
    let outsider_client = connect_as(app.session_context(), outsider, "eve").await;
    bo_client.next_of_type("presence.update").await.unwrap();

    initiate(&outsider_client, channel).await;

    assert!(bo_client.next_of_type("call.ringing").await.is_none());
    assert!(app.calls().active_call(channel).await.unwrap().is_none());
}
