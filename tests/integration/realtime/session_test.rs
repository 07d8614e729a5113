//! Session lifecycle tests
//!
//! Handshake, channel delivery, typing relay and presence through
//! `serve_session`.

use axum::extract::ws::{close_code, Message, Utf8Bytes};
use huddle::backend::server::ShutdownPolicy;
use huddle::shared::{Event, EventType};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::common::{connect, connect_as, eventually, test_app, test_app_with, test_config};

#[tokio::test]
async fn test_member_receives_channel_broadcast() {
    let app = test_app().await;
    let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());
    app.directory.add_member(channel, user);

    let mut client = connect_as(app.session_context(), user, "ana").await;
    assert!(eventually(|| app.hub().connection_count() == 1).await);

    let event = Event::new(EventType::MessageNew, Some(channel), &serde_json::json!({ "text": "hi" })).unwrap();
    assert_eq!(app.hub().broadcast_event(channel, &event), 1);

    let received = client.next_event().await.unwrap();
    assert_eq!(received["type"], "message.new");
    assert_eq!(received["channel_id"], channel.to_string());
    assert_eq!(received["payload"]["text"], "hi");

    // Not subscribed to this one
    let other = Event::new(EventType::MessageNew, Some(Uuid::new_v4()), &serde_json::json!({})).unwrap();
    app.hub().broadcast_event(other.channel_id.unwrap(), &other);
    client.assert_silent().await;

    client.close().await;
}

#[tokio::test]
async fn test_invalid_token_is_rejected_with_policy_close() {
    let app = test_app().await;
    let mut client = connect(app.session_context());

    client.authenticate("not-a-token").await;

    let frame = client.expect_close().await.unwrap();
    assert_eq!(frame.code, close_code::POLICY);
    assert_eq!(frame.reason.as_str(), "invalid token");
    assert_eq!(app.hub().connection_count(), 0);
}

#[tokio::test]
async fn test_first_frame_must_be_auth() {
    let app = test_app().await;
    let mut client = connect(app.session_context());

    client
        .send_json(serde_json::json!({ "type": "typing", "channel_id": Uuid::new_v4() }))
        .await;

    let frame = client.expect_close().await.unwrap();
    assert_eq!(frame.code, close_code::POLICY);
    assert_eq!(frame.reason.as_str(), "first message must be auth");
}

#[tokio::test]
async fn test_typing_reaches_other_members_only() {
    let app = test_app().await;
    let channel = Uuid::new_v4();
    let (ana, bo, cy) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    app.directory.add_member(channel, ana);
    app.directory.add_member(channel, bo);

    let mut ana_client = connect_as(app.session_context(), ana, "ana").await;
    assert!(eventually(|| app.hub().connection_count() == 1).await);
    let mut bo_client = connect_as(app.session_context(), bo, "bo").await;
    assert!(eventually(|| app.hub().connection_count() == 2).await);
    let mut cy_client = connect_as(app.session_context(), cy, "cy").await;
    assert!(eventually(|| app.hub().connection_count() == 3).await);

    // Drain presence announcements
    ana_client.next_of_type("presence.update").await.unwrap();
    ana_client.next_of_type("presence.update").await.unwrap();
    bo_client.next_of_type("presence.update").await.unwrap();

    ana_client
        .send_json(serde_json::json!({
            "type": "typing",
            "channel_id": channel,
            "payload": { "user_id": Uuid::new_v4(), "user_name": "spoofed" }
        }))
        .await;

    let typing = bo_client.next_of_type("typing").await.unwrap();
    assert_eq!(typing["payload"]["user_id"], ana.to_string());
    assert_eq!(typing["payload"]["user_name"], "ana");
    assert_eq!(typing["payload"]["channel_id"], channel.to_string());

    ana_client.assert_silent().await;
    cy_client.assert_silent().await;

    // A non-member cannot type into the channel
    cy_client
        .send_json(serde_json::json!({ "type": "typing", "channel_id": channel }))
        .await;
    bo_client.assert_silent().await;
}

#[tokio::test]
async fn test_presence_online_and_offline() {
    let app = test_app().await;
    let (ana, bo) = (Uuid::new_v4(), Uuid::new_v4());

    let mut ana_client = connect_as(app.session_context(), ana, "ana").await;
    assert!(eventually(|| app.hub().connection_count() == 1).await);

    let bo_client = connect_as(app.session_context(), bo, "bo").await;
    let online = ana_client.next_of_type("presence.update").await.unwrap();
    assert_eq!(online["payload"]["user_id"], bo.to_string());
    assert_eq!(online["payload"]["online"], true);

    let mut users = app.hub().online_users();
    users.sort();
    let mut expected = vec![ana, bo];
    expected.sort();
    assert_eq!(users, expected);

    bo_client.close().await;

    let offline = ana_client.next_of_type("presence.update").await.unwrap();
    assert_eq!(offline["payload"]["user_id"], bo.to_string());
    assert_eq!(offline["payload"]["online"], false);
    assert!(eventually(|| app.hub().connection_count() == 1).await);
}

#[tokio::test]
async fn test_subscribe_user_after_connect() {
    let app = test_app().await;
    let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());

    let mut client = connect_as(app.session_context(), user, "ana").await;
    assert!(eventually(|| app.hub().connection_count() == 1).await);

    assert_eq!(app.hub().subscribe_user_to_channel(user, channel), 1);
    let event = Event::new(EventType::DmCreated, Some(channel), &serde_json::json!({})).unwrap();
    app.hub().broadcast_event(channel, &event);
    assert_eq!(client.next_event().await.unwrap()["type"], "dm.created");

    assert_eq!(app.hub().unsubscribe_user_from_channel(user, channel), 1);
    app.hub().broadcast_event(channel, &event);
    client.assert_silent().await;
}

#[tokio::test]
async fn test_stop_with_close_policy_closes_sessions() {
    let mut config = test_config("closing-instance");
    config.realtime.shutdown_policy = ShutdownPolicy::CloseConnections;
    let app = test_app_with(config, None).await;

    let mut client = connect_as(app.session_context(), Uuid::new_v4(), "ana").await;
    assert!(eventually(|| app.hub().connection_count() == 1).await);

    app.hub().stop();

    let frame = client.expect_close().await.unwrap();
    assert_eq!(frame.code, close_code::NORMAL);
}

#[tokio::test]
async fn test_register_after_stop_is_refused() {
    let app = test_app().await;
    app.hub().stop();

    let mut client = connect_as(app.session_context(), Uuid::new_v4(), "ana").await;

    let frame = client.expect_close().await.unwrap();
    assert_eq!(frame.code, close_code::AWAY);
    assert_eq!(app.hub().connection_count(), 0);
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let app = test_app().await;
    let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());
    app.directory.add_member(channel, user);

    let mut client = connect_as(app.session_context(), user, "ana").await;
    assert!(eventually(|| app.hub().connection_count() == 1).await);

    client.send(Message::Text(Utf8Bytes::from_static("{not json"))).await;

    let event = Event::new(EventType::MessageNew, Some(channel), &serde_json::json!({})).unwrap();
    app.hub().broadcast_event(channel, &event);
    assert_eq!(client.next_event().await.unwrap()["type"], "message.new");
    assert_eq!(app.hub().connection_count(), 1);
}
