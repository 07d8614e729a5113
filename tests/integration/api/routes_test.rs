//! Router tests for the REST surface

use axum::body::{to_bytes, Body};
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::Router;
use huddle::backend::server::create_app;
use huddle::shared::CallType;
use pretty_assertions::assert_eq;
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::{auth_header, test_app, token_for, TestApp};

fn router(app: &TestApp) -> Router {
    create_app(app.state.clone())
}

async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, auth_header(token));
    }
    let response = router(app)
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = get(&app, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["instance_id"], "test-instance");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = test_app().await;

    let (status, _) = get(&app, "/api/calls/rtc-config", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&app, "/api/calls/rtc-config", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rtc_config_defaults_to_public_stun() {
    let app = test_app().await;
    let token = token_for(Uuid::new_v4(), "ana");

    let (status, body) = get(&app, "/api/calls/rtc-config", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], true);
    assert_eq!(body["ice_servers"][0]["urls"][0], "stun:stun.l.google.com:19302");
}

#[tokio::test]
async fn test_active_call_query_validation() {
    let app = test_app().await;
    let token = token_for(Uuid::new_v4(), "ana");

    let (status, body) = get(&app, "/api/calls/active", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "channel_id query param required");

    let (status, body) = get(&app, "/api/calls/active?channel_id=nope", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid channel_id");

    let (status, _) = get(&app, &format!("/api/calls/active?channel_id={}", Uuid::new_v4()), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_active_call_and_history() {
    let app = test_app().await;
    let (user, channel) = (Uuid::new_v4(), Uuid::new_v4());
    app.directory.add_member(channel, user);
    let token = token_for(user, "ana");

    let uri = format!("/api/calls/active?channel_id={}", channel);
    let (status, body) = get(&app, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::Value::Null);

    let call = app.calls().initiate(channel, user, CallType::Audio).await.unwrap();

    let (status, body) = get(&app, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], call.id.to_string());
    assert_eq!(body["status"], "ringing");

    let (status, body) = get(&app, &format!("/api/channels/{}/calls", channel), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_for_non_member_is_forbidden() {
    let app = test_app().await;
    let token = token_for(Uuid::new_v4(), "eve");

    let (status, body) = get(&app, &format!("/api/channels/{}/calls", Uuid::new_v4()), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], 403);

    let (status, _) = get(&app, "/api/channels/not-a-uuid/calls", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_presence_online_and_fallback() {
    let app = test_app().await;
    let token = token_for(Uuid::new_v4(), "ana");

    let (status, body) = get(&app, "/api/presence/online", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));

    let (status, _) = get(&app, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
