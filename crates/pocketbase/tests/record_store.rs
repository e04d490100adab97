#![allow(clippy::unwrap_used, clippy::expect_used)]

use {mockito::Matcher, serde_json::json};

use {
    rarsms_channels::{ChannelAdapter, ConnectionState, Message, MessageType},
    rarsms_pocketbase::{PocketBaseChannel, PocketBaseConfig},
};

fn channel(server: &mockito::ServerGuard, extra: serde_json::Value) -> PocketBaseChannel {
    let mut settings = json!({"url": server.url(), "collection": "messages", "timeout_secs": 2});
    if let (Some(base), Some(extra)) = (settings.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    PocketBaseChannel::new("pocketbase", PocketBaseConfig::from_value(&settings).unwrap())
}

async fn healthy(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":200,"message":"API is healthy."}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn stores_position_record() {
    let mut server = mockito::Server::new_async().await;
    let health = healthy(&mut server).await;
    let create = server
        .mock("POST", "/api/collections/messages/records")
        .match_body(Matcher::PartialJson(json!({
            "message_id": "abc12345",
            "source_protocol": "aprs_main",
            "source_id": "W4ABC-9",
            "message_type": "position",
            "content": "Mobile",
            "latitude": 35.7796,
            "longitude": -78.6382,
            "thread_id": "",
            "reply_to": "",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"rec1"}"#)
        .create_async()
        .await;

    let ch = channel(&server, json!({}));
    assert!(ch.connect().await);
    assert_eq!(ch.state(), ConnectionState::Connected);

    let msg = Message::new("aprs_main", "W4ABC-9", MessageType::Position, "Mobile")
        .with_id("abc12345")
        .with_position(35.7796, -78.6382);
    assert!(ch.send_message(&msg).await);

    health.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn sends_auth_token_when_configured() {
    let mut server = mockito::Server::new_async().await;
    let _health = healthy(&mut server).await;
    let create = server
        .mock("POST", "/api/collections/messages/records")
        .match_header("authorization", "admin-jwt")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let ch = channel(&server, json!({"auth_token": "admin-jwt"}));
    assert!(ch.connect().await);
    assert!(ch.send_message(&Message::new("discord_main", "alice", MessageType::Text, "hi")).await);
    create.assert_async().await;
}

#[tokio::test]
async fn unhealthy_server_fails_connect() {
    let mut server = mockito::Server::new_async().await;
    let _health = server
        .mock("GET", "/api/health")
        .with_status(503)
        .create_async()
        .await;

    let ch = channel(&server, json!({}));
    assert!(!ch.connect().await);
    assert!(!ch.is_connected());
}

#[tokio::test]
async fn rejected_record_reports_failure() {
    let mut server = mockito::Server::new_async().await;
    let _health = healthy(&mut server).await;
    let _create = server
        .mock("POST", "/api/collections/messages/records")
        .with_status(400)
        .with_body(r#"{"code":400,"message":"Failed to create record.","data":{}}"#)
        .create_async()
        .await;

    let ch = channel(&server, json!({}));
    assert!(ch.connect().await);
    assert!(!ch.send_message(&Message::new("aprs_main", "W1AW", MessageType::Text, "hi")).await);
}
