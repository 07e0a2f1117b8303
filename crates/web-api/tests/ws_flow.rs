mod support;

use chrono::Duration as ChronoDuration;
use config::{HubConfig, SessionConfig};
use domain::SenderIdentity;
use futures_util::SinkExt;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Error as WsError},
};

use support::{expect_closed, recv_json, send_json, TestServer};

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let server = TestServer::start().await;

    let response = Client::new()
        .get(server.http_url("/health"))
        .send()
        .await
        .expect("health request");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn broadcast_skips_peer_that_went_away() {
    let server = TestServer::start().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    let mut c = server.connect().await;
    server.wait_for_connections(3).await;

    let first = json!({"email": "a@x.io", "username": "a", "message": "hello"});
    send_json(&mut a, first.clone()).await;
    assert_eq!(recv_json(&mut a).await, first);
    assert_eq!(recv_json(&mut b).await, first);
    assert_eq!(recv_json(&mut c).await, first);

    b.close(None).await.expect("close b");
    drop(b);
    server.wait_for_connections(2).await;

    let second = json!({"email": "a@x.io", "username": "a", "message": "again"});
    send_json(&mut a, second.clone()).await;
    assert_eq!(recv_json(&mut a).await, second);
    assert_eq!(recv_json(&mut c).await, second);

    let stats = server.wait_for_connections(2).await;
    assert_eq!(stats["hub"]["messages_broadcast"], 2);
    assert_eq!(stats["hub"]["deliveries"], 5);
    assert_eq!(stats["connection_ids"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn legacy_path_joins_the_same_hub() {
    let server = TestServer::start().await;
    let mut legacy = server.connect_path("/ws").await;
    let mut current = server.connect().await;
    server.wait_for_connections(2).await;

    let message = json!({"email": "", "username": "old", "message": "still works"});
    send_json(&mut legacy, message.clone()).await;

    assert_eq!(recv_json(&mut current).await, message);
}

#[tokio::test]
async fn missing_fields_default_to_empty_strings() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    server.wait_for_connections(1).await;

    send_json(&mut client, json!({"message": "just text"})).await;

    assert_eq!(
        recv_json(&mut client).await,
        json!({"email": "", "username": "", "message": "just text"})
    );
}

#[tokio::test]
async fn query_token_overrides_sender_fields() {
    let server = TestServer::start().await;
    let token = server
        .sessions
        .issue(
            SenderIdentity::new("alice@x.io", "alice"),
            ChronoDuration::minutes(5),
        )
        .await;

    let mut alice = server
        .connect_path(&format!("/api/v1/ws?token={}", token))
        .await;
    let mut observer = server.connect().await;
    server.wait_for_connections(2).await;

    send_json(
        &mut alice,
        json!({"email": "mallory@x.io", "username": "mallory", "message": "hi"}),
    )
    .await;

    assert_eq!(
        recv_json(&mut observer).await,
        json!({"email": "alice@x.io", "username": "alice", "message": "hi"})
    );
}

#[tokio::test]
async fn session_cookie_attaches_identity() {
    let server = TestServer::start().await;
    let token = server
        .sessions
        .issue(SenderIdentity::new("bob@x.io", "bob"), ChronoDuration::minutes(5))
        .await;

    let mut request = server
        .ws_url("/api/v1/ws")
        .into_client_request()
        .expect("client request");
    request.headers_mut().insert(
        "cookie",
        HeaderValue::from_str(&format!("theme=dark; token={}", token)).expect("header"),
    );
    let (mut bob, _) = connect_async(request).await.expect("connect with cookie");
    server.wait_for_connections(1).await;

    send_json(&mut bob, json!({"email": "", "username": "", "message": "yo"})).await;

    assert_eq!(
        recv_json(&mut bob).await,
        json!({"email": "bob@x.io", "username": "bob", "message": "yo"})
    );
}

#[tokio::test]
async fn anonymous_upgrade_rejected_when_identity_required() {
    let session = SessionConfig {
        require_identity: true,
        ..SessionConfig::default()
    };
    let server = TestServer::start_with(HubConfig::default(), session).await;

    let err = connect_async(server.ws_url("/api/v1/ws?token=unknown"))
        .await
        .expect_err("upgrade should be refused");

    match err {
        WsError::Http(response) => assert_eq!(response.status().as_u16(), 401),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn malformed_message_closes_connection() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    server.wait_for_connections(1).await;

    client
        .send(tokio_tungstenite::tungstenite::Message::Text("not json".into()))
        .await
        .expect("send");

    expect_closed(&mut client).await;
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn hub_shutdown_closes_clients_and_refuses_upgrades() {
    let mut server = TestServer::start().await;
    let mut client = server.connect().await;
    server.wait_for_connections(1).await;

    let stats = server.stop_hub().await;
    assert_eq!(stats.connections_opened, 1);
    expect_closed(&mut client).await;

    let err = connect_async(server.ws_url("/api/v1/ws"))
        .await
        .expect_err("upgrade after shutdown");
    match err {
        WsError::Http(response) => assert_eq!(response.status().as_u16(), 503),
        other => panic!("unexpected error: {:?}", other),
    }
}
