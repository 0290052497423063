use campus_realtime::config::{BroadcasterConfig, RelayConfig};
use campus_realtime::relay::{self, RelayState};
use campus_realtime::services::{Broadcaster, HttpRelayBroadcaster};
use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestRelay {
    ws_addr: SocketAddr,
    ingress_addr: SocketAddr,
    state: Arc<RelayState>,
}

impl TestRelay {
    fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/api/ws{query}", self.ws_addr)
    }

    fn broadcast_url(&self) -> String {
        format!("http://{}/broadcast", self.ingress_addr)
    }
}

async fn spawn_relay() -> TestRelay {
    spawn_relay_with(None).await
}

/// The global recorder can only be installed once per test binary.
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| PrometheusBuilder::new().install_recorder().unwrap())
        .clone()
}

async fn spawn_relay_with(prometheus_handle: Option<PrometheusHandle>) -> TestRelay {
    let config = RelayConfig {
        welcome_delay_ms: 10,
        ..RelayConfig::default()
    };
    let state = RelayState::new(config, prometheus_handle);

    let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = ws_listener.local_addr().unwrap();
    let ws_app = relay::ws_router(state.clone());
    tokio::spawn(async move {
        axum::serve(ws_listener, ws_app).await.unwrap();
    });

    let ingress_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ingress_addr = ingress_listener.local_addr().unwrap();
    let ingress_app = relay::ingress_router(state.clone());
    tokio::spawn(async move {
        axum::serve(ingress_listener, ingress_app).await.unwrap();
    });

    TestRelay {
        ws_addr,
        ingress_addr,
        state,
    }
}

/// Connects and waits for the welcome so the connection is registered.
async fn connect(relay: &TestRelay, query: &str) -> (Client, String) {
    let (mut ws, _) = connect_async(relay.ws_url(query)).await.unwrap();
    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "connected");
    let id = welcome["connectionId"].as_str().unwrap().to_string();
    (ws, id)
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(ws: &mut Client) {
    let next = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(next.is_err(), "unexpected message: {next:?}");
}

async fn send_json(ws: &mut Client, value: &Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// A ping round trip orders everything sent before it.
async fn sync(ws: &mut Client) {
    send_json(ws, &json!({ "type": "ping" })).await;
    let pong = next_json(ws).await;
    assert_eq!(pong["type"], "pong");
}

async fn post_broadcast(relay: &TestRelay, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(relay.broadcast_url())
        .json(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_welcome_message() {
    let relay = spawn_relay().await;

    let (_ws, id) = connect(&relay, "").await;

    assert_eq!(id.len(), 13);
    assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
}

#[tokio::test]
async fn test_ping_pong() {
    let relay = spawn_relay().await;
    let (mut ws, _) = connect(&relay, "").await;

    send_json(&mut ws, &json!({ "type": "ping" })).await;

    let pong = next_json(&mut ws).await;
    assert_eq!(pong["type"], "pong");
    assert!(pong["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let relay = spawn_relay().await;
    let (mut ws, _) = connect(&relay, "").await;

    ws.send(Message::text("not json")).await.unwrap();
    send_json(&mut ws, &json!({ "type": "no_such_type" })).await;

    sync(&mut ws).await;
}

#[tokio::test]
async fn test_auth_success() {
    let relay = spawn_relay().await;
    let (mut ws, _) = connect(&relay, "").await;

    send_json(&mut ws, &json!({ "type": "auth", "userId": "u1" })).await;

    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "auth_success");
    assert_eq!(reply["userId"], "u1");
    assert_eq!(relay.state.hub.stats().total_users, 1);
}

#[tokio::test]
async fn test_ingress_reaches_subscribed_sockets_only() {
    let relay = spawn_relay().await;
    let (mut subscribed, _) = connect(&relay, "?channel=room-1").await;
    let (mut bystander, _) = connect(&relay, "").await;

    let response = post_broadcast(
        &relay,
        &json!({
            "type": "broadcast",
            "channel": "room-1",
            "message": { "text": "hello" }
        }),
    )
    .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["delivered"], 1);

    let received = next_json(&mut subscribed).await;
    assert_eq!(received, json!({ "text": "hello", "channel": "room-1" }));

    assert_silent(&mut bystander).await;
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe_messages() {
    let relay = spawn_relay().await;
    let (mut ws, _) = connect(&relay, "").await;

    send_json(&mut ws, &json!({ "type": "subscribe", "channel": "feed" })).await;
    sync(&mut ws).await;

    post_broadcast(&relay, &json!({ "channel": "feed", "message": "one" })).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({ "channel": "feed", "data": "one" })
    );

    send_json(&mut ws, &json!({ "type": "unsubscribe", "channel": "feed" })).await;
    sync(&mut ws).await;

    let response = post_broadcast(&relay, &json!({ "channel": "feed", "message": "two" })).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["delivered"], 0);
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn test_typing_is_relayed_to_conversation() {
    let relay = spawn_relay().await;
    let (mut watcher, _) = connect(&relay, "?channel=typing-c1").await;
    let (mut typist, _) = connect(&relay, "").await;

    send_json(&mut typist, &json!({ "type": "auth", "userId": "u2" })).await;
    next_json(&mut typist).await;

    send_json(
        &mut typist,
        &json!({ "type": "typing", "conversationId": "c1", "userName": "Bo" }),
    )
    .await;

    let received = next_json(&mut watcher).await;
    assert_eq!(received["type"], "user_typing");
    assert_eq!(received["channel"], "typing-c1");
    assert_eq!(received["userId"], "u2");
    assert_eq!(received["userName"], "Bo");
}

#[tokio::test]
async fn test_ingress_rejects_missing_channel() {
    let relay = spawn_relay().await;

    let response = post_broadcast(&relay, &json!({ "message": { "x": 1 } })).await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_stats_and_disconnect_cleanup() {
    let relay = spawn_relay().await;
    let (ws, _) = connect(&relay, "?channel=room-2").await;

    let stats: Value = reqwest::get(format!("http://{}/stats", relay.ingress_addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalConnections"], 1);
    assert_eq!(stats["totalChannels"], 1);

    drop(ws);

    for _ in 0..50 {
        if relay.state.hub.stats().total_connections == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let stats = relay.state.hub.stats();
    assert_eq!(stats.total_connections, 0);
    assert_eq!(stats.total_channels, 0);
}

#[tokio::test]
async fn test_http_broadcaster_delivers_through_ingress() {
    let relay = spawn_relay().await;
    let (mut ws, _) = connect(&relay, "?channel=user-u1").await;

    let broadcaster = HttpRelayBroadcaster::new(&BroadcasterConfig {
        enabled: true,
        relay_url: relay.broadcast_url(),
        timeout_seconds: 2,
    })
    .unwrap();

    broadcaster
        .broadcast("user-u1", json!({ "type": "new-notification", "id": "n1" }))
        .await;

    let received = next_json(&mut ws).await;
    assert_eq!(received["type"], "new-notification");
    assert_eq!(received["channel"], "user-u1");
}

#[tokio::test]
async fn test_ingress_exports_metrics() {
    let relay = spawn_relay_with(Some(metrics_handle())).await;
    let (_ws, _) = connect(&relay, "?channel=room-3").await;
    post_broadcast(&relay, &json!({ "channel": "room-3", "message": "hi" })).await;

    let response = reqwest::get(format!("http://{}/metrics", relay.ingress_addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response.text().await.unwrap();
    assert!(body.contains("relay_connections_active"), "{body}");
    assert!(body.contains("http_requests_total"), "{body}");
}

#[tokio::test]
async fn test_ingress_metrics_without_recorder() {
    let relay = spawn_relay().await;

    let response = reqwest::get(format!("http://{}/metrics", relay.ingress_addr))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "Metrics not enabled or failed to initialize"
    );
}
