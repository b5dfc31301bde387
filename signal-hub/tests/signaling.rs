//! End-to-end signaling tests against a live hub on a loopback port.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use webrtc_signal_hub::config::CleanupPolicy;
use webrtc_signal_hub::{protocol, Config, HubError, SignalHub};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(200);

async fn start_hub(config: Config) -> (String, Arc<SignalHub>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub = Arc::new(SignalHub::new(config));

    let server_hub = hub.clone();
    tokio::spawn(async move {
        protocol::serve(server_hub, listener, std::future::pending())
            .await
            .unwrap();
    });

    (format!("ws://{}/ws", addr), hub)
}

async fn connect(url: &str) -> Ws {
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

async fn send(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

async fn recv(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("Timeout waiting for frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

/// True if nothing but control frames arrives within [`SILENCE`].
async fn stays_silent(ws: &mut Ws) -> bool {
    match tokio::time::timeout(SILENCE, ws.next()).await {
        Err(_) => true,
        Ok(Some(Ok(Message::Text(_)))) => false,
        Ok(_) => true,
    }
}

/// True once the hub has closed the socket.
async fn is_closed(ws: &mut Ws) -> bool {
    loop {
        match tokio::time::timeout(RECV_TIMEOUT, ws.next()).await {
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(Message::Text(_)))) => return false,
            Ok(Some(Ok(_))) => continue,
            Err(_) => return false,
        }
    }
}

async fn register(url: &str, id: &str) -> Ws {
    let mut ws = connect(url).await;
    send(&mut ws, json!({"type": "connection", "clientId": id})).await;
    assert_eq!(
        recv(&mut ws).await,
        json!({"type": "connection", "status": "connected", "clientId": id})
    );
    ws
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn registration_echoes_client_id() {
    let (url, hub) = start_hub(Config::default()).await;

    let mut sockets = Vec::new();
    for id in ["A", "browser-client", "device", "ü-ñ 42"] {
        sockets.push(register(&url, id).await);
    }
    assert_eq!(hub.registered_clients(), 4);
}

#[tokio::test]
async fn empty_client_id_gets_one_error_and_is_dropped() {
    let (url, hub) = start_hub(Config::default()).await;
    let mut ws = connect(&url).await;

    send(&mut ws, json!({"type": "connection", "clientId": ""})).await;
    assert_eq!(
        recv(&mut ws).await,
        json!({"type": "error", "message": "Client ID is required"})
    );
    assert!(is_closed(&mut ws).await);
    assert_eq!(hub.registered_clients(), 0);
}

#[tokio::test]
async fn offer_answer_and_candidates_flow_between_peers() {
    let (url, _hub) = start_hub(Config::default()).await;
    let mut a = register(&url, "A").await;
    let mut b = register(&url, "B").await;

    send(&mut a, json!({"type": "offer", "target": "B", "offer": {"sdp": "x"}})).await;
    assert_eq!(
        recv(&mut b).await,
        json!({"type": "offer", "offer": {"sdp": "x"}, "from": "A"})
    );

    send(&mut b, json!({"type": "answer", "target": "A", "answer": {"sdp": "y", "type": "answer"}})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"type": "answer", "answer": {"sdp": "y", "type": "answer"}, "from": "B"})
    );

    let candidate = json!({"candidate": "candidate:1 1 udp 2130706431 192.0.2.1 5000 typ host", "sdpMLineIndex": 0});
    let frame = json!({"type": "ice-candidate", "target": "A", "candidate": candidate});
    send(&mut b, frame.clone()).await;
    send(&mut b, frame).await;
    for _ in 0..2 {
        assert_eq!(
            recv(&mut a).await,
            json!({"type": "ice-candidate", "candidate": candidate, "from": "B"})
        );
    }
}

#[tokio::test]
async fn offer_to_ghost_reports_error_only_to_sender() {
    let (url, _hub) = start_hub(Config::default()).await;
    let mut a = register(&url, "A").await;
    let mut b = register(&url, "B").await;

    send(&mut a, json!({"type": "offer", "target": "ghost", "offer": {}})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"type": "error", "message": "Target client ghost not found"})
    );
    assert!(stays_silent(&mut b).await);
}

#[tokio::test]
async fn answer_to_ghost_is_silent() {
    let (url, _hub) = start_hub(Config::default()).await;
    let mut a = register(&url, "A").await;

    send(&mut a, json!({"type": "answer", "target": "ghost", "answer": {}})).await;
    send(&mut a, json!({"type": "ice-candidate", "target": "ghost", "candidate": {}})).await;
    assert!(stays_silent(&mut a).await);
}

#[tokio::test]
async fn disconnect_removes_registration() {
    let (url, hub) = start_hub(Config::default()).await;
    let mut a = register(&url, "A").await;
    let b = register(&url, "B").await;

    drop(b);
    wait_until(|| !hub.is_registered(&"B".into())).await;

    send(&mut a, json!({"type": "offer", "target": "B", "offer": {}})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"type": "error", "message": "Target client B not found"})
    );
}

#[tokio::test]
async fn re_registration_routes_to_newest_connection() {
    let mut config = Config::default();
    config.registry.cleanup_policy = CleanupPolicy::OwnerOnly;
    let (url, hub) = start_hub(config).await;

    let mut stale = register(&url, "A").await;
    let mut fresh = register(&url, "A").await;
    let mut b = register(&url, "B").await;

    // The stale socket can still talk, but is not routed to.
    send(&mut stale, json!({"type": "offer", "target": "B", "offer": {"n": 1}})).await;
    assert_eq!(
        recv(&mut b).await,
        json!({"type": "offer", "offer": {"n": 1}, "from": "A"})
    );

    send(&mut b, json!({"type": "answer", "target": "A", "answer": {"n": 2}})).await;
    assert_eq!(
        recv(&mut fresh).await,
        json!({"type": "answer", "answer": {"n": 2}, "from": "B"})
    );
    assert!(stays_silent(&mut stale).await);

    // Under owner-only cleanup the stale socket closing leaves "A" routed.
    drop(stale);
    wait_until(|| hub.active_connections() == 2).await;
    assert!(hub.is_registered(&"A".into()));
}

#[tokio::test]
async fn by_key_cleanup_drops_takeover_on_stale_close() {
    let (url, hub) = start_hub(Config::default()).await;

    let stale = register(&url, "A").await;
    let _fresh = register(&url, "A").await;

    drop(stale);
    wait_until(|| !hub.is_registered(&"A".into())).await;
}

#[tokio::test]
async fn malformed_frame_closes_connection_and_cleans_up() {
    let (url, hub) = start_hub(Config::default()).await;
    let mut a = register(&url, "A").await;

    a.send(Message::Text("not json".to_string())).await.unwrap();
    assert!(is_closed(&mut a).await);
    wait_until(|| !hub.is_registered(&"A".into())).await;
}

#[tokio::test]
async fn binary_frames_are_ignored() {
    let (url, _hub) = start_hub(Config::default()).await;
    let mut a = register(&url, "A").await;

    a.send(Message::Binary(vec![0, 1, 2])).await.unwrap();
    send(&mut a, json!({"type": "offer", "target": "nobody", "offer": null})).await;
    assert_eq!(
        recv(&mut a).await,
        json!({"type": "error", "message": "Target client nobody not found"})
    );
}

#[tokio::test]
async fn connection_limit_rejects_upgrade() {
    let mut config = Config::default();
    config.limits.max_connections = 1;
    let (url, _hub) = start_hub(config).await;

    let _first = register(&url, "A").await;
    assert!(connect_async(url.as_str()).await.is_err());
}

#[tokio::test]
async fn custom_ws_path_is_served() {
    let mut config = Config::default();
    config.server.ws_path = "/signal".to_string();
    let (url, _hub) = start_hub(config).await;

    let custom = url.replace("/ws", "/signal");
    let _ws = register(&custom, "A").await;
    assert!(connect_async(url.as_str()).await.is_err());
}

#[tokio::test]
async fn multi_megabyte_offer_is_relayed() {
    let (url, _hub) = start_hub(Config::default()).await;
    let mut a = register(&url, "A").await;
    let mut b = register(&url, "B").await;

    let sdp = "v=0 ".repeat(512 * 1024);
    send(&mut a, json!({"type": "offer", "target": "B", "offer": {"sdp": sdp}})).await;

    let relayed = recv(&mut b).await;
    assert_eq!(relayed["offer"]["sdp"].as_str().map(str::len), Some(2 * 1024 * 1024));
    assert_eq!(relayed["from"], json!("A"));
}

#[tokio::test]
async fn stale_connection_switching_id_keeps_takeover_routed() {
    let (url, hub) = start_hub(Config::default()).await;
    let mut stale = register(&url, "A").await;
    let mut fresh = register(&url, "A").await;
    let mut b = register(&url, "B").await;

    send(&mut stale, json!({"type": "connection", "clientId": "C"})).await;
    assert_eq!(
        recv(&mut stale).await,
        json!({"type": "connection", "status": "connected", "clientId": "C"})
    );
    assert!(hub.is_registered(&"A".into()));

    send(&mut b, json!({"type": "answer", "target": "A", "answer": {}})).await;
    assert_eq!(
        recv(&mut fresh).await,
        json!({"type": "answer", "answer": {}, "from": "B"})
    );
}

#[tokio::test]
async fn serve_rejects_invalid_config() {
    let mut config = Config::default();
    config.server.outbound_buffer = 0;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hub = Arc::new(SignalHub::new(config));

    let err = protocol::serve(hub, listener, std::future::pending())
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Config(_)));
}
