//! Integration tests for `ChatSession` against an in-process Socket.IO
//! server built on tokio-tungstenite.
//!
//! The fake server speaks just enough Engine.IO v4 to complete the
//! handshake, then lets each test script the frames it sends and expects.

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use fret_chat::client::ChatClient;
use fret_chat::events::ChatEvent;
use fret_chat::reconnect::ReconnectConfig;
use fret_chat::session::{ChatSession, ChatSessionError, SessionConfig};
use fret_core::chat::{ChatMessage, MessageKind};
use fret_core::connection::ConnectionState;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerWs = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

const OPEN_PACKET: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Accept one WebSocket and return it with the Authorization header sent.
async fn accept(listener: &TcpListener) -> (ServerWs, Option<String>) {
    let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("client did not connect")
        .unwrap();
    let mut auth = None;
    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        auth = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(resp)
    })
    .await
    .unwrap();
    (ws, auth)
}

async fn next_text(ws: &mut ServerWs) -> String {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

async fn send_text(ws: &mut ServerWs, text: &str) {
    ws.send(Message::Text(text.to_string())).await.unwrap();
}

/// Send the open packet, read the client's connect packet and accept it.
async fn handshake(ws: &mut ServerWs) -> String {
    send_text(ws, OPEN_PACKET).await;
    let connect = next_text(ws).await;
    send_text(ws, r#"40{"sid":"sock-1"}"#).await;
    connect
}

/// Decode a `42[...]` event frame into its name and first argument.
fn event_of(text: &str) -> (String, Value) {
    let body = text.strip_prefix("42").expect("not an event packet");
    let items: Vec<Value> = serde_json::from_str(body).unwrap();
    (
        items[0].as_str().unwrap().to_string(),
        items.get(1).cloned().unwrap_or(Value::Null),
    )
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        },
        ..Default::default()
    }
}

fn message(conversation_id: i64, content: &str) -> ChatMessage {
    ChatMessage {
        id: None,
        conversation_id,
        sender_id: 3,
        content: content.into(),
        kind: MessageKind::Text,
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        read: true,
        local_ref: None,
    }
}

async fn wait_for_state(session: &ChatSession, pred: impl FnMut(&ConnectionState) -> bool) {
    let mut rx = session.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("state not reached")
        .unwrap();
}

/// Receive events until one matches `pred`.
async fn wait_for_event(
    rx: &mut broadcast::Receiver<ChatEvent>,
    mut pred: impl FnMut(&ChatEvent) -> bool,
) -> ChatEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not received")
}

// ---------------------------------------------------------------------------
// Test: the connect carries the bearer header and the token auth payload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_authenticates_with_token() {
    let (listener, url) = bind().await;
    let session = ChatSession::start(ChatClient::new(url, Some("secret".into())), fast_config());

    let (mut ws, auth) = accept(&listener).await;
    assert_eq!(auth.as_deref(), Some("Bearer secret"));

    let connect = handshake(&mut ws).await;
    assert_eq!(connect, r#"40{"token":"secret"}"#);

    wait_for_state(&session, |s| s.is_connected()).await;
    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: emits issued before the connection completes flush in order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deferred_emits_flush_in_order_after_connect() {
    let (listener, url) = bind().await;
    let session = ChatSession::start(ChatClient::new(url, None), fast_config());

    let (mut ws, _) = accept(&listener).await;
    assert!(!session.state().is_connected());

    session.join_room(10).await.unwrap();
    session.send_message(&message(10, "one")).await.unwrap();
    session.send_message(&message(10, "two")).await.unwrap();

    let connect = handshake(&mut ws).await;
    assert_eq!(connect, "40");

    assert_eq!(next_text(&mut ws).await, r#"42["join_room",10]"#);

    let (name, payload) = event_of(&next_text(&mut ws).await);
    assert_eq!(name, "send_message");
    assert_eq!(payload["content"], "one");
    assert_eq!(payload["conversationId"], 10);
    assert_eq!(payload["senderId"], 3);
    assert_eq!(payload["type"], "text");

    let (name, payload) = event_of(&next_text(&mut ws).await);
    assert_eq!(name, "send_message");
    assert_eq!(payload["content"], "two");

    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: receive_message pushes reach subscribers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn received_messages_are_broadcast() {
    let (listener, url) = bind().await;
    let session = ChatSession::start(ChatClient::new(url, None), fast_config());
    let mut events = session.subscribe();

    let (mut ws, _) = accept(&listener).await;
    handshake(&mut ws).await;
    wait_for_state(&session, |s| s.is_connected()).await;

    send_text(
        &mut ws,
        r#"42["receive_message",{"id":91,"conversationId":10,"senderId":2,"content":"Votre conteneur est au port","type":"text","createdAt":"2024-03-01T10:00:00Z"}]"#,
    )
    .await;

    let event = wait_for_event(&mut events, |e| matches!(e, ChatEvent::MessageReceived(_))).await;
    assert_matches!(event, ChatEvent::MessageReceived(ref m) if m.id == Some(91) && m.conversation_id == 10);

    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: server pings are answered with pongs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_ping_is_answered() {
    let (listener, url) = bind().await;
    let session = ChatSession::start(ChatClient::new(url, None), fast_config());

    let (mut ws, _) = accept(&listener).await;
    handshake(&mut ws).await;

    send_text(&mut ws, "2").await;
    assert_eq!(next_text(&mut ws).await, "3");

    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: rooms are re-joined after the connection drops
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rooms_are_rejoined_after_reconnect() {
    let (listener, url) = bind().await;
    let session = ChatSession::start(ChatClient::new(url, None), fast_config());
    let mut events = session.subscribe();

    let (mut ws, _) = accept(&listener).await;
    handshake(&mut ws).await;
    wait_for_state(&session, |s| s.is_connected()).await;

    session.join_room(10).await.unwrap();
    assert_eq!(next_text(&mut ws).await, r#"42["join_room",10]"#);

    drop(ws);

    wait_for_event(&mut events, |e| {
        matches!(e, ChatEvent::StateChanged(ConnectionState::Reconnecting { attempt: 1 }))
    })
    .await;

    let (mut ws, _) = accept(&listener).await;
    handshake(&mut ws).await;
    assert_eq!(next_text(&mut ws).await, r#"42["join_room",10]"#);

    wait_for_state(&session, |s| s.is_connected()).await;
    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a refused connect is reported and retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_connect_is_reported() {
    let (listener, url) = bind().await;
    let session = ChatSession::start(ChatClient::new(url, Some("stale".into())), fast_config());
    let mut events = session.subscribe();

    let (mut ws, _) = accept(&listener).await;
    send_text(&mut ws, OPEN_PACKET).await;
    let _connect = next_text(&mut ws).await;
    send_text(&mut ws, r#"44{"message":"jwt expired"}"#).await;

    let event = wait_for_event(&mut events, |e| matches!(e, ChatEvent::ConnectRejected { .. })).await;
    assert_matches!(event, ChatEvent::ConnectRejected { ref reason } if reason == "jwt expired");

    wait_for_state(&session, |s| matches!(s, ConnectionState::Reconnecting { .. })).await;
    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: shutdown ends in Closed and later emits fail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_closes_session() {
    let (listener, url) = bind().await;
    let session = ChatSession::start(ChatClient::new(url, None), fast_config());

    let (mut ws, _) = accept(&listener).await;
    handshake(&mut ws).await;
    wait_for_state(&session, |s| s.is_connected()).await;

    session.shutdown().await;

    assert_eq!(session.state(), ConnectionState::Closed);
    assert_matches!(session.join_room(1).await, Err(ChatSessionError::Closed));
}

// ---------------------------------------------------------------------------
// Test: shutdown while the server is unreachable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_while_reconnecting() {
    let session = ChatSession::start(ChatClient::new("ws://127.0.0.1:1", None), fast_config());

    wait_for_state(&session, |s| matches!(s, ConnectionState::Reconnecting { .. })).await;
    session.send_message(&message(4, "queued")).await.unwrap();

    session.shutdown().await;
    assert_eq!(session.state(), ConnectionState::Closed);
}
