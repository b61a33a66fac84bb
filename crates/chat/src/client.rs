//! Authenticated Socket.IO connect over WebSocket.
//!
//! [`ChatClient`] holds the socket URL and bearer token. Call
//! [`ChatClient::connect`] to open the WebSocket, read the Engine.IO
//! `open` handshake, send the Socket.IO connect packet carrying the token
//! and wait for the server to accept it.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

use crate::packet::{EnginePacket, OpenHandshake, SocketPacket};

/// The raw WebSocket stream type.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Default upper bound on the whole connect handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the chat server.
#[derive(Debug, Clone)]
pub struct ChatClient {
    socket_url: String,
    token: Option<String>,
    handshake_timeout: Duration,
}

/// A live, authenticated Socket.IO connection.
pub struct ChatConnection {
    /// Engine.IO session id.
    pub engine_sid: String,
    /// Socket.IO session id assigned on connect, when the server sends one.
    pub socket_sid: Option<String>,
    /// Maximum silence tolerated before the connection is considered dead
    /// (`pingInterval + pingTimeout`).
    pub heartbeat_timeout: Duration,
    pub ws_stream: WsStream,
}

impl ChatClient {
    /// * `socket_url` - server base URL, e.g. `ws://host:5000`.
    /// * `token`      - bearer token; `None` connects anonymously.
    pub fn new(socket_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            socket_url: socket_url.into(),
            token,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn socket_url(&self) -> &str {
        &self.socket_url
    }

    /// Full Engine.IO WebSocket endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/socket.io/?EIO=4&transport=websocket",
            self.socket_url.trim_end_matches('/')
        )
    }

    /// Connect and complete the Engine.IO + Socket.IO handshakes.
    pub async fn connect(&self) -> Result<ChatConnection, ChatClientError> {
        tokio::time::timeout(self.handshake_timeout, self.handshake())
            .await
            .map_err(|_| {
                ChatClientError::Connection(format!(
                    "Handshake with {} timed out after {:?}",
                    self.socket_url, self.handshake_timeout
                ))
            })?
    }

    // ---- private helpers ----

    async fn handshake(&self) -> Result<ChatConnection, ChatClientError> {
        let mut request = self
            .endpoint()
            .into_client_request()
            .map_err(|e| ChatClientError::Connection(format!("Invalid socket URL: {e}")))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ChatClientError::Connection(format!("Invalid token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (mut ws_stream, _response) = connect_async(request).await.map_err(|e| {
            ChatClientError::Connection(format!(
                "Failed to connect to chat server at {}: {e}",
                self.socket_url
            ))
        })?;

        let open = match next_packet(&mut ws_stream).await? {
            EnginePacket::Open(open) => open,
            other => {
                return Err(ChatClientError::Protocol(format!(
                    "Expected open packet, got {other:?}"
                )))
            }
        };

        let auth = self.token.as_ref().map(|token| json!({ "token": token }));
        let connect = EnginePacket::Message(SocketPacket::connect(auth));
        ws_stream
            .send(Message::Text(connect.encode()))
            .await
            .map_err(|e| ChatClientError::Protocol(format!("Failed to send connect: {e}")))?;

        let socket_sid = loop {
            match next_packet(&mut ws_stream).await? {
                EnginePacket::Message(SocketPacket::Connect { data, .. }) => {
                    break data
                        .as_ref()
                        .and_then(|d| d.get("sid"))
                        .and_then(|s| s.as_str())
                        .map(str::to_string);
                }
                EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                    return Err(ChatClientError::Rejected(rejection_reason(data)));
                }
                EnginePacket::Ping(payload) => {
                    let pong = EnginePacket::Pong(payload).encode();
                    ws_stream.send(Message::Text(pong)).await.map_err(|e| {
                        ChatClientError::Protocol(format!("Failed to answer ping: {e}"))
                    })?;
                }
                EnginePacket::Noop => {}
                other => {
                    return Err(ChatClientError::Protocol(format!(
                        "Unexpected packet during connect: {other:?}"
                    )))
                }
            }
        };

        tracing::info!(
            engine_sid = %open.sid,
            socket_sid = ?socket_sid,
            "Connected to chat server at {}",
            self.socket_url,
        );

        Ok(ChatConnection {
            heartbeat_timeout: heartbeat_timeout(&open),
            engine_sid: open.sid,
            socket_sid,
            ws_stream,
        })
    }
}

/// `pingInterval + pingTimeout` from the open handshake.
pub fn heartbeat_timeout(open: &OpenHandshake) -> Duration {
    Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout))
}

fn rejection_reason(data: Option<serde_json::Value>) -> String {
    match data {
        Some(value) => value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        None => "connection refused".to_string(),
    }
}

/// Read frames until a decodable Engine.IO text packet arrives.
async fn next_packet(ws_stream: &mut WsStream) -> Result<EnginePacket, ChatClientError> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return EnginePacket::decode(&text)
                    .map_err(|e| ChatClientError::Protocol(format!("Bad packet '{text}': {e}")));
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(ChatClientError::Protocol(format!(
                    "Server closed during handshake: {frame:?}"
                )))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ChatClientError::Connection(e.to_string())),
            None => {
                return Err(ChatClientError::Connection(
                    "Stream ended during handshake".into(),
                ))
            }
        }
    }
}

/// Errors that can occur when connecting to the chat server.
#[derive(Debug, thiserror::Error)]
pub enum ChatClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server spoke something other than the expected handshake.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server refused the Socket.IO connect.
    #[error("Connection rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_engine_io_path() {
        let client = ChatClient::new("ws://localhost:5000/", None);
        assert_eq!(
            client.endpoint(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn heartbeat_is_interval_plus_timeout() {
        let open = OpenHandshake {
            sid: "s".into(),
            upgrades: vec![],
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: None,
        };
        assert_eq!(heartbeat_timeout(&open), Duration::from_secs(45));
    }

    #[test]
    fn rejection_reason_prefers_message() {
        assert_eq!(
            rejection_reason(Some(json!({"message": "jwt expired"}))),
            "jwt expired"
        );
        assert_eq!(rejection_reason(None), "connection refused");
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let client = ChatClient::new("ws://127.0.0.1:1", None)
            .with_handshake_timeout(Duration::from_secs(2));
        assert!(client.connect().await.is_err());
    }
}
