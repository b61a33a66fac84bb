//! Engine.IO v4 / Socket.IO text packet codec.
//!
//! Every WebSocket text frame is one Engine.IO packet: a single type
//! digit followed by an optional payload. Engine.IO `message` packets
//! (type `4`) carry a Socket.IO packet:
//!
//! ```text
//! <type>[<namespace>,][<ack id>][<json>]
//! 40{"token":"..."}                  connect to "/" with auth
//! 42["receive_message",{...}]        event on "/"
//! 44{"message":"unauthorized"}       connect error
//! ```
//!
//! Binary packets are not used by the chat server and are rejected.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default Socket.IO namespace.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Payload of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,

    #[error("unknown {layer} packet type '{kind}'")]
    UnknownType { layer: &'static str, kind: char },

    #[error("binary packets are not supported")]
    BinaryUnsupported,

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("invalid packet JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let kind = text.chars().next().ok_or(PacketError::Empty)?;
        let rest = &text[kind.len_utf8()..];
        match kind {
            '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(rest.to_string())),
            '3' => Ok(EnginePacket::Pong(rest.to_string())),
            '4' => Ok(EnginePacket::Message(SocketPacket::decode(rest)?)),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownType {
                layer: "engine.io",
                kind: other,
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                // OpenHandshake only holds strings and integers.
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(payload) => format!("2{payload}"),
            EnginePacket::Pong(payload) => format!("3{payload}"),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

impl SocketPacket {
    /// Event packet on the default namespace without acknowledgement.
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            name: name.into(),
            args,
        }
    }

    /// Connect packet on the default namespace.
    pub fn connect(data: Option<Value>) -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data,
        }
    }

    pub fn decode(text: &str) -> Result<Self, PacketError> {
        let kind = text.chars().next().ok_or(PacketError::Empty)?;
        let mut rest = &text[kind.len_utf8()..];

        if matches!(kind, '5' | '6') {
            return Err(PacketError::BinaryUnsupported);
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let ns = &rest[..end];
            rest = rest.get(end + 1..).unwrap_or("");
            ns.to_string()
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse::<u64>()
                    .map_err(|e| PacketError::Malformed(format!("ack id: {e}")))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest)?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, data }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let mut items = match data {
                    Some(Value::Array(items)) => items,
                    _ => {
                        return Err(PacketError::Malformed(
                            "event payload must be a JSON array".into(),
                        ))
                    }
                };
                if items.is_empty() {
                    return Err(PacketError::Malformed("event without a name".into()));
                }
                let name = match items.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(PacketError::Malformed(format!(
                            "event name must be a string, got {other}"
                        )))
                    }
                };
                Ok(SocketPacket::Event {
                    namespace,
                    ack_id,
                    name,
                    args: items,
                })
            }
            '3' => {
                let ack_id = ack_id
                    .ok_or_else(|| PacketError::Malformed("ack without an id".into()))?;
                let args = match data {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    Some(other) => vec![other],
                };
                Ok(SocketPacket::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(SocketPacket::ConnectError { namespace, data }),
            other => Err(PacketError::UnknownType {
                layer: "socket.io",
                kind: other,
            }),
        }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        match self {
            SocketPacket::Connect { namespace, data } => {
                out.push('0');
                push_namespace(&mut out, namespace);
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            SocketPacket::Disconnect { namespace } => {
                out.push('1');
                push_namespace(&mut out, namespace);
            }
            SocketPacket::Event {
                namespace,
                ack_id,
                name,
                args,
            } => {
                out.push('2');
                push_namespace(&mut out, namespace);
                if let Some(id) = ack_id {
                    let _ = write!(out, "{id}");
                }
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                out.push_str(&Value::Array(items).to_string());
            }
            SocketPacket::Ack {
                namespace,
                ack_id,
                args,
            } => {
                out.push('3');
                push_namespace(&mut out, namespace);
                let _ = write!(out, "{ack_id}");
                out.push_str(&Value::Array(args.clone()).to_string());
            }
            SocketPacket::ConnectError { namespace, data } => {
                out.push('4');
                push_namespace(&mut out, namespace);
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
        }
        out
    }
}

/// Non-default namespaces are written as `/name,`.
fn push_namespace(out: &mut String, namespace: &str) {
    if namespace != DEFAULT_NAMESPACE {
        out.push_str(namespace);
        out.push(',');
    }
}
