//! Chat event vocabulary carried in Socket.IO event packets.
//!
//! Client emits: `join_room` (bare conversation id) and `send_message`
//! (an [`OutgoingMessage`]). Server pushes: `receive_message` (a
//! [`ChatMessage`]). Anything else is surfaced as [`ServerEvent::Other`].

use fret_core::chat::{ChatMessage, MessageKind};
use fret_core::types::DbId;
use serde::Serialize;
use serde_json::Value;

use crate::packet::SocketPacket;

pub const EVENT_JOIN_ROOM: &str = "join_room";
pub const EVENT_SEND_MESSAGE: &str = "send_message";
pub const EVENT_RECEIVE_MESSAGE: &str = "receive_message";

/// Payload of `send_message`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub conversation_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl From<&ChatMessage> for OutgoingMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            kind: message.kind,
        }
    }
}

/// An emit requested by the application.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEmit {
    JoinRoom { conversation_id: DbId },
    SendMessage(OutgoingMessage),
}

impl ClientEmit {
    pub fn to_packet(&self) -> Result<SocketPacket, serde_json::Error> {
        Ok(match self {
            ClientEmit::JoinRoom { conversation_id } => {
                SocketPacket::event(EVENT_JOIN_ROOM, vec![Value::from(*conversation_id)])
            }
            ClientEmit::SendMessage(message) => {
                SocketPacket::event(EVENT_SEND_MESSAGE, vec![serde_json::to_value(message)?])
            }
        })
    }
}

/// A server event understood by this client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ReceiveMessage(ChatMessage),
    Other { name: String, args: Vec<Value> },
}

/// Interpret a Socket.IO event by name.
///
/// Returns `Err` when a known event carries a payload that does not
/// decode; unknown event names are not an error.
pub fn parse_event(name: &str, args: Vec<Value>) -> Result<ServerEvent, serde_json::Error> {
    match name {
        EVENT_RECEIVE_MESSAGE => {
            let payload = args.into_iter().next().unwrap_or(Value::Null);
            Ok(ServerEvent::ReceiveMessage(serde_json::from_value(payload)?))
        }
        _ => Ok(ServerEvent::Other {
            name: name.to_string(),
            args,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::EnginePacket;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn join_room_encodes_bare_id() {
        let packet = ClientEmit::JoinRoom { conversation_id: 10 }.to_packet().unwrap();
        assert_eq!(EnginePacket::Message(packet).encode(), r#"42["join_room",10]"#);
    }

    #[test]
    fn send_message_encodes_camel_case() {
        let emit = ClientEmit::SendMessage(OutgoingMessage {
            conversation_id: 10,
            sender_id: 3,
            content: "Bonjour".into(),
            kind: MessageKind::Text,
        });
        let packet = emit.to_packet().unwrap();
        match packet {
            SocketPacket::Event { name, args, .. } => {
                assert_eq!(name, EVENT_SEND_MESSAGE);
                assert_eq!(
                    args[0],
                    json!({"conversationId": 10, "senderId": 3, "content": "Bonjour", "type": "text"})
                );
            }
            other => panic!("Expected Event, got {other:?}"),
        }
    }

    #[test]
    fn parse_receive_message() {
        let args = vec![json!({
            "id": 77,
            "conversationId": 10,
            "senderId": 2,
            "content": "Votre colis est arrivé",
            "createdAt": "2024-03-01T09:30:00Z"
        })];
        let event = parse_event(EVENT_RECEIVE_MESSAGE, args).unwrap();
        match event {
            ServerEvent::ReceiveMessage(msg) => {
                assert_eq!(msg.id, Some(77));
                assert_eq!(msg.conversation_id, 10);
                assert_eq!(msg.kind, MessageKind::Text);
            }
            other => panic!("Expected ReceiveMessage, got {other:?}"),
        }
    }

    #[test]
    fn parse_receive_message_without_payload_fails() {
        assert!(parse_event(EVENT_RECEIVE_MESSAGE, vec![]).is_err());
    }

    #[test]
    fn unknown_event_is_passed_through() {
        let event = parse_event("user_typing", vec![json!(4)]).unwrap();
        assert_matches!(event, ServerEvent::Other { ref name, .. } if name == "user_typing");
    }
}
