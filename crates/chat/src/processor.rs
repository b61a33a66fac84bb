//! Inbound frame interpretation.
//!
//! Turns one WebSocket frame into an [`Inbound`] action for the session
//! loop: a reply to write back (heartbeat pong), a [`ChatEvent`] to
//! broadcast, a close, or nothing.

use tokio_tungstenite::tungstenite::Message;

use crate::events::ChatEvent;
use crate::messages::{parse_event, ServerEvent};
use crate::packet::{EnginePacket, SocketPacket};

/// What the session should do with a received frame.
#[derive(Debug)]
pub enum Inbound {
    /// Write this text frame back to the server.
    Reply(String),
    Event(ChatEvent),
    /// The server ended the session.
    Closed,
    Ignore,
}

pub fn handle_frame(frame: Message) -> Inbound {
    match frame {
        Message::Text(text) => handle_text(&text),
        Message::Binary(_) => {
            tracing::trace!("Ignoring binary frame");
            Inbound::Ignore
        }
        // Handled automatically by tungstenite.
        Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
        Message::Close(frame) => {
            tracing::info!(?frame, "Chat WebSocket closed");
            Inbound::Closed
        }
        Message::Frame(_) => Inbound::Ignore,
    }
}

fn handle_text(text: &str) -> Inbound {
    let packet = match EnginePacket::decode(text) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Failed to decode chat packet");
            return Inbound::Ignore;
        }
    };

    match packet {
        EnginePacket::Ping(payload) => Inbound::Reply(EnginePacket::Pong(payload).encode()),
        EnginePacket::Close => Inbound::Closed,
        EnginePacket::Message(SocketPacket::Event { name, args, .. }) => handle_event(&name, args),
        EnginePacket::Message(SocketPacket::Disconnect { namespace }) => {
            tracing::info!(namespace = %namespace, "Server disconnected the socket");
            Inbound::Closed
        }
        EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
            tracing::warn!(?data, "Connect error on an established socket");
            Inbound::Closed
        }
        other => {
            tracing::debug!(?other, "Ignoring chat packet");
            Inbound::Ignore
        }
    }
}

fn handle_event(name: &str, args: Vec<serde_json::Value>) -> Inbound {
    match parse_event(name, args) {
        Ok(ServerEvent::ReceiveMessage(message)) => {
            tracing::debug!(
                conversation_id = message.conversation_id,
                message_id = ?message.id,
                "Chat message received",
            );
            Inbound::Event(ChatEvent::MessageReceived(message))
        }
        Ok(ServerEvent::Other { name, args }) => {
            tracing::debug!(event = %name, "Unhandled chat event");
            Inbound::Event(ChatEvent::Unhandled { name, args })
        }
        Err(e) => {
            tracing::warn!(event = %name, error = %e, "Failed to parse chat event payload");
            Inbound::Ignore
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn text(s: &str) -> Message {
        Message::Text(s.to_string())
    }

    #[test]
    fn ping_is_answered_with_pong() {
        assert_matches!(handle_frame(text("2")), Inbound::Reply(ref s) if s == "3");
    }

    #[test]
    fn receive_message_becomes_event() {
        let frame = text(
            r#"42["receive_message",{"id":5,"conversationId":10,"senderId":2,"content":"ok","createdAt":"2024-03-01T09:30:00Z"}]"#,
        );
        assert_matches!(
            handle_frame(frame),
            Inbound::Event(ChatEvent::MessageReceived(ref m)) if m.id == Some(5)
        );
    }

    #[test]
    fn malformed_receive_message_is_ignored() {
        assert_matches!(handle_frame(text(r#"42["receive_message","nope"]"#)), Inbound::Ignore);
    }

    #[test]
    fn unknown_event_is_unhandled() {
        assert_matches!(
            handle_frame(text(r#"42["user_typing",3]"#)),
            Inbound::Event(ChatEvent::Unhandled { ref name, .. }) if name == "user_typing"
        );
    }

    #[test]
    fn server_disconnect_closes() {
        assert_matches!(handle_frame(text("41")), Inbound::Closed);
        assert_matches!(handle_frame(text("1")), Inbound::Closed);
        assert_matches!(handle_frame(Message::Close(None)), Inbound::Closed);
    }

    #[test]
    fn garbage_is_ignored() {
        assert_matches!(handle_frame(text("z")), Inbound::Ignore);
        assert_matches!(handle_frame(Message::Binary(vec![1, 2])), Inbound::Ignore);
    }
}
