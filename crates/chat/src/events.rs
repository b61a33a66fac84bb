//! Events broadcast by a [`ChatSession`](crate::session::ChatSession).

use fret_core::chat::ChatMessage;
use fret_core::connection::ConnectionState;
use serde_json::Value;

#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The connection state machine moved.
    StateChanged(ConnectionState),

    /// A `receive_message` push from the server.
    MessageReceived(ChatMessage),

    /// The server refused the Socket.IO connect (bad or expired token).
    ConnectRejected { reason: String },

    /// An oldest deferred emit was dropped because the queue was full.
    EmitDropped,

    /// A server event this client does not interpret.
    Unhandled { name: String, args: Vec<Value> },
}
