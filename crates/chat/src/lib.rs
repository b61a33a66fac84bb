//! Real-time chat client.
//!
//! Speaks Socket.IO (Engine.IO v4 framing) over a WebSocket to the
//! platform's chat server. Provides the packet codec, typed chat events,
//! the authenticated connect handshake, exponential-backoff reconnection
//! and [`session::ChatSession`], which owns the socket task, defers emits
//! while disconnected and broadcasts [`events::ChatEvent`]s.

pub mod client;
pub mod events;
pub mod messages;
pub mod packet;
pub mod processor;
pub mod reconnect;
pub mod session;
