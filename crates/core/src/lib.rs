//! Domain model shared by every Fret client surface.
//!
//! This crate has no I/O. It holds the shipment status registry, the
//! timeline projection used by all role dashboards, the status-update
//! drafts sent to the API, the chat bookkeeping store and the socket
//! connection state machine.

pub mod chat;
pub mod connection;
pub mod error;
pub mod order;
pub mod roles;
pub mod shipment;
pub mod status;
pub mod timeline;
pub mod types;
pub mod update;
pub mod upload;
