//! Socket connection lifecycle.
//!
//! [`ConnectionState`] is the explicit state machine driven by the chat
//! session task. [`OutboundQueue`] holds emits issued while the socket is
//! not connected so they can be flushed in order once it is.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for or running retry number `attempt`.
    Reconnecting { attempt: u32 },
    /// Terminal; the session was shut down.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt starts.
    Connect,
    /// Handshake completed.
    Established,
    /// The connection dropped or the first attempt failed.
    Lost,
    /// A retry attempt failed.
    RetryFailed,
    Shutdown,
}

impl ConnectionState {
    /// Apply `event`, returning the next state or an error for an
    /// illegal transition.
    pub fn apply(self, event: ConnectionEvent) -> Result<ConnectionState, CoreError> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let next = match (self, event) {
            (S::Closed, _) => None,
            (_, E::Shutdown) => Some(S::Closed),
            (S::Disconnected, E::Connect) => Some(S::Connecting),
            (S::Connecting, E::Established) => Some(S::Connected),
            (S::Connecting, E::Lost) => Some(S::Reconnecting { attempt: 1 }),
            (S::Connected, E::Lost) => Some(S::Reconnecting { attempt: 1 }),
            (S::Reconnecting { attempt }, E::RetryFailed) => Some(S::Reconnecting {
                attempt: attempt.saturating_add(1),
            }),
            (S::Reconnecting { .. }, E::Established) => Some(S::Connected),
            _ => None,
        };

        next.ok_or_else(|| {
            CoreError::InvalidTransition(format!("{event:?} is not valid while {self}"))
        })
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    pub fn is_closed(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            ConnectionState::Closed => f.write_str("closed"),
        }
    }
}

/// Default number of emits buffered while disconnected.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Bounded FIFO of deferred emits. When full, the oldest entry is evicted.
#[derive(Debug)]
pub struct OutboundQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> OutboundQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_OUTBOUND_CAPACITY)),
            capacity,
        }
    }

    /// Append an item, returning the evicted oldest one if the queue was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Put an item back at the head (used when a flush write fails).
    pub fn push_front(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_back();
        }
        self.items.push_front(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for OutboundQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_CAPACITY)
    }
}
