//! Long-lived chat session.
//!
//! [`ChatSession`] owns a single socket task that connects, serves frames
//! and reconnects with backoff until shut down. Callers talk to it through
//! an mpsc command channel and observe it through a `watch` of
//! [`ConnectionState`] and a broadcast of [`ChatEvent`]s.
//!
//! Emits issued while the socket is not connected are parked in a bounded
//! [`OutboundQueue`] and flushed in order once it is. Every joined room is
//! re-joined after each (re)connect, before queued messages are flushed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fret_core::chat::ChatMessage;
use fret_core::connection::{
    ConnectionEvent, ConnectionState, OutboundQueue, DEFAULT_OUTBOUND_CAPACITY,
};
use fret_core::types::DbId;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{ChatClient, ChatClientError, ChatConnection, WsStream};
use crate::events::ChatEvent;
use crate::messages::{ClientEmit, OutgoingMessage};
use crate::packet::EnginePacket;
use crate::processor::{handle_frame, Inbound};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for chat events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the caller -> socket task command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// How long [`ChatSession::shutdown`] waits for the socket task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub reconnect: ReconnectConfig,
    /// Maximum number of emits deferred while disconnected.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// Handle to the chat socket task.
///
/// Created via [`ChatSession::start`]. The returned `Arc` can be cloned
/// freely; call [`ChatSession::shutdown`] to stop the task.
pub struct ChatSession {
    cmd_tx: mpsc::Sender<ClientEmit>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    event_tx: broadcast::Sender<ChatEvent>,
    cancel: CancellationToken,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ChatSession {
    /// Spawn the socket task. Must be called inside a tokio runtime.
    pub fn start(client: ChatClient, config: SessionConfig) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let state_tx = Arc::new(state_tx);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let worker = SocketTask {
            queue: OutboundQueue::new(config.outbound_capacity),
            rooms: Vec::new(),
            client,
            reconnect: config.reconnect,
            cmd_rx,
            state_tx: Arc::clone(&state_tx),
            event_tx: event_tx.clone(),
            cancel: cancel.clone(),
        };

        let task_handle = tokio::spawn(async move {
            tracing::info!(url = worker.client.socket_url(), "Starting chat socket task");
            worker.run().await;
            tracing::info!("Chat socket task exited");
        });

        Arc::new(Self {
            cmd_tx,
            state_tx,
            event_tx,
            cancel,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    /// Subscribe to chat events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Join a conversation room. The room is re-joined after every
    /// reconnect.
    pub async fn join_room(&self, conversation_id: DbId) -> Result<(), ChatSessionError> {
        self.emit(ClientEmit::JoinRoom { conversation_id }).await
    }

    /// Emit `send_message` for `message`, deferring it while disconnected.
    pub async fn send_message(&self, message: &ChatMessage) -> Result<(), ChatSessionError> {
        self.emit(ClientEmit::SendMessage(OutgoingMessage::from(message)))
            .await
    }

    /// Stop the socket task, waiting up to 5 seconds for a clean exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down chat session");
        self.cancel.cancel();

        let handle = self
            .task_handle
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Chat socket task did not stop in time");
            }
        }

        // The task normally publishes Closed itself; this covers a timeout.
        self.state_tx.send_replace(ConnectionState::Closed);
        tracing::info!("Chat session shut down complete");
    }

    async fn emit(&self, emit: ClientEmit) -> Result<(), ChatSessionError> {
        if self.cancel.is_cancelled() {
            return Err(ChatSessionError::Closed);
        }
        self.cmd_tx
            .send(emit)
            .await
            .map_err(|_| ChatSessionError::Closed)
    }
}

/// How a connected period ended.
enum Served {
    Dropped,
    Cancelled,
}

/// State owned by the spawned socket task.
struct SocketTask {
    client: ChatClient,
    reconnect: ReconnectConfig,
    cmd_rx: mpsc::Receiver<ClientEmit>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    event_tx: broadcast::Sender<ChatEvent>,
    cancel: CancellationToken,
    queue: OutboundQueue<ClientEmit>,
    /// Joined rooms in join order.
    rooms: Vec<DbId>,
}

impl SocketTask {
    /// Core loop: connect -> serve -> reconnect, until cancelled.
    async fn run(mut self) {
        transition(&self.state_tx, &self.event_tx, ConnectionEvent::Connect);

        let mut first = true;
        loop {
            let Some(conn) = self.establish(first).await else {
                break;
            };
            first = false;
            transition(&self.state_tx, &self.event_tx, ConnectionEvent::Established);

            match self.serve(conn).await {
                Served::Cancelled => break,
                Served::Dropped => {
                    tracing::info!("Chat connection lost, entering reconnect loop");
                    transition(&self.state_tx, &self.event_tx, ConnectionEvent::Lost);
                }
            }
        }

        transition(&self.state_tx, &self.event_tx, ConnectionEvent::Shutdown);
    }

    /// Obtain a connection, deferring caller commands meanwhile.
    ///
    /// Returns `None` when cancelled or when every session handle is gone.
    async fn establish(&mut self, first: bool) -> Option<ChatConnection> {
        let Self {
            client,
            reconnect,
            cmd_rx,
            state_tx,
            event_tx,
            cancel,
            queue,
            rooms,
        } = self;
        let (client, reconnect, cancel) = (&*client, &*reconnect, &*cancel);
        let (state_tx, event_tx) = (&**state_tx, &*event_tx);

        let attempt = async move {
            if first {
                match client.connect().await {
                    Ok(conn) => return Some(conn),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Chat connection failed, entering reconnect loop",
                        );
                        report_failure(event_tx, &e);
                        transition(state_tx, event_tx, ConnectionEvent::Lost);
                    }
                }
            }
            reconnect_loop(client, reconnect, cancel, |_, e| {
                report_failure(event_tx, e);
                transition(state_tx, event_tx, ConnectionEvent::RetryFailed);
            })
            .await
        };
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                conn = &mut attempt => return conn,
                cmd = cmd_rx.recv() => match cmd {
                    Some(emit) => defer(queue, rooms, event_tx, emit),
                    None => return None,
                },
            }
        }
    }

    /// Re-join rooms, flush deferred emits, then pump frames and commands
    /// until the connection drops or the task is cancelled.
    async fn serve(&mut self, conn: ChatConnection) -> Served {
        let heartbeat = conn.heartbeat_timeout;
        let mut ws_stream = conn.ws_stream;

        for &conversation_id in &self.rooms {
            let emit = ClientEmit::JoinRoom { conversation_id };
            if write_emit(&mut ws_stream, &emit).await.is_err() {
                return Served::Dropped;
            }
        }

        while let Some(emit) = self.queue.pop() {
            if write_emit(&mut ws_stream, &emit).await.is_err() {
                self.queue.push_front(emit);
                return Served::Dropped;
            }
        }

        tracing::debug!(rooms = self.rooms.len(), "Chat session ready");

        let deadline = tokio::time::sleep(heartbeat);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    close(&mut ws_stream).await;
                    return Served::Cancelled;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(emit) = cmd else {
                        close(&mut ws_stream).await;
                        return Served::Cancelled;
                    };
                    remember_room(&mut self.rooms, &emit);
                    if write_emit(&mut ws_stream, &emit).await.is_err() {
                        defer(&mut self.queue, &mut self.rooms, &self.event_tx, emit);
                        return Served::Dropped;
                    }
                }
                frame = ws_stream.next() => {
                    deadline.as_mut().reset(Instant::now() + heartbeat);
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Chat WebSocket receive error");
                            return Served::Dropped;
                        }
                        None => return Served::Dropped,
                    };
                    match handle_frame(frame) {
                        Inbound::Reply(text) => {
                            if let Err(e) = ws_stream.send(Message::Text(text)).await {
                                tracing::error!(error = %e, "Failed to answer heartbeat");
                                return Served::Dropped;
                            }
                        }
                        Inbound::Event(event) => {
                            let _ = self.event_tx.send(event);
                        }
                        Inbound::Closed => return Served::Dropped,
                        Inbound::Ignore => {}
                    }
                }
                _ = &mut deadline => {
                    tracing::warn!(
                        timeout_ms = heartbeat.as_millis() as u64,
                        "No traffic from chat server within heartbeat window",
                    );
                    return Served::Dropped;
                }
            }
        }
    }
}

/// Apply `event` to the shared state and broadcast the new state.
fn transition(
    state_tx: &watch::Sender<ConnectionState>,
    event_tx: &broadcast::Sender<ChatEvent>,
    event: ConnectionEvent,
) {
    let current = *state_tx.borrow();
    match current.apply(event) {
        Ok(next) => {
            state_tx.send_replace(next);
            tracing::debug!(from = %current, to = %next, "Chat connection state changed");
            let _ = event_tx.send(ChatEvent::StateChanged(next));
        }
        Err(e) => tracing::warn!(error = %e, "Ignoring connection state event"),
    }
}

fn report_failure(event_tx: &broadcast::Sender<ChatEvent>, error: &ChatClientError) {
    if let ChatClientError::Rejected(reason) = error {
        let _ = event_tx.send(ChatEvent::ConnectRejected {
            reason: reason.clone(),
        });
    }
}

fn remember_room(rooms: &mut Vec<DbId>, emit: &ClientEmit) {
    if let ClientEmit::JoinRoom { conversation_id } = emit {
        if !rooms.contains(conversation_id) {
            rooms.push(*conversation_id);
        }
    }
}

/// Park an emit while disconnected. Joins are only recorded since rooms
/// are re-joined on connect.
fn defer(
    queue: &mut OutboundQueue<ClientEmit>,
    rooms: &mut Vec<DbId>,
    event_tx: &broadcast::Sender<ChatEvent>,
    emit: ClientEmit,
) {
    if matches!(emit, ClientEmit::JoinRoom { .. }) {
        remember_room(rooms, &emit);
        return;
    }
    if queue.push(emit).is_some() {
        tracing::warn!(
            queued = queue.len(),
            "Outbound chat queue full, dropped oldest emit",
        );
        let _ = event_tx.send(ChatEvent::EmitDropped);
    }
}

/// Encode and write one emit. An emit that cannot be encoded is logged
/// and skipped; only transport failures are returned.
async fn write_emit(
    ws_stream: &mut WsStream,
    emit: &ClientEmit,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let packet = match emit.to_packet() {
        Ok(packet) => packet,
        Err(e) => {
            tracing::error!(error = %e, ?emit, "Failed to encode chat emit");
            return Ok(());
        }
    };
    let text = EnginePacket::Message(packet).encode();
    ws_stream.send(Message::Text(text)).await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to write chat emit");
        e
    })
}

async fn close(ws_stream: &mut WsStream) {
    if let Err(e) = ws_stream.close(None).await {
        tracing::debug!(error = %e, "Error while closing chat WebSocket");
    }
}

/// Errors returned by [`ChatSession`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatSessionError {
    /// The session was shut down.
    #[error("Chat session is closed")]
    Closed,
}
