//! In-memory realtime server.
//!
//! `SimServer` plays the server side of the duplex channel over tokio
//! channels. [`SimConnector`] hands its sockets to the real realtime task, so
//! tests exercise the production connection manager, room tracker, ack
//! correlation and dispatcher without a network.
//!
//! Each socket is served by its own task that decodes client frames, records
//! them and replies the way the server does: an `auth_response` to `auth`,
//! acks to `send_message`/`delete_message`/`get_notifications`, `pong` to
//! `ping`, and `new_message`/`message_deleted` broadcasts to the chat room.
//! Test knobs refuse connections, swallow acks, lose read marks in transit or
//! drop every open socket.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use plaza_client::{ConnectedSocket, Connector, TransportError};
use plaza_proto::{
    Ack, AckPayload, AuthResponse, AuthStatus, ChatId, ChatMessage, ClientFrame, ConnectedInfo,
    InboundEvent, MessageDeleted, MessageId, OutboundRequest, UserId,
    rest::NotificationPage,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::mock_api::stamp;

/// Frames buffered towards the client.
const CHANNEL_CAPACITY: usize = 64;

/// First id the server assigns to messages sent over the channel.
const FIRST_MESSAGE_ID: MessageId = 1_000;

/// A frame the server received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Connection it arrived on (1-based, in open order)
    pub connection: u64,
    /// Raw text
    pub text: String,
    /// Decoded frame. `None` for text the server could not parse.
    pub frame: Option<ClientFrame>,
}

/// Per-socket server state.
#[derive(Debug)]
struct Connection {
    /// Frames pushed by the test or broadcast by other sockets
    push: mpsc::UnboundedSender<String>,
    rooms: BTreeSet<ChatId>,
    authenticated: bool,
}

#[derive(Debug)]
struct ServerState {
    user_id: UserId,
    username: String,
    /// Token `auth` must carry. `None` accepts any.
    token: Option<String>,
    refuse: bool,
    drop_acks: bool,
    lose_reads: bool,
    attempts: u32,
    next_connection: u64,
    connections: BTreeMap<u64, Connection>,
    next_message_id: MessageId,
    messages: BTreeMap<MessageId, ChatMessage>,
    notifications: NotificationPage,
    received: Vec<Received>,
}

/// Simulated realtime server. Clones share state.
#[derive(Debug, Clone)]
pub struct SimServer {
    state: Arc<Mutex<ServerState>>,
}

impl SimServer {
    /// Server that authenticates every connection as `user_id`.
    pub fn new(user_id: UserId, username: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                user_id,
                username: username.to_string(),
                token: None,
                refuse: false,
                drop_acks: false,
                lose_reads: false,
                attempts: 0,
                next_connection: 0,
                connections: BTreeMap::new(),
                next_message_id: FIRST_MESSAGE_ID,
                messages: BTreeMap::new(),
                notifications: NotificationPage::default(),
                received: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connector that opens sockets to this server.
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(SimConnector { server: self.clone() })
    }

    /// Require `auth` to carry `token`.
    pub fn require_token(&self, token: &str) {
        self.lock().token = Some(token.to_string());
    }

    /// Refuse (or accept again) new connections.
    pub fn set_refuse(&self, refuse: bool) {
        self.lock().refuse = refuse;
    }

    /// Stop (or resume) acknowledging requests.
    pub fn set_drop_acks(&self, drop_acks: bool) {
        self.lock().drop_acks = drop_acks;
    }

    /// Lose (or deliver again) `read_messages` frames before they arrive.
    pub fn set_lose_reads(&self, lose_reads: bool) {
        self.lock().lose_reads = lose_reads;
    }

    /// Listing served to `get_notifications`.
    pub fn set_notifications(&self, page: NotificationPage) {
        self.lock().notifications = page;
    }

    /// Push an event to every open socket.
    pub fn push(&self, event: &InboundEvent) {
        match event.encode() {
            Ok(text) => self.push_raw(&text),
            Err(error) => tracing::warn!(%error, "could not encode pushed event"),
        }
    }

    /// Push raw text to every open socket, well-formed or not.
    pub fn push_raw(&self, text: &str) {
        let state = self.lock();
        for connection in state.connections.values() {
            let _ = connection.push.send(text.to_string());
        }
    }

    /// Push an event to sockets that joined `chat_id`.
    pub fn push_to_room(&self, chat_id: ChatId, event: &InboundEvent) {
        let Ok(text) = event.encode() else { return };
        broadcast(&self.lock(), chat_id, &text);
    }

    /// Close every open socket from the server side.
    pub fn drop_connections(&self) {
        self.lock().connections.clear();
    }

    /// Connection attempts so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    /// Sockets currently open.
    pub fn open_connections(&self) -> usize {
        self.lock().connections.len()
    }

    /// Rooms joined on the most recent open socket.
    pub fn rooms(&self) -> BTreeSet<ChatId> {
        self.lock().connections.values().next_back().map(|c| c.rooms.clone()).unwrap_or_default()
    }

    /// Every frame received, in arrival order.
    pub fn received(&self) -> Vec<Received> {
        self.lock().received.clone()
    }

    /// Decoded requests received, in arrival order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.lock().received.iter().filter_map(|r| r.frame.clone()).map(|f| f.request).collect()
    }

    /// Received requests of one wire type.
    pub fn requests_named(&self, op: &str) -> Vec<OutboundRequest> {
        self.requests().into_iter().filter(|r| r.op_name() == op).collect()
    }

    /// Received frames as JSON, for snapshot assertions.
    pub fn received_json(&self) -> Vec<Value> {
        self.lock()
            .received
            .iter()
            .map(|r| serde_json::from_str(&r.text).unwrap_or_else(|_| Value::String(r.text.clone())))
            .collect()
    }

    /// Register a new socket. `None` when refusing.
    fn open(&self) -> Option<(u64, mpsc::UnboundedReceiver<String>)> {
        let mut state = self.lock();
        state.attempts += 1;
        if state.refuse {
            return None;
        }
        state.next_connection += 1;
        let id = state.next_connection;
        let (push, pushed) = mpsc::unbounded_channel();
        state.connections.insert(id, Connection { push, rooms: BTreeSet::new(), authenticated: false });
        Some((id, pushed))
    }

    fn close(&self, id: u64) {
        self.lock().connections.remove(&id);
    }

    /// Handle one client frame. Returns the direct replies.
    fn handle(&self, id: u64, text: String) -> Vec<String> {
        let decoded = ClientFrame::decode(&text);
        let mut state = self.lock();
        let read_mark = decoded
            .as_ref()
            .is_ok_and(|frame| matches!(frame.request, OutboundRequest::ReadMessages { .. }));
        if read_mark && state.lose_reads {
            tracing::debug!(connection = id, "read mark lost in transit");
            return Vec::new();
        }
        state.received.push(Received { connection: id, text, frame: decoded.as_ref().ok().cloned() });
        let frame = match decoded {
            Ok(frame) => frame,
            Err(error) => {
                tracing::debug!(connection = id, %error, "server dropped malformed frame");
                return Vec::new();
            },
        };

        let mut replies = Vec::new();
        match frame.request {
            OutboundRequest::Auth { token } => {
                let accepted = state.token.as_ref().is_none_or(|expected| *expected == token);
                let response = if accepted {
                    AuthResponse {
                        status: AuthStatus::Success,
                        user_id: Some(state.user_id),
                        username: Some(state.username.clone()),
                        message: None,
                    }
                } else {
                    AuthResponse {
                        status: AuthStatus::Error,
                        user_id: None,
                        username: None,
                        message: Some("Invalid token".into()),
                    }
                };
                if let Some(connection) = state.connections.get_mut(&id) {
                    connection.authenticated = accepted;
                }
                replies.extend(InboundEvent::AuthResponse(response).encode().ok());
            },
            OutboundRequest::JoinChat { chat_id } => {
                if let Some(connection) = state.connections.get_mut(&id) {
                    connection.rooms.insert(chat_id);
                }
            },
            OutboundRequest::LeaveChat { chat_id } => {
                if let Some(connection) = state.connections.get_mut(&id) {
                    connection.rooms.remove(&chat_id);
                }
            },
            OutboundRequest::SendMessage { chat_id, content, message_type, client_ref: _ } => {
                if state.drop_acks {
                    return replies;
                }
                let message_id = state.next_message_id;
                state.next_message_id += 1;
                let message = ChatMessage {
                    id: message_id,
                    chat_id,
                    user_id: state.user_id,
                    sender: state.username.clone(),
                    profile_pic: None,
                    message_type,
                    content: Some(content),
                    media_url: None,
                    created_at: stamp(message_id),
                    updated_at: None,
                    is_deleted: false,
                    read_by: Vec::new(),
                };
                state.messages.insert(message_id, message.clone());
                let payload = AckPayload { success: true, message: Some(message.clone()), error: None };
                replies.extend(ack(frame.id, &payload));
                if let Ok(text) = InboundEvent::NewMessage(message).encode() {
                    broadcast(&state, chat_id, &text);
                }
            },
            OutboundRequest::DeleteMessage { message_id } => {
                if state.drop_acks {
                    return replies;
                }
                let user_id = state.user_id;
                let payload = match state.messages.get_mut(&message_id) {
                    Some(message) if message.user_id == user_id => {
                        message.soft_delete();
                        AckPayload { success: true, message: Some(message.clone()), error: None }
                    },
                    Some(_) => AckPayload {
                        success: false,
                        message: None,
                        error: Some("You can only delete your own messages".into()),
                    },
                    None => AckPayload {
                        success: false,
                        message: None,
                        error: Some("Message not found".into()),
                    },
                };
                replies.extend(ack(frame.id, &payload));
                if let Some(message) = payload.message.filter(|_| payload.success) {
                    let deleted = MessageDeleted { id: message.id, chat_id: message.chat_id };
                    if let Ok(text) = InboundEvent::MessageDeleted(deleted).encode() {
                        broadcast(&state, message.chat_id, &text);
                    }
                }
            },
            OutboundRequest::GetNotifications {} => {
                if !state.drop_acks {
                    replies.extend(ack(frame.id, &state.notifications));
                }
            },
            OutboundRequest::ReadMessages { .. } => {},
            OutboundRequest::Ping {} => replies.extend(InboundEvent::Pong.encode().ok()),
        }
        replies
    }
}

/// Send `text` to every authenticated socket in `chat_id`.
fn broadcast(state: &ServerState, chat_id: ChatId, text: &str) {
    let members = state.connections.values().filter(|c| c.authenticated && c.rooms.contains(&chat_id));
    for connection in members {
        let _ = connection.push.send(text.to_string());
    }
}

fn ack<T: serde::Serialize>(id: Option<u64>, body: &T) -> Option<String> {
    let id = id?;
    let data = serde_json::to_value(body).ok()?;
    Some(Ack { id, data }.encode())
}

/// [`Connector`] for a [`SimServer`].
#[derive(Debug, Clone)]
pub struct SimConnector {
    server: SimServer,
}

#[async_trait]
impl Connector for SimConnector {
    async fn connect(&self, url: &str) -> Result<ConnectedSocket, TransportError> {
        let Some((id, pushed)) = self.server.open() else {
            return Err(TransportError::Connection(format!("{url}: connection refused")));
        };
        tracing::debug!(connection = id, url, "sim socket opened");

        let (to_server_tx, to_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (from_server_tx, from_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let handle = tokio::spawn(serve(self.server.clone(), id, to_server_rx, pushed, from_server_tx));
        Ok(ConnectedSocket::new(to_server_tx, from_server_rx, handle.abort_handle()))
    }
}

/// Serve one socket until either side goes away.
///
/// The task owns the only sender towards the client, so the client sees the
/// socket close as soon as this returns or is aborted.
async fn serve(
    server: SimServer,
    id: u64,
    mut from_client: mpsc::Receiver<String>,
    mut pushed: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::Sender<String>,
) {
    let greeting = InboundEvent::Connected(ConnectedInfo {
        status: Some("connected".into()),
        timestamp: None,
    });
    if let Ok(text) = greeting.encode() {
        let _ = to_client.send(text).await;
    }

    'serve: loop {
        tokio::select! {
            inbound = from_client.recv() => {
                let Some(text) = inbound else { break };
                for reply in server.handle(id, text) {
                    if to_client.send(reply).await.is_err() {
                        break 'serve;
                    }
                }
            },
            outbound = pushed.recv() => {
                // Sender dropped: the test closed the socket
                let Some(text) = outbound else { break };
                if to_client.send(text).await.is_err() {
                    break;
                }
            },
        }
    }
    server.close(id);
    tracing::debug!(connection = id, "sim socket closed");
}
