//! Realtime client.
//!
//! One background task per process owns the Sans-IO machines (connection
//! manager, room tracker, dispatcher, ack correlator) and the socket. Every
//! other component reaches it through the cloneable [`RealtimeClient`] handle:
//! commands go in over an mpsc channel, replies come back on oneshots, and
//! inbound events fan out on broadcast channels.
//!
//! ```text
//!  RealtimeClient ──commands──> ┌──────────────┐ ──frames──> socket I/O task
//!  (clone per view)             │ RealtimeTask │
//!  <──events/lifecycle/status── └──────────────┘ <──link events── pump task
//! ```

use std::{fmt, sync::Arc, time::Duration};

use plaza_core::{
    ConnectionAction, ConnectionManager, ConnectionState, DeliveryError, Dispatch, Environment,
    EventDispatcher, Handler, PageContext, PendingAcks, RoomTracker,
};
use plaza_proto::{
    Ack, ChatId, ClientFrame, EventKind, InboundEvent, OutboundRequest, UserId,
    rest::NotificationPage,
};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::AbortHandle,
    time::MissedTickBehavior,
};

use crate::{config::ClientConfig, transport::Connector};

/// Connection snapshot for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Connection state
    pub state: ConnectionState,
    /// Consecutive failures since the last authentication
    pub reconnect_attempt: u32,
    /// Realtime is unavailable for the rest of this page load
    pub degraded: bool,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self { state: ConnectionState::Disconnected, reconnect_attempt: 0, degraded: false }
    }
}

/// Connection lifecycle notices.
#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    /// State transition
    StateChanged {
        /// Previous state
        from: ConnectionState,
        /// New state
        to: ConnectionState,
    },
    /// Server accepted our token
    Authenticated {
        /// Authenticated user
        user_id: Option<UserId>,
    },
    /// An open socket went away
    ConnectionLost,
    /// Unread notifications fetched after authentication
    NotificationsLoaded(NotificationPage),
    /// Reconnect budget exhausted; REST only from here on
    RealtimeUnavailable,
}

/// Callback invoked on every connection state transition.
pub type StateListener = Box<dyn FnMut(ConnectionState, ConnectionState) + Send>;

type AckReply = oneshot::Sender<Result<Ack, DeliveryError>>;

enum Command {
    Connect,
    Disconnect,
    JoinChat(ChatId),
    LeaveChat(ChatId),
    SetContext(PageContext),
    Request { request: OutboundRequest, reply: AckReply },
    Send { request: OutboundRequest, reply: oneshot::Sender<Result<(), DeliveryError>> },
    Visibility(bool),
    Online,
    OnStateChange(StateListener),
    On(EventKind, Handler),
    Off(EventKind),
}

/// Who is waiting for an ack.
enum Waiter {
    /// A [`RealtimeClient::request`] caller
    Caller(AckReply),
    /// The post-authentication notification fetch
    Notifications,
}

impl Waiter {
    fn fail(self, error: DeliveryError) {
        match self {
            Self::Caller(reply) => {
                let _ = reply.send(Err(error));
            },
            Self::Notifications => tracing::debug!(%error, "notification fetch failed"),
        }
    }
}

enum LinkEvent {
    Opened { generation: u64, outbound: mpsc::Sender<String>, socket: AbortHandle },
    OpenFailed { generation: u64, reason: String },
    Frame { generation: u64, text: String },
    Closed { generation: u64, reason: String },
}

/// The socket of one connection generation.
struct Link {
    generation: u64,
    outbound: Option<mpsc::Sender<String>>,
    socket: Option<AbortHandle>,
    pump: AbortHandle,
}

impl Link {
    fn close(self) {
        if let Some(socket) = self.socket {
            socket.abort();
        }
        self.pump.abort();
    }
}

/// Handle to the process-wide realtime connection.
///
/// Cheap to clone. The background task stops once every handle is dropped.
#[derive(Clone)]
pub struct RealtimeClient {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    events: broadcast::Sender<InboundEvent>,
    lifecycle: broadcast::Sender<Lifecycle>,
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient").field("status", &*self.status.borrow()).finish()
    }
}

impl RealtimeClient {
    /// Spawn the realtime task. Does not connect; call
    /// [`RealtimeClient::connect`].
    ///
    /// `token` is the session proof sent in the `auth` frame after every open.
    pub fn spawn<E: Environment>(
        env: E,
        connector: Arc<dyn Connector>,
        url: impl Into<String>,
        token: impl Into<String>,
        context: PageContext,
        config: &ClientConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let (lifecycle_tx, _) = broadcast::channel(config.republish_capacity.max(1));
        let dispatcher = EventDispatcher::new(config.republish_capacity);
        let events = dispatcher.republisher();

        let task = RealtimeTask {
            manager: ConnectionManager::new(env.clone(), config.connection.clone(), token),
            env,
            connector,
            url: url.into(),
            ack_timeout: config.ack_timeout,
            rooms: RoomTracker::new(context),
            dispatcher,
            pending: PendingAcks::new(),
            listeners: Vec::new(),
            status: status_tx,
            lifecycle: lifecycle_tx.clone(),
            link: None,
            link_events: link_tx,
        };
        tokio::spawn(task.run(commands_rx, link_rx, config.tick_interval));

        Self { commands: commands_tx, status: status_rx, events, lifecycle: lifecycle_tx }
    }

    /// Open the connection. Idempotent.
    pub async fn connect(&self) {
        self.command(Command::Connect).await;
    }

    /// Close the connection. No reconnect follows.
    pub async fn disconnect(&self) {
        self.command(Command::Disconnect).await;
    }

    /// Whether a socket is open (authenticated or not).
    pub fn is_connected(&self) -> bool {
        self.status.borrow().state.is_open()
    }

    /// Current connection snapshot.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watch the connection snapshot.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Register a state transition listener.
    pub async fn on_state_change<F>(&self, listener: F)
    where
        F: FnMut(ConnectionState, ConnectionState) + Send + 'static,
    {
        self.command(Command::OnStateChange(Box::new(listener))).await;
    }

    /// Register the handler for an event kind, replacing any previous one.
    pub async fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        self.command(Command::On(kind, Box::new(handler))).await;
    }

    /// Remove the handler for an event kind.
    pub async fn off(&self, kind: EventKind) {
        self.command(Command::Off(kind)).await;
    }

    /// Every inbound event, whether or not a handler owns its kind.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.events.subscribe()
    }

    /// Connection lifecycle notices.
    pub fn lifecycle(&self) -> broadcast::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// Join a chat room. Queued until authenticated.
    pub async fn join_chat(&self, chat_id: ChatId) {
        self.command(Command::JoinChat(chat_id)).await;
    }

    /// Leave a chat room.
    pub async fn leave_chat(&self, chat_id: ChatId) {
        self.command(Command::LeaveChat(chat_id)).await;
    }

    /// The user navigated. Swaps the context room.
    pub async fn set_context(&self, context: PageContext) {
        self.command(Command::SetContext(context)).await;
    }

    /// The page became visible or hidden.
    pub async fn visibility_changed(&self, visible: bool) {
        self.command(Command::Visibility(visible)).await;
    }

    /// The network came back online.
    pub async fn network_online(&self) {
        self.command(Command::Online).await;
    }

    /// Send an acknowledged request and await its ack.
    ///
    /// Fails fast with [`DeliveryError::NotConnected`] when no socket is open,
    /// with [`DeliveryError::AckTimeout`] when the ack does not arrive in
    /// time, and with [`DeliveryError::ConnectionLost`] if the socket drops
    /// first.
    pub async fn request(&self, request: OutboundRequest) -> Result<Ack, DeliveryError> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Request { request, reply }).await.is_err() {
            return Err(DeliveryError::NotConnected);
        }
        rx.await.unwrap_or(Err(DeliveryError::ConnectionLost))
    }

    /// Send an unacknowledged request. `Ok` means it was written to an open
    /// socket, not that the server processed it.
    pub async fn send(&self, request: OutboundRequest) -> Result<(), DeliveryError> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Send { request, reply }).await.is_err() {
            return Err(DeliveryError::NotConnected);
        }
        rx.await.unwrap_or(Err(DeliveryError::ConnectionLost))
    }

    async fn command(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            tracing::warn!("realtime task has stopped");
        }
    }
}

struct RealtimeTask<E: Environment> {
    env: E,
    connector: Arc<dyn Connector>,
    url: String,
    ack_timeout: Duration,
    manager: ConnectionManager<E>,
    rooms: RoomTracker,
    dispatcher: EventDispatcher,
    pending: PendingAcks<E::Instant, Waiter>,
    listeners: Vec<StateListener>,
    status: watch::Sender<ConnectionStatus>,
    lifecycle: broadcast::Sender<Lifecycle>,
    link: Option<Link>,
    link_events: mpsc::UnboundedSender<LinkEvent>,
}

impl<E: Environment> RealtimeTask<E> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
        tick_interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = link_events.recv() => self.handle_link_event(event).await,
                _ = ticker.tick() => self.handle_tick().await,
            }
        }

        tracing::debug!("all realtime handles dropped; shutting down");
        let actions = self.manager.disconnect(self.env.now());
        self.execute(actions).await;
        if let Some(link) = self.link.take() {
            link.close();
        }
    }

    async fn handle_command(&mut self, command: Command) {
        let now = self.env.now();
        match command {
            Command::Connect => {
                let actions = self.manager.connect(now);
                self.execute(actions).await;
            },
            Command::Disconnect => {
                let actions = self.manager.disconnect(now);
                self.execute(actions).await;
            },
            Command::JoinChat(chat_id) => {
                let requests = self.rooms.join_chat(chat_id);
                self.emit_all(requests).await;
            },
            Command::LeaveChat(chat_id) => {
                let requests = self.rooms.leave_chat(chat_id);
                self.emit_all(requests).await;
            },
            Command::SetContext(context) => {
                let requests = self.rooms.set_context(context);
                self.emit_all(requests).await;
            },
            Command::Request { request, reply } => self.request(request, reply).await,
            Command::Send { request, reply } => {
                let sent = self.manager.is_connected() && self.write(ClientFrame::new(request)).await;
                let _ = reply.send(if sent { Ok(()) } else { Err(DeliveryError::NotConnected) });
            },
            Command::Visibility(visible) => {
                let actions = self.manager.visibility_changed(now, visible);
                self.execute(actions).await;
            },
            Command::Online => {
                let actions = self.manager.network_online(now);
                self.execute(actions).await;
            },
            Command::OnStateChange(listener) => self.listeners.push(listener),
            Command::On(kind, handler) => {
                self.dispatcher.on(kind, handler);
            },
            Command::Off(kind) => {
                self.dispatcher.off(kind);
            },
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        let now = self.env.now();
        match event {
            LinkEvent::Opened { generation, outbound, socket } => {
                match self.link.as_mut() {
                    Some(link) if link.generation == generation => {
                        link.outbound = Some(outbound);
                        link.socket = Some(socket);
                    },
                    _ => {
                        socket.abort();
                        return;
                    },
                }
                let actions = self.manager.handle_opened(now, generation);
                self.execute(actions).await;
            },
            LinkEvent::OpenFailed { generation, reason } => {
                tracing::debug!(generation, %reason, "realtime open failed");
                let actions = self.manager.handle_open_failed(now, generation, &reason);
                self.execute(actions).await;
            },
            LinkEvent::Frame { generation, text } => {
                if !self.is_current(generation) {
                    return;
                }
                self.manager.handle_frame_received(now);
                match self.dispatcher.dispatch_text(&text) {
                    Dispatch::Event(InboundEvent::AuthResponse(response)) => {
                        let actions = self.manager.handle_auth_response(now, &response);
                        self.execute(actions).await;
                    },
                    Dispatch::Ack(ack) => self.resolve_ack(ack),
                    Dispatch::Event(_) | Dispatch::Dropped(_) => {},
                }
            },
            LinkEvent::Closed { generation, reason } => {
                if self.is_current(generation)
                    && let Some(link) = self.link.take()
                {
                    link.close();
                }
                let actions = self.manager.handle_closed(now, generation, &reason);
                self.execute(actions).await;
            },
        }
    }

    async fn handle_tick(&mut self) {
        let now = self.env.now();
        let actions = self.manager.tick(now);
        self.execute(actions).await;

        for (id, waiter) in self.pending.expire(now) {
            tracing::debug!(id, "ack timed out");
            waiter.fail(DeliveryError::AckTimeout { elapsed: self.ack_timeout });
        }
    }

    async fn execute(&mut self, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::Open { generation } => self.open(generation),
                ConnectionAction::Send(frame) => {
                    self.write(frame).await;
                },
                ConnectionAction::Close { generation, reason } => {
                    tracing::debug!(generation, %reason, "closing realtime socket");
                    if self.is_current(generation)
                        && let Some(link) = self.link.take()
                    {
                        link.close();
                    }
                },
                ConnectionAction::ScheduleReconnect { attempt, delay } => {
                    tracing::info!(attempt, ?delay, "realtime reconnect scheduled");
                },
                ConnectionAction::StateChanged { from, to } => {
                    for listener in &mut self.listeners {
                        listener(from, to);
                    }
                    self.notify(Lifecycle::StateChanged { from, to });
                },
                ConnectionAction::Authenticated { user_id } => {
                    self.notify(Lifecycle::Authenticated { user_id });
                    let requests = self.rooms.on_authenticated(user_id);
                    self.emit_all(requests).await;
                },
                ConnectionAction::ConnectionLost => {
                    self.rooms.on_connection_lost();
                    for (_, waiter) in self.pending.drain() {
                        waiter.fail(DeliveryError::ConnectionLost);
                    }
                    self.notify(Lifecycle::ConnectionLost);
                },
                ConnectionAction::RealtimeUnavailable => {
                    self.notify(Lifecycle::RealtimeUnavailable);
                },
            }
        }
        self.publish_status();
    }

    fn open(&mut self, generation: u64) {
        if let Some(stale) = self.link.take() {
            stale.close();
        }

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let events = self.link_events.clone();
        let pump = tokio::spawn(async move {
            let socket = match connector.connect(&url).await {
                Ok(socket) => socket,
                Err(error) => {
                    let _ = events.send(LinkEvent::OpenFailed { generation, reason: error.to_string() });
                    return;
                },
            };
            let (outbound, mut inbound, socket) = socket.into_parts();
            if events.send(LinkEvent::Opened { generation, outbound, socket }).is_err() {
                return;
            }
            while let Some(text) = inbound.recv().await {
                if events.send(LinkEvent::Frame { generation, text }).is_err() {
                    return;
                }
            }
            let _ = events.send(LinkEvent::Closed { generation, reason: "connection closed".into() });
        });

        self.link = Some(Link { generation, outbound: None, socket: None, pump: pump.abort_handle() });
    }

    async fn request(&mut self, request: OutboundRequest, reply: AckReply) {
        if !self.manager.is_connected() {
            let _ = reply.send(Err(DeliveryError::NotConnected));
            return;
        }
        let id = self.pending.register(self.env.now(), self.ack_timeout, Waiter::Caller(reply));
        if !self.write(ClientFrame::with_id(id, request)).await
            && let Some(waiter) = self.pending.resolve(id)
        {
            waiter.fail(DeliveryError::NotConnected);
        }
    }

    /// Send requests produced by the room tracker.
    async fn emit_all(&mut self, requests: Vec<OutboundRequest>) {
        for request in requests {
            let frame = if request.expects_ack() {
                let id =
                    self.pending.register(self.env.now(), self.ack_timeout, Waiter::Notifications);
                ClientFrame::with_id(id, request)
            } else {
                ClientFrame::new(request)
            };
            let id = frame.id;
            if !self.write(frame).await
                && let Some(id) = id
            {
                self.pending.resolve(id);
            }
        }
    }

    /// Write a frame to the current socket. `false` if there is none.
    async fn write(&mut self, frame: ClientFrame) -> bool {
        let Some(outbound) = self.link.as_ref().and_then(|link| link.outbound.clone()) else {
            tracing::debug!(op = frame.request.op_name(), "no open socket; frame not sent");
            return false;
        };
        let text = match frame.encode() {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(%error, op = frame.request.op_name(), "failed to encode frame");
                return false;
            },
        };
        outbound.send(text).await.is_ok()
    }

    fn resolve_ack(&mut self, ack: Ack) {
        match self.pending.resolve(ack.id) {
            Some(Waiter::Caller(reply)) => {
                let _ = reply.send(Ok(ack));
            },
            Some(Waiter::Notifications) => match ack.decode::<NotificationPage>() {
                Ok(page) => self.notify(Lifecycle::NotificationsLoaded(page)),
                Err(error) => tracing::warn!(%error, "malformed notification snapshot"),
            },
            None => tracing::debug!(id = ack.id, "late or unknown ack ignored"),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link.as_ref().is_some_and(|link| link.generation == generation)
    }

    fn notify(&self, notice: Lifecycle) {
        // No subscribers is not an error
        let _ = self.lifecycle.send(notice);
    }

    fn publish_status(&self) {
        let status = ConnectionStatus {
            state: self.manager.state(),
            reconnect_attempt: self.manager.reconnect_attempt(),
            degraded: self.manager.is_degraded(),
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::TransportError,
        system_env::SystemEnv,
        transport::{ConnectedSocket, Connector},
    };

    struct Refusing;

    #[async_trait]
    impl Connector for Refusing {
        async fn connect(&self, _url: &str) -> Result<ConnectedSocket, TransportError> {
            Err(TransportError::Connection("refused".into()))
        }
    }

    fn client() -> RealtimeClient {
        RealtimeClient::spawn(
            SystemEnv::new(),
            Arc::new(Refusing),
            "ws://test/ws",
            "tok",
            PageContext::Feed,
            &ClientConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn request_without_socket_fails_fast() {
        let client = client();
        let result = client.request(OutboundRequest::DeleteMessage { message_id: 1 }).await;
        assert_eq!(result.unwrap_err(), DeliveryError::NotConnected);
        assert!(!client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connections_degrade() {
        let client = client();
        let mut lifecycle = client.lifecycle();
        client.connect().await;

        loop {
            if lifecycle.recv().await.unwrap() == Lifecycle::RealtimeUnavailable {
                break;
            }
        }
        let mut status = client.watch_status();
        status.wait_for(|s| s.degraded).await.unwrap();
        assert_eq!(client.status().state, ConnectionState::Disconnected);
    }
}
