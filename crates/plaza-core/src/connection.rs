//! Connection Manager state machine.
//!
//! Owns the lifecycle of the single duplex connection: open, authenticate,
//! heartbeat, and reconnect with exponential backoff. Uses the action pattern:
//! methods take time as input and return actions for the driver to execute.
//! The driver owns the socket; this type only decides.
//!
//! # State Machine
//!
//! ```text
//!                 connect()           opened          auth ok
//! ┌──────────────┐ ──────> ┌────────────┐ ─────> ┌───────────┐ ─────> ┌───────────────┐
//! │ Disconnected │         │ Connecting │        │ Connected │        │ Authenticated │
//! └──────────────┘ <────── └────────────┘        └───────────┘        └───────────────┘
//!        ↑  │       open failed / timeout              │ closed / idle        │
//!        │  └─ reconnect timer ──> Connecting          ↓                      ↓
//!        └───────────────────────────────────────── Disconnected <────────────┘
//! ```
//!
//! Abnormal closes schedule a reconnect. After `max_attempts` consecutive
//! failures the manager gives up for the rest of the page load and reports
//! [`ConnectionAction::RealtimeUnavailable`] once.

use std::{fmt, time::Duration};

use plaza_proto::{AuthResponse, ClientFrame, OutboundRequest, UserId};

use crate::{env::Environment, error::ConnectionError};

/// Base delay of the first reconnect attempt.
pub const DEFAULT_RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Upper bound on any single reconnect delay.
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Consecutive failures tolerated before realtime is declared unavailable.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Fraction of each delay that jitter may remove.
pub const DEFAULT_JITTER: f64 = 0.5;

/// Interval at which Ping frames are sent while the socket is open.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Maximum silence on an open socket before it is considered dead.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Time allowed for the transport to open.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket. A reconnect may be pending.
    Disconnected,
    /// Socket open requested, not yet established
    Connecting,
    /// Socket open, authentication pending or rejected
    Connected,
    /// Server accepted our token
    Authenticated,
}

impl ConnectionState {
    /// Whether a socket is open.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
        })
    }
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Consecutive failures before giving up
    pub max_attempts: u32,
    /// Fraction in `[0, 1]` of each delay that jitter may remove
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE,
            max_delay: DEFAULT_RECONNECT_MAX,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    ///
    /// `base * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay)
    }

    /// Delay before retry number `attempt`, with jitter drawn from `random`.
    ///
    /// The result lies in `[backoff * (1 - jitter), backoff]`, so it never
    /// exceeds `max_delay`.
    pub fn delay(&self, attempt: u32, random: u64) -> Duration {
        let backoff = self.backoff(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        // 53 high bits give a uniform f64 in [0, 1)
        let unit = (random >> 11) as f64 / (1u64 << 53) as f64;
        backoff.mul_f64(1.0 - jitter * unit)
    }
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Reconnect backoff
    pub reconnect: ReconnectPolicy,
    /// Heartbeat interval (should be < idle_timeout / 2)
    pub heartbeat_interval: Duration,
    /// Silence tolerated on an open socket
    pub idle_timeout: Duration,
    /// Time allowed for the transport to open
    pub open_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }
}

/// Actions returned by the connection state machine.
///
/// The driver executes them in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    /// Open a new socket tagged with this generation
    Open {
        /// Generation to report back in `handle_opened`/`handle_closed`
        generation: u64,
    },
    /// Send a frame on the current socket
    Send(ClientFrame),
    /// Close the socket of this generation
    Close {
        /// Generation being closed
        generation: u64,
        /// Human-readable reason
        reason: String,
    },
    /// A reconnect was scheduled; the driver keeps ticking
    ScheduleReconnect {
        /// 1-based retry number
        attempt: u32,
        /// Delay until the retry
        delay: Duration,
    },
    /// State transition, for listeners
    StateChanged {
        /// Previous state
        from: ConnectionState,
        /// New state
        to: ConnectionState,
    },
    /// Server accepted our token; room membership must be rebuilt
    Authenticated {
        /// Authenticated user
        user_id: Option<UserId>,
    },
    /// An open socket went away; pending requests and joins are void
    ConnectionLost,
    /// Reconnect budget exhausted. Emitted once.
    RealtimeUnavailable,
}

/// Connection Manager.
///
/// Pure state machine: no I/O, time passed to every method that needs it.
/// The environment is used only for jitter randomness.
pub struct ConnectionManager<E: Environment> {
    env: E,
    config: ConnectionConfig,
    token: String,
    state: ConnectionState,
    /// Incremented on every open attempt; stale transport reports are ignored
    generation: u64,
    /// Consecutive failures since the last successful authentication
    failures: u32,
    last_error: Option<ConnectionError>,
    degraded: bool,
    reconnect_at: Option<E::Instant>,
    connecting_since: Option<E::Instant>,
    last_inbound: Option<E::Instant>,
    last_heartbeat: Option<E::Instant>,
    user_id: Option<UserId>,
}

impl<E: Environment> fmt::Debug for ConnectionManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("failures", &self.failures)
            .field("degraded", &self.degraded)
            .field("reconnect_at", &self.reconnect_at)
            .finish_non_exhaustive()
    }
}

impl<E: Environment> ConnectionManager<E> {
    /// Create a manager in [`ConnectionState::Disconnected`].
    ///
    /// `token` is the session-derived proof of identity sent on every open.
    pub fn new(env: E, config: ConnectionConfig, token: impl Into<String>) -> Self {
        Self {
            env,
            config,
            token: token.into(),
            state: ConnectionState::Disconnected,
            generation: 0,
            failures: 0,
            last_error: None,
            degraded: false,
            reconnect_at: None,
            connecting_since: None,
            last_inbound: None,
            last_heartbeat: None,
            user_id: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a socket is open (authenticated or not).
    pub fn is_connected(&self) -> bool {
        self.state.is_open()
    }

    /// Whether the server accepted our token on the current socket.
    pub fn is_authenticated(&self) -> bool {
        self.state == ConnectionState::Authenticated
    }

    /// Consecutive failures since the last successful authentication.
    pub fn reconnect_attempt(&self) -> u32 {
        self.failures
    }

    /// Most recent error. Cleared on authentication.
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    /// Generation of the current (or last) socket.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the reconnect budget is exhausted for this page load.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// User id reported by the last successful authentication.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// When the pending reconnect fires, if one is scheduled.
    pub fn reconnect_at(&self) -> Option<E::Instant> {
        self.reconnect_at
    }

    /// Open the connection.
    ///
    /// No-op while connecting or connected, and once degraded. A pending
    /// reconnect is superseded by the immediate open.
    pub fn connect(&mut self, now: E::Instant) -> Vec<ConnectionAction> {
        if self.degraded {
            tracing::debug!("connect ignored: realtime unavailable for this page");
            return Vec::new();
        }
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.reconnect_at = None;
        self.begin_open(now, &mut actions);
        actions
    }

    /// Close the connection at the user's request. Never reconnects.
    pub fn disconnect(&mut self, _now: E::Instant) -> Vec<ConnectionAction> {
        self.reconnect_at = None;
        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }

        let mut actions = vec![ConnectionAction::Close {
            generation: self.generation,
            reason: "client disconnect".to_string(),
        }];
        let was_open = self.state.is_open();
        self.transition(ConnectionState::Disconnected, &mut actions);
        if was_open {
            actions.push(ConnectionAction::ConnectionLost);
        }
        self.clear_socket_timers();
        actions
    }

    /// The transport for `generation` opened. Sends the auth request.
    pub fn handle_opened(&mut self, now: E::Instant, generation: u64) -> Vec<ConnectionAction> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            tracing::debug!(generation, current = self.generation, "ignoring stale open");
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.connecting_since = None;
        self.last_inbound = Some(now);
        self.last_heartbeat = Some(now);
        self.transition(ConnectionState::Connected, &mut actions);
        actions.push(ConnectionAction::Send(ClientFrame::new(OutboundRequest::Auth {
            token: self.token.clone(),
        })));
        actions
    }

    /// Record inbound traffic on the current socket.
    pub fn handle_frame_received(&mut self, now: E::Instant) {
        if self.state.is_open() {
            self.last_inbound = Some(now);
        }
    }

    /// Apply the server's reply to our auth request.
    ///
    /// Success resets the failure counter. Rejection keeps the socket open
    /// (unauthenticated sends are still allowed) and records the error.
    pub fn handle_auth_response(
        &mut self,
        _now: E::Instant,
        response: &AuthResponse,
    ) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connected {
            tracing::debug!(state = %self.state, "ignoring auth_response");
            return Vec::new();
        }

        if !response.is_success() {
            let reason = response.message.clone().unwrap_or_else(|| "rejected".to_string());
            tracing::warn!(%reason, "realtime authentication rejected");
            self.last_error = Some(ConnectionError::AuthRejected(reason));
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.failures = 0;
        self.last_error = None;
        self.user_id = response.user_id;
        self.transition(ConnectionState::Authenticated, &mut actions);
        actions.push(ConnectionAction::Authenticated { user_id: response.user_id });
        tracing::info!(user_id = ?response.user_id, "realtime authenticated");
        actions
    }

    /// The transport for `generation` closed without the user asking.
    pub fn handle_closed(
        &mut self,
        now: E::Instant,
        generation: u64,
        reason: &str,
    ) -> Vec<ConnectionAction> {
        if generation != self.generation || self.state == ConnectionState::Disconnected {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.fail(now, ConnectionError::Closed(reason.to_string()), &mut actions);
        actions
    }

    /// The transport for `generation` could not be opened.
    pub fn handle_open_failed(
        &mut self,
        now: E::Instant,
        generation: u64,
        reason: &str,
    ) -> Vec<ConnectionAction> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.fail(now, ConnectionError::OpenFailed(reason.to_string()), &mut actions);
        actions
    }

    /// Drive timers: pending reconnect, open timeout, idle timeout, heartbeat.
    pub fn tick(&mut self, now: E::Instant) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        match self.state {
            ConnectionState::Disconnected => {
                if self.reconnect_at.is_some_and(|at| now >= at) {
                    self.reconnect_at = None;
                    tracing::debug!(attempt = self.failures, "reconnecting");
                    self.begin_open(now, &mut actions);
                }
            },
            ConnectionState::Connecting => {
                if let Some(since) = self.connecting_since {
                    let elapsed = now - since;
                    if elapsed >= self.config.open_timeout {
                        actions.push(ConnectionAction::Close {
                            generation: self.generation,
                            reason: "open timeout".to_string(),
                        });
                        self.fail(now, ConnectionError::OpenTimeout { elapsed }, &mut actions);
                    }
                }
            },
            ConnectionState::Connected | ConnectionState::Authenticated => {
                let elapsed = self.last_inbound.map_or(Duration::ZERO, |at| now - at);
                if elapsed >= self.config.idle_timeout {
                    actions.push(ConnectionAction::Close {
                        generation: self.generation,
                        reason: "idle timeout".to_string(),
                    });
                    self.fail(now, ConnectionError::IdleTimeout { elapsed }, &mut actions);
                } else if self
                    .last_heartbeat
                    .is_none_or(|at| now - at >= self.config.heartbeat_interval)
                {
                    self.last_heartbeat = Some(now);
                    actions.push(ConnectionAction::Send(ClientFrame::new(OutboundRequest::Ping {})));
                }
            },
        }

        actions
    }

    /// The page became visible or hidden.
    ///
    /// Becoming visible is a recovery signal: see [`Self::network_online`].
    pub fn visibility_changed(&mut self, now: E::Instant, visible: bool) -> Vec<ConnectionAction> {
        if visible { self.recover(now) } else { Vec::new() }
    }

    /// The network came back online.
    ///
    /// If disconnected (and not degraded), resets the failure counter and
    /// connects immediately instead of waiting for the backoff timer.
    pub fn network_online(&mut self, now: E::Instant) -> Vec<ConnectionAction> {
        self.recover(now)
    }

    fn recover(&mut self, now: E::Instant) -> Vec<ConnectionAction> {
        if self.degraded || self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        tracing::debug!(failures = self.failures, "recovery signal; reconnecting now");
        self.failures = 0;
        self.reconnect_at = None;
        let mut actions = Vec::new();
        self.begin_open(now, &mut actions);
        actions
    }

    fn begin_open(&mut self, now: E::Instant, actions: &mut Vec<ConnectionAction>) {
        self.generation += 1;
        self.connecting_since = Some(now);
        self.transition(ConnectionState::Connecting, actions);
        actions.push(ConnectionAction::Open { generation: self.generation });
    }

    fn fail(&mut self, now: E::Instant, error: ConnectionError, actions: &mut Vec<ConnectionAction>) {
        let was_open = self.state.is_open();
        tracing::debug!(%error, generation = self.generation, "connection failed");
        self.last_error = Some(error);
        self.transition(ConnectionState::Disconnected, actions);
        if was_open {
            actions.push(ConnectionAction::ConnectionLost);
        }
        self.clear_socket_timers();
        self.schedule_reconnect(now, actions);
    }

    fn schedule_reconnect(&mut self, now: E::Instant, actions: &mut Vec<ConnectionAction>) {
        self.failures += 1;
        let policy = &self.config.reconnect;

        if self.failures >= policy.max_attempts {
            self.degraded = true;
            self.reconnect_at = None;
            self.last_error = Some(ConnectionError::Unavailable { attempts: self.failures });
            tracing::warn!(attempts = self.failures, "realtime unavailable; falling back to polling");
            actions.push(ConnectionAction::RealtimeUnavailable);
            return;
        }

        let delay = policy.delay(self.failures, self.env.random_u64());
        self.reconnect_at = Some(now + delay);
        actions.push(ConnectionAction::ScheduleReconnect { attempt: self.failures, delay });
    }

    fn transition(&mut self, to: ConnectionState, actions: &mut Vec<ConnectionAction>) {
        let from = self.state;
        if from != to {
            self.state = to;
            tracing::debug!(%from, %to, "connection state");
            actions.push(ConnectionAction::StateChanged { from, to });
        }
    }

    fn clear_socket_timers(&mut self) {
        self.connecting_since = None;
        self.last_inbound = None;
        self.last_heartbeat = None;
    }
}

#[cfg(test)]
mod tests {
    use plaza_proto::AuthStatus;

    use super::*;
    use crate::env::test_env::TestEnv;

    fn manager() -> ConnectionManager<TestEnv> {
        ConnectionManager::new(TestEnv::default(), ConnectionConfig::default(), "tok")
    }

    fn at(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    fn auth_ok(user_id: UserId) -> AuthResponse {
        AuthResponse {
            status: AuthStatus::Success,
            user_id: Some(user_id),
            username: None,
            message: None,
        }
    }

    fn authenticate(m: &mut ConnectionManager<TestEnv>, now: Duration) {
        m.connect(now);
        m.handle_opened(now, m.generation());
        m.handle_auth_response(now, &auth_ok(1));
    }

    #[test]
    fn connect_opens_once() {
        let mut m = manager();
        let actions = m.connect(at(0));
        assert!(actions.contains(&ConnectionAction::Open { generation: 1 }));
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(m.connect(at(0)).is_empty());
    }

    #[test]
    fn open_sends_auth_immediately() {
        let mut m = manager();
        m.connect(at(0));
        let actions = m.handle_opened(at(0), 1);
        assert!(matches!(
            actions.as_slice(),
            [
                ConnectionAction::StateChanged { to: ConnectionState::Connected, .. },
                ConnectionAction::Send(ClientFrame {
                    request: OutboundRequest::Auth { .. },
                    ..
                })
            ]
        ));
        assert!(m.is_connected());
        assert!(!m.is_authenticated());
    }

    #[test]
    fn auth_success_authenticates() {
        let mut m = manager();
        authenticate(&mut m, at(0));
        assert!(m.is_authenticated());
        assert_eq!(m.user_id(), Some(1));
    }

    #[test]
    fn auth_rejection_keeps_socket_open() {
        let mut m = manager();
        m.connect(at(0));
        m.handle_opened(at(0), 1);
        let rejected = AuthResponse {
            status: AuthStatus::Error,
            user_id: None,
            username: None,
            message: Some("Authentication failed".into()),
        };
        assert!(m.handle_auth_response(at(0), &rejected).is_empty());
        assert_eq!(m.state(), ConnectionState::Connected);
        assert!(matches!(m.last_error(), Some(ConnectionError::AuthRejected(_))));
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut m = manager();
        m.connect(at(0));
        assert!(m.handle_opened(at(0), 99).is_empty());
        assert!(m.handle_closed(at(0), 99, "x").is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn abnormal_close_schedules_reconnect() {
        let mut m = manager();
        authenticate(&mut m, at(0));
        let actions = m.handle_closed(at(5), 1, "reset");
        assert!(actions.contains(&ConnectionAction::ConnectionLost));
        let Some(ConnectionAction::ScheduleReconnect { attempt, delay }) = actions.last() else {
            panic!("expected reconnect, got {actions:?}");
        };
        assert_eq!(*attempt, 1);
        assert!(*delay <= DEFAULT_RECONNECT_BASE);

        let due = m.reconnect_at().unwrap();
        assert!(m.tick(due - Duration::from_millis(1)).is_empty());
        assert!(m.tick(due).contains(&ConnectionAction::Open { generation: 2 }));
    }

    #[test]
    fn user_disconnect_never_reconnects() {
        let mut m = manager();
        authenticate(&mut m, at(0));
        let actions = m.disconnect(at(1));
        assert!(matches!(actions.first(), Some(ConnectionAction::Close { .. })));
        assert!(actions.contains(&ConnectionAction::ConnectionLost));
        assert_eq!(m.reconnect_at(), None);
        assert!(m.handle_closed(at(1), 1, "closed").is_empty());
        assert!(m.tick(at(1000)).is_empty());
    }

    #[test]
    fn cap_degrades_permanently() {
        let mut m = manager();
        let mut now = at(0);
        m.connect(now);
        let mut unavailable = 0;

        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            let actions = m.handle_open_failed(now, m.generation(), "refused");
            unavailable +=
                actions.iter().filter(|a| **a == ConnectionAction::RealtimeUnavailable).count();
            if let Some(due) = m.reconnect_at() {
                now = due;
                m.tick(now);
            }
        }

        assert_eq!(unavailable, 1);
        assert!(m.is_degraded());
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.reconnect_at(), None);
        assert!(m.tick(now + at(3600)).is_empty());
        assert!(m.network_online(now).is_empty());
        assert!(m.visibility_changed(now, true).is_empty());
        assert!(m.connect(now).is_empty());
    }

    #[test]
    fn recovery_signal_resets_attempts() {
        let mut m = manager();
        m.connect(at(0));
        m.handle_open_failed(at(0), 1, "refused");
        m.tick(m.reconnect_at().unwrap());
        m.handle_open_failed(at(3), 2, "refused");
        assert_eq!(m.reconnect_attempt(), 2);

        let actions = m.network_online(at(4));
        assert!(actions.contains(&ConnectionAction::Open { generation: 3 }));
        assert_eq!(m.reconnect_attempt(), 0);
        assert_eq!(m.reconnect_at(), None);
    }

    #[test]
    fn hidden_page_is_not_a_recovery_signal() {
        let mut m = manager();
        m.connect(at(0));
        m.handle_open_failed(at(0), 1, "refused");
        assert!(m.visibility_changed(at(1), false).is_empty());
    }

    #[test]
    fn authentication_resets_failures() {
        let mut m = manager();
        m.connect(at(0));
        m.handle_open_failed(at(0), 1, "refused");
        m.tick(m.reconnect_at().unwrap());
        let generation = m.generation();
        m.handle_opened(at(2), generation);
        m.handle_auth_response(at(2), &auth_ok(1));
        assert_eq!(m.reconnect_attempt(), 0);
    }

    #[test]
    fn heartbeat_and_idle_timeout() {
        let mut m = manager();
        authenticate(&mut m, at(0));

        let actions = m.tick(at(20));
        assert!(matches!(
            actions.as_slice(),
            [ConnectionAction::Send(ClientFrame { request: OutboundRequest::Ping {}, .. })]
        ));
        assert!(m.tick(at(21)).is_empty());

        m.handle_frame_received(at(30));
        assert!(!m.tick(at(89)).contains(&ConnectionAction::ConnectionLost));
        let actions = m.tick(at(90));
        assert!(matches!(actions.first(), Some(ConnectionAction::Close { .. })));
        assert!(actions.contains(&ConnectionAction::ConnectionLost));
        assert!(matches!(m.last_error(), Some(ConnectionError::IdleTimeout { .. })));
    }

    #[test]
    fn open_timeout_counts_as_failure() {
        let mut m = manager();
        m.connect(at(0));
        let actions = m.tick(DEFAULT_OPEN_TIMEOUT);
        assert!(matches!(actions.first(), Some(ConnectionAction::Close { generation: 1, .. })));
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.reconnect_attempt(), 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(10), DEFAULT_RECONNECT_MAX);
        assert_eq!(policy.backoff(u32::MAX), DEFAULT_RECONNECT_MAX);
    }

    #[test]
    fn jitter_stays_in_window() {
        let policy = ReconnectPolicy::default();
        for random in [0, 1, u64::MAX / 2, u64::MAX] {
            let delay = policy.delay(3, random);
            assert!(delay <= Duration::from_secs(4));
            assert!(delay >= Duration::from_secs(2));
        }
    }
}
