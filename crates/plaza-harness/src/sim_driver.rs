//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` stands in for a real frontend. It implements [`Driver`] so the
//! same [`plaza_app::Runtime`] orchestration code runs in production and in
//! simulation. Tests script user input through the paired [`SimHandle`] and
//! inspect every render it captured.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use plaza_app::{Driver, Intent, Session};
use tokio::sync::{mpsc, watch};

use crate::invariants::{InvariantRegistry, SessionSnapshot, Violation};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

impl From<Vec<Violation>> for SimDriverError {
    fn from(violations: Vec<Violation>) -> Self {
        let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
        Self(format!("invariant violation:\n  {}", messages.join("\n  ")))
    }
}

/// Renders and scroll restores captured by the driver.
#[derive(Debug, Default)]
struct Captured {
    frames: Vec<SessionSnapshot>,
    scroll_restores: Vec<u32>,
}

/// Simulation driver for deterministic testing.
pub struct SimDriver {
    intents: mpsc::UnboundedReceiver<Intent>,
    captured: Arc<Mutex<Captured>>,
    renders: watch::Sender<usize>,
    invariants: Option<InvariantRegistry>,
}

/// Test-side handle of a [`SimDriver`].
///
/// Dropping every handle closes input, which stops the runtime.
#[derive(Debug, Clone)]
pub struct SimHandle {
    intents: mpsc::UnboundedSender<Intent>,
    captured: Arc<Mutex<Captured>>,
    renders: watch::Receiver<usize>,
}

impl SimDriver {
    /// Create a driver and its handle.
    pub fn new() -> (Self, SimHandle) {
        let (intents_tx, intents_rx) = mpsc::unbounded_channel();
        let (renders_tx, renders_rx) = watch::channel(0);
        let captured = Arc::new(Mutex::new(Captured::default()));
        let driver = Self {
            intents: intents_rx,
            captured: Arc::clone(&captured),
            renders: renders_tx,
            invariants: None,
        };
        let handle = SimHandle { intents: intents_tx, captured, renders: renders_rx };
        (driver, handle)
    }

    /// Enable invariant checking on every render. A violation fails the
    /// render, which stops the runtime with an error.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = tokio::time::Instant;

    async fn poll_intent(&mut self) -> Result<Option<Intent>, Self::Error> {
        Ok(self.intents.recv().await)
    }

    fn render(&mut self, session: &Session<Self::Instant>) -> Result<(), Self::Error> {
        let snapshot = SessionSnapshot::capture(session);
        if let Some(registry) = &self.invariants {
            registry.check_all(&snapshot)?;
        }
        lock(&self.captured).frames.push(snapshot);
        self.renders.send_modify(|count| *count += 1);
        Ok(())
    }

    fn restore_scroll(&mut self, previous_height: u32) {
        lock(&self.captured).scroll_restores.push(previous_height);
    }
}

impl SimHandle {
    /// Queue a user intent.
    pub fn send(&self, intent: Intent) {
        if self.intents.send(intent).is_err() {
            tracing::debug!("runtime stopped; intent dropped");
        }
    }

    /// Navigate to `path`.
    pub fn navigate(&self, path: &str) {
        self.send(Intent::Navigate(path.to_string()));
    }

    /// Number of renders so far.
    pub fn render_count(&self) -> usize {
        *self.renders.borrow()
    }

    /// Most recent render.
    pub fn last_frame(&self) -> Option<SessionSnapshot> {
        lock(&self.captured).frames.last().cloned()
    }

    /// Every render so far.
    pub fn frames(&self) -> Vec<SessionSnapshot> {
        lock(&self.captured).frames.clone()
    }

    /// Previous content heights passed to scroll restores.
    pub fn scroll_restores(&self) -> Vec<u32> {
        lock(&self.captured).scroll_restores.clone()
    }

    /// Wait until a render satisfies `predicate`, or `timeout` of tokio time
    /// passes. Returns the matching frame.
    pub async fn wait_for<F>(&mut self, timeout: Duration, mut predicate: F) -> Option<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let captured = Arc::clone(&self.captured);
        let wait = self.renders.wait_for(|_| {
            lock(&captured).frames.last().is_some_and(&mut predicate)
        });
        tokio::time::timeout(timeout, wait).await.ok()?.ok()?;
        self.last_frame()
    }
}

fn lock(captured: &Mutex<Captured>) -> MutexGuard<'_, Captured> {
    captured.lock().unwrap_or_else(PoisonError::into_inner)
}
