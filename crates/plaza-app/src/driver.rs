//! Driver trait for abstracting the frontend.
//!
//! The [`Driver`] decouples the runtime from a particular UI. Each frontend
//! (headless logger, terminal UI, simulation script) provides user input and
//! draws the session; the generic [`crate::Runtime`] does everything else.

use std::{future::Future, ops::Add, time::Duration};

use crate::{Intent, Session};

/// Frontend I/O for the runtime.
pub trait Driver: Send {
    /// Frontend error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type, matching the environment's.
    type Instant: Copy + Ord + Send + Sync + Add<Duration, Output = Self::Instant>;

    /// Wait for the next user input. `None` once input is closed, which ends
    /// the runtime.
    ///
    /// Must be cancel-safe: the runtime polls it inside `select!` and drops
    /// the future whenever another source wins.
    fn poll_intent(&mut self)
    -> impl Future<Output = Result<Option<Intent>, Self::Error>> + Send;

    /// Draw the session.
    ///
    /// # Errors
    ///
    /// Returns an error if drawing fails.
    fn render(&mut self, session: &Session<Self::Instant>) -> Result<(), Self::Error>;

    /// Older chat history was prepended: keep the reader's place by moving
    /// the scroll position down by the height the content grew.
    fn restore_scroll(&mut self, previous_height: u32);
}
