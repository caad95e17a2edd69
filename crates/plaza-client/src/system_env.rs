//! Production Environment implementation using the tokio clock and OS RNG.
//!
//! # Capabilities
//!
//! - tokio time (`tokio::time::Instant`), which follows the wall clock in
//!   production and can be paused and advanced in tests
//! - OS RNG (getrandom) for backoff jitter and idempotency keys
//! - tokio async sleep

use std::time::Duration;

use plaza_core::Environment;

/// Production environment.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without randomness every client would retry in
/// lockstep and idempotency keys would collide; RNG failure indicates an
/// OS-level problem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_secs(30)).await;
        assert!(env.now() - start >= Duration::from_secs(30));
    }

    #[test]
    fn random_bytes_fill_buffer() {
        let env = SystemEnv::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);
        assert_ne!(a, b);
    }
}
