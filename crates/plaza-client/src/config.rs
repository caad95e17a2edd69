//! Client configuration.

use std::time::Duration;

use plaza_core::{ConnectionConfig, DEFAULT_ACK_TIMEOUT};
use url::Url;

use crate::error::ConfigError;

/// Interval of the feed "check for new posts" poll.
pub const DEFAULT_FEED_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Interval at which the realtime task drives timers.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Path of the realtime endpoint relative to the server root.
pub const DEFAULT_REALTIME_PATH: &str = "ws";

/// Configuration for [`crate::RealtimeClient`] and [`crate::HttpApi`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Server root, e.g. `https://plaza.example`
    pub base_url: String,
    /// Realtime endpoint. Derived from `base_url` when `None`.
    pub realtime_url: Option<String>,
    /// Time allowed for a duplex acknowledgement
    pub ack_timeout: Duration,
    /// Reconnect, heartbeat and timeout policy
    pub connection: ConnectionConfig,
    /// Feed poll interval
    pub feed_poll_interval: Duration,
    /// Timer resolution of the realtime task
    pub tick_interval: Duration,
    /// Capacity of the command channel into the realtime task
    pub command_buffer: usize,
    /// Events buffered per slow subscriber
    pub republish_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            realtime_url: None,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            connection: ConnectionConfig::default(),
            feed_poll_interval: DEFAULT_FEED_POLL_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            command_buffer: 64,
            republish_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Configuration for a server root with default timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Parsed server root.
    pub fn base(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Realtime endpoint: the explicit URL, or `base_url` with a `ws`/`wss`
    /// scheme and the default realtime path.
    pub fn realtime(&self) -> Result<Url, ConfigError> {
        if let Some(explicit) = &self.realtime_url {
            let url = Url::parse(explicit)
                .map_err(|e| ConfigError::InvalidUrl(format!("{explicit}: {e}")))?;
            return match url.scheme() {
                "ws" | "wss" => Ok(url),
                other => Err(ConfigError::UnsupportedScheme(other.to_string())),
            };
        }

        let mut url = self.base()?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ConfigError::UnsupportedScheme(scheme.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ConfigError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(DEFAULT_REALTIME_PATH);
        Ok(url)
    }
}
