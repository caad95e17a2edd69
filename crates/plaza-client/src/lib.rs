//! Client
//!
//! Async I/O layer for Plaza. Drives the Sans-IO machines of [`plaza_core`]
//! over a WebSocket and talks to the REST API over HTTP.
//!
//! # Components
//!
//! - [`RealtimeClient`]: handle to the process-wide realtime task (connection
//!   lifecycle, rooms, acks, event fan-out)
//! - [`Messenger`]: message send/delete over the duplex channel with one HTTP
//!   fallback, and read marks
//! - [`Api`] / [`HttpApi`]: REST client
//! - [`Connector`] / [`WsConnector`]: how realtime sockets are opened
//! - [`SystemEnv`]: production [`Environment`]
//! - [`ClientConfig`]: URLs and timings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod messenger;
pub mod realtime;
pub mod system_env;
pub mod transport;

pub use api::{Api, HttpApi};
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, TransportError};
pub use messenger::Messenger;
pub use plaza_core::Environment;
pub use realtime::{ConnectionStatus, Lifecycle, RealtimeClient, StateListener};
pub use system_env::SystemEnv;
pub use transport::{ConnectedSocket, Connector, WsConnector};
