//! Sans-IO realtime core for Plaza.
//!
//! Pure state machines for the duplex realtime channel. Nothing here touches a
//! socket or a clock: methods take `now` and return actions or requests for a
//! driver to execute, which keeps every timeout and reconnect decision
//! testable with virtual time.
//!
//! # Components
//!
//! - [`ConnectionManager`]: connect, authenticate, heartbeat, reconnect with
//!   exponential backoff and jitter, degrade after the attempt cap
//! - [`RoomTracker`]: idempotent joins, pre-auth queueing, rebuild on reconnect
//! - [`PendingAcks`] / [`ReadWatermarks`]: ack correlation with deadlines and
//!   idempotent read marks
//! - [`EventDispatcher`]: one handler per event kind plus generic republish
//! - [`PageContext`]: which rooms and views the current page implies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod context;
pub mod delivery;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod rooms;

pub use connection::{
    ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, ReconnectPolicy,
};
pub use context::{PageContext, Room};
pub use delivery::{DEFAULT_ACK_TIMEOUT, PendingAcks, ReadWatermarks};
pub use dispatcher::{Dispatch, EventDispatcher, Handler};
pub use env::Environment;
pub use error::{ConnectionError, DeliveryError, ErrorCategory};
pub use rooms::{RoomOp, RoomTracker};
