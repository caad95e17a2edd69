//! Deterministic simulation harness for Plaza client testing.
//!
//! In-memory implementations of every seam the client has, so the production
//! realtime task, messenger and runtime run unchanged under a paused tokio
//! clock:
//!
//! - [`SimEnv`]: virtual time and seeded randomness
//! - [`SimServer`] / [`SimConnector`]: the realtime server over channels
//! - [`MockApi`]: the REST API over in-memory collections
//! - [`SimDriver`]: a scripted frontend that captures every render
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks on session snapshots. Use [`InvariantRegistry::standard()`] and
//! [`SimDriver::with_invariants`] to check them on every render.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod mock_api;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    BadgesConsistent, ChatBadge, Invariant, InvariantRegistry, InvariantResult, NoDuplicates,
    PaneMatchesContext, PaneOrdered, SessionSnapshot, ToastsBounded, Violation,
};
pub use mock_api::{ApiCall, MockApi};
pub use sim_driver::{SimDriver, SimDriverError, SimHandle};
pub use sim_env::SimEnv;
pub use sim_server::{Received, SimConnector, SimServer};
