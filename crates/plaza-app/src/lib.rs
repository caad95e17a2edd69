//! Application layer for Plaza
//!
//! Pure view synchronizers and a generic runtime that ties them to the
//! realtime and REST clients, enabling deterministic simulation testing with
//! the same code that runs in production.
//!
//! # Components
//!
//! - [`views`]: per-view state (chat pane, chat list, notifications, feed,
//!   stories, members, profile) kept in sync from REST pages, pushes and
//!   mutations
//! - [`Session`]: page state machine (navigation, event routing, toasts)
//! - [`Driver`]: trait for frontend I/O abstraction
//! - [`Runtime`]: generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
mod driver;
pub mod event;
mod guard;
pub mod pagination;
mod runtime;
mod session;
mod tasks;
pub mod toast;
mod view;
pub mod views;

pub use action::AppAction;
pub use driver::Driver;
pub use event::{AppEvent, Fetched, Intent};
pub use guard::MutationGuard;
pub use pagination::{Cursor, Viewport};
pub use runtime::{Runtime, TOAST_SWEEP_INTERVAL};
pub use session::Session;
pub use tasks::PageTasks;
pub use toast::{Banner, Notice, Toast, ToastLevel, Toasts};
pub use view::{Entity, EntityList, Update, Upsert, ViewPhase};
