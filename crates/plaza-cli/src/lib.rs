//! Headless console client for Plaza
//!
//! Drives the production [`plaza_app::Runtime`] from stdin: each line is a
//! command (see [`command::HELP`]) and every render is logged as a one-line
//! page summary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod console;

pub use command::{CommandError, HELP, parse};
pub use console::{ConsoleDriver, ConsoleError, summarize};
