//! Local node process management for integration tests
//!
//! Starts the node binary as a child process with its output captured in a
//! fresh log file per run, and exposes that file and the process's liveness
//! to [`log_listener`] through the [`NodeLog`](log_listener::NodeLog) trait.

#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod node;
pub mod process;

pub use command::NodeCommand;
pub use error::{Error, Result};
pub use node::{NodeConfig, NodeProcess};
pub use process::ExitStatus;
