//! Log-event listening for node integration tests
//!
//! Tests drive a node asynchronously: they submit a transaction, start the
//! miners, or wait for the node to settle. This crate lets them wait for the
//! node to *say* that something happened, by watching its log file.
//!
//! ```no_run
//! use log_listener::{Event, Listener, ListenerConfig, StaticLogFile};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> log_listener::Result<()> {
//! let node = Arc::new(StaticLogFile::new("/var/log/node/current.log"));
//! let listener = Listener::attach(node, ListenerConfig::default())?;
//!
//! let startup = Event::or(Event::and("SSL", "CORS"), "Worker Thread Count");
//! let mut future = listener.listen_for_event(&startup, Duration::from_secs(10));
//!
//! let result = future.get();
//! if result.is_observed() {
//!     println!("saw {:?}", result.observed_events());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod matcher;
pub mod node;
pub mod node_events;
mod registry;
pub mod result;
mod tailer;

pub use config::{EventPatterns, ListenerConfig};
pub use error::{Error, Result};
pub use event::Event;
pub use listener::Listener;
pub use matcher::MatchState;
pub use node::{NodeLog, StaticLogFile};
pub use registry::ListenerStats;
pub use result::{EventFuture, EventResult, LISTENER_STOPPED, LOG_FILE_NOT_FOUND, NOT_LISTENING};
pub use tailer::StreamState;
