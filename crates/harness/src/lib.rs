//! Node integration-test harness
//!
//! Pairs a locally started node ([`node_process`]) with a listener on its
//! log ([`log_listener`]), replacing the listener whenever the node restarts.
//!
//! # Example
//!
//! ```no_run
//! use harness::{HarnessConfig, NodeHarness};
//! use std::time::Duration;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = HarnessConfig::from_file("harness.yaml")?;
//!     harness::logging::init_logging(&config.log_level);
//!
//!     let harness = NodeHarness::new(config)?;
//!     let listener = harness.start()?;
//!     let mut miners = listener.listen_for_miners_to_start(Duration::from_secs(60));
//!     assert!(miners.get().is_observed());
//!
//!     smol::block_on(harness.stop())?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
mod node_harness;

pub use config::HarnessConfig;
pub use error::{Error, Result};
pub use node_harness::NodeHarness;

pub use log_listener::{Event, EventFuture, EventResult, Listener, ListenerConfig, NOT_LISTENING};
pub use node_process::{NodeCommand, NodeConfig, NodeProcess};
