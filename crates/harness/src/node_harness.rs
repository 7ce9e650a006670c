//! A node under test paired with a listener on its log

use crate::config::HarnessConfig;
use crate::error::Result;
use log_listener::{Listener, ListenerConfig};
use node_process::{ExitStatus, NodeProcess};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Runs one node and keeps a listener attached to its current log
///
/// A listener lives exactly as long as one node run. `start` and `restart`
/// attach a fresh listener; while the node is down `listener()` returns a
/// detached one that rejects every request.
pub struct NodeHarness {
    node: Arc<NodeProcess>,
    listener_config: ListenerConfig,
    listener: Mutex<Arc<Listener>>,
}

impl NodeHarness {
    /// Create a harness for a node that is not yet running
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            node: Arc::new(NodeProcess::new(config.node)),
            listener_config: config.listener,
            listener: Mutex::new(Arc::new(Listener::detached())),
        })
    }

    fn slot(&self) -> MutexGuard<'_, Arc<Listener>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The node process
    pub fn node(&self) -> &Arc<NodeProcess> {
        &self.node
    }

    /// The listener for the current node run
    pub fn listener(&self) -> Arc<Listener> {
        self.slot().clone()
    }

    /// Start the node and attach a listener to its new log
    pub fn start(&self) -> Result<Arc<Listener>> {
        let log_path = self.node.start()?;
        let listener = match Listener::attach(self.node.clone(), self.listener_config.clone()) {
            Ok(listener) => Arc::new(listener),
            Err(err) => {
                // leave nothing half-started behind
                let _ = smol::block_on(self.node.kill());
                return Err(err.into());
            }
        };

        let previous = std::mem::replace(&mut *self.slot(), listener.clone());
        previous.stop();
        info!(log = %log_path.display(), "Harness started node");
        Ok(listener)
    }

    /// Stop the listener, then the node
    pub async fn stop(&self) -> Result<ExitStatus> {
        self.detach();
        let status = self.node.stop().await?;
        info!(?status, "Harness stopped node");
        Ok(status)
    }

    /// Stop the node if it is running and start it again with a new listener
    pub async fn restart(&self) -> Result<Arc<Listener>> {
        if self.node.pid().is_some() {
            self.stop().await?;
        }
        self.start()
    }

    /// Stop everything and wipe the node's data and logs
    pub async fn reset(&self) -> Result<()> {
        self.detach();
        self.node.reset().await?;
        Ok(())
    }

    fn detach(&self) {
        let previous = std::mem::replace(&mut *self.slot(), Arc::new(Listener::detached()));
        previous.stop();
    }
}

impl std::fmt::Debug for NodeHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHarness")
            .field("node", &self.node)
            .field("listener", &self.listener())
            .finish()
    }
}
