//! The public subscription API
//!
//! A [`Listener`] is bound to one node's log stream for its whole life.
//! Requests are registered without blocking and resolve through the returned
//! [`EventFuture`]. Once the stream is lost or the listener stopped, every
//! further request is rejected immediately; restart the node and attach a new
//! listener to continue.

use crate::config::{EventPatterns, ListenerConfig};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::node::NodeLog;
use crate::node_events;
use crate::registry::{ListenerStats, RequestRegistry};
use crate::result::{EventFuture, LISTENER_STOPPED};
use crate::tailer::{LogReader, StreamShared, StreamState, Tailer};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{JoinHandle, Thread};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Listens to a node's log for events
pub struct Listener {
    registry: Arc<RequestRegistry>,
    shared: Arc<StreamShared>,
    patterns: EventPatterns,
    worker: Mutex<Option<JoinHandle<()>>>,
    tailer: Option<Thread>,
}

impl Listener {
    /// Attach to the node's current log file and start tailing it
    ///
    /// Only lines appended after this call are ever seen.
    pub fn attach(node: Arc<dyn NodeLog>, config: ListenerConfig) -> Result<Self> {
        config.validate()?;
        if !node.is_alive() {
            return Err(Error::NodeNotAlive);
        }
        let path = node.current_log_file_path().ok_or(Error::NoLogFile)?;
        let reader =
            LogReader::open(&path, true).map_err(|err| Error::log_file_unavailable(&path, err))?;

        let registry = Arc::new(RequestRegistry::new());
        let shared = Arc::new(StreamShared::new(StreamState::Attached {
            path: path.clone(),
        }));
        let tailer = Tailer::new(node, registry.clone(), shared.clone(), &config, reader);
        let worker = std::thread::Builder::new()
            .name("log-tailer".to_string())
            .spawn(move || tailer.run())?;

        info!(path = %path.display(), "Listener attached");
        Ok(Self {
            registry,
            shared,
            patterns: config.patterns,
            tailer: Some(worker.thread().clone()),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// A listener that was never attached; every request is rejected
    pub fn detached() -> Self {
        Self {
            registry: Arc::new(RequestRegistry::closed()),
            shared: Arc::new(StreamShared::new(StreamState::Unattached)),
            patterns: EventPatterns::default(),
            worker: Mutex::new(None),
            tailer: None,
        }
    }

    /// Listen for `event` for at most `timeout`
    ///
    /// Returns immediately. The request sees only lines that were not yet
    /// completely written to the log when this call was made.
    pub fn listen_for_event(&self, event: &Event, timeout: Duration) -> EventFuture {
        // a timeout past the end of the clock never expires
        let deadline = Instant::now().checked_add(timeout);
        let future = self.register(event, deadline);
        self.wake_tailer(deadline);
        future
    }

    /// Listen for several events, each as its own request with a shared deadline
    pub fn listen_for_events(&self, events: &[Event], timeout: Duration) -> Vec<EventFuture> {
        let deadline = Instant::now().checked_add(timeout);
        let futures: Vec<EventFuture> = events
            .iter()
            .map(|event| self.register(event, deadline))
            .collect();
        self.wake_tailer(deadline);
        futures
    }

    fn register(&self, event: &Event, deadline: Option<Instant>) -> EventFuture {
        self.registry.register(event, deadline, || self.shared.write_position())
    }

    /// Let a sleeping tailer pick up a deadline earlier than it knows about
    fn wake_tailer(&self, deadline: Option<Instant>) {
        if let (Some(tailer), Some(_)) = (&self.tailer, deadline) {
            tailer.unpark();
        }
    }

    /// Listen for the node's next heartbeat
    pub fn listen_for_heartbeat(&self, timeout: Duration) -> EventFuture {
        self.listen_for_event(&node_events::heartbeat(&self.patterns), timeout)
    }

    /// Listen for the node's miners to start sealing blocks
    pub fn listen_for_miners_to_start(&self, timeout: Duration) -> EventFuture {
        self.listen_for_event(&node_events::miners_started(&self.patterns), timeout)
    }

    /// Listen for a transaction to be sealed or rejected
    pub fn listen_for_transaction_to_be_processed(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> EventFuture {
        self.listen_for_event(
            &node_events::transaction_processed(&self.patterns, tx_hash),
            timeout,
        )
    }

    /// Listen for each of several transactions to be sealed or rejected
    pub fn listen_for_transactions_to_be_processed<S: AsRef<str>>(
        &self,
        tx_hashes: &[S],
        timeout: Duration,
    ) -> Vec<EventFuture> {
        let events: Vec<Event> = tx_hashes
            .iter()
            .map(|hash| node_events::transaction_processed(&self.patterns, hash.as_ref()))
            .collect();
        self.listen_for_events(&events, timeout)
    }

    /// Patterns used by the prepackaged events
    pub fn patterns(&self) -> &EventPatterns {
        &self.patterns
    }

    /// Current state of the log stream
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Whether requests can currently be served
    pub fn is_listening(&self) -> bool {
        matches!(self.state(), StreamState::Attached { .. }) && !self.registry.is_closed()
    }

    /// Activity counters
    pub fn stats(&self) -> ListenerStats {
        self.registry.stats()
    }

    /// Stop tailing and reject everything still pending
    ///
    /// Blocks until the tailer thread has exited. Calling it again is a no-op.
    pub fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };

        self.shared.request_shutdown();
        worker.thread().unpark();
        if worker.join().is_err() {
            warn!("Log tailer thread panicked");
        }
        // no-op unless the tailer exited without closing the registry
        self.registry.reject_all(LISTENER_STOPPED);
        info!("Listener stopped");
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::StaticLogFile;
    use crate::result::NOT_LISTENING;

    struct DeadNode;

    impl NodeLog for DeadNode {
        fn current_log_file_path(&self) -> Option<std::path::PathBuf> {
            None
        }

        fn is_alive(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_detached_listener_rejects_immediately() {
        let listener = Listener::detached();
        assert_eq!(listener.state(), StreamState::Unattached);
        assert!(!listener.is_listening());

        let mut future = listener.listen_for_heartbeat(Duration::from_secs(60));
        assert!(future.is_done());
        assert_eq!(future.get().cause(), Some(NOT_LISTENING));
    }

    #[test]
    fn test_attach_requires_live_node() {
        let err = Listener::attach(Arc::new(DeadNode), ListenerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::NodeNotAlive));
    }

    #[test]
    fn test_attach_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        std::fs::write(&path, "").unwrap();
        let config = ListenerConfig {
            poll_interval_ms: 0,
            ..ListenerConfig::default()
        };

        let err = Listener::attach(Arc::new(StaticLogFile::new(&path)), config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_stop_rejects_pending_and_later_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        std::fs::write(&path, "").unwrap();
        let listener =
            Listener::attach(Arc::new(StaticLogFile::new(&path)), ListenerConfig::default())
                .unwrap();
        assert!(listener.is_listening());

        let mut pending =
            listener.listen_for_event(&Event::atomic("never"), Duration::from_secs(60));
        listener.stop();
        listener.stop();

        assert_eq!(pending.get().cause(), Some(LISTENER_STOPPED));
        assert_eq!(listener.state(), StreamState::Stopped);
        let mut later = listener.listen_for_event(&Event::atomic("never"), Duration::from_secs(60));
        assert_eq!(later.get().cause(), Some(NOT_LISTENING));
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        std::fs::write(&path, "").unwrap();
        let listener =
            Listener::attach(Arc::new(StaticLogFile::new(&path)), ListenerConfig::default())
                .unwrap();

        let mut future = listener.listen_for_event(&Event::atomic("x"), Duration::MAX);
        assert!(!future.is_done());
        assert_eq!(listener.stats().pending, 1);
    }
}
