//! Request outcomes and the futures callers wait on

use crate::error::{Error, Result};
use async_channel::{Receiver, Sender, TryRecvError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Cause given to requests made against a listener without a log stream
pub const NOT_LISTENING: &str = "Listener is not currently listening to a log file.";

/// Cause prefix given to requests pending when the log stream is lost
pub const LOG_FILE_NOT_FOUND: &str = "Log file not found!";

/// Cause given to requests pending when the listener is stopped
pub const LISTENER_STOPPED: &str = "Listener was stopped.";

/// Terminal outcome of a listen request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResult {
    /// The event was satisfied before its deadline
    Observed {
        /// Leaf patterns in the order they first matched
        events: Vec<String>,
        /// When the satisfying line was processed
        observed_at: DateTime<Utc>,
    },
    /// The deadline passed before the event was satisfied
    Expired,
    /// The listener could not serve the request
    Rejected {
        /// Why the request was rejected
        cause: String,
    },
}

impl EventResult {
    /// Create an observed result stamped with the current time
    pub fn observed(events: Vec<String>) -> Self {
        Self::Observed {
            events,
            observed_at: Utc::now(),
        }
    }

    /// Create a rejected result
    pub fn rejected(cause: impl Into<String>) -> Self {
        Self::Rejected {
            cause: cause.into(),
        }
    }

    /// Returns true if the event was observed
    pub fn is_observed(&self) -> bool {
        matches!(self, Self::Observed { .. })
    }

    /// Returns true if the request expired
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// Returns true if the request was rejected
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Observed leaf patterns; empty unless observed
    pub fn observed_events(&self) -> &[String] {
        match self {
            Self::Observed { events, .. } => events,
            _ => &[],
        }
    }

    /// Time of observation, if observed
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Observed { observed_at, .. } => Some(*observed_at),
            _ => None,
        }
    }

    /// Rejection cause, if rejected
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Rejected { cause } => Some(cause),
            _ => None,
        }
    }
}

/// Write half of a request's single-assignment result slot
#[derive(Debug)]
pub(crate) struct Resolver {
    sender: Sender<EventResult>,
}

impl Resolver {
    /// Publish the outcome; only the first call has any effect
    pub(crate) fn resolve(&self, result: EventResult) {
        // a full slot means the request was already resolved; a closed one
        // means the caller dropped its future
        let _ = self.sender.try_send(result);
        self.sender.close();
    }

    /// Whether the caller dropped its future, so nobody can see the outcome
    pub(crate) fn is_abandoned(&self) -> bool {
        self.sender.receiver_count() == 0
    }
}

/// Handle to the eventual outcome of a listen request
///
/// Returned immediately by the listener. The outcome is cached once received,
/// so every accessor can be called repeatedly.
#[derive(Debug)]
pub struct EventFuture {
    request_id: Option<u64>,
    receiver: Receiver<EventResult>,
    resolved: Option<EventResult>,
}

impl EventFuture {
    /// Create a pending future and the resolver that completes it
    pub(crate) fn pending(request_id: u64) -> (Self, Resolver) {
        let (sender, receiver) = async_channel::bounded(1);
        let future = Self {
            request_id: Some(request_id),
            receiver,
            resolved: None,
        };
        (future, Resolver { sender })
    }

    /// Create a future that is already complete
    pub(crate) fn ready(result: EventResult) -> Self {
        let (_, receiver) = async_channel::bounded(1);
        Self {
            request_id: None,
            receiver,
            resolved: Some(result),
        }
    }

    /// Registry id of the request, if one was registered
    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    /// Check for an outcome without blocking
    pub fn is_done(&mut self) -> bool {
        if self.resolved.is_some() {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.resolved = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                self.resolved = Some(abandoned());
                true
            }
        }
    }

    /// Outcome if already known, without blocking
    pub fn try_get(&mut self) -> Option<EventResult> {
        if self.is_done() {
            self.resolved.clone()
        } else {
            None
        }
    }

    /// Block the calling thread until the request is terminal
    pub fn get(&mut self) -> EventResult {
        if let Some(result) = &self.resolved {
            return result.clone();
        }
        let result = self.receiver.recv_blocking().unwrap_or_else(|_| abandoned());
        self.resolved = Some(result.clone());
        result
    }

    /// Block for at most `timeout`
    ///
    /// This bounds only the caller's wait: the request keeps its own deadline
    /// and can still be collected by a later call.
    pub fn get_timeout(&mut self, timeout: Duration) -> Result<EventResult> {
        if let Some(result) = &self.resolved {
            return Ok(result.clone());
        }
        let receiver = &self.receiver;
        let outcome = smol::block_on(smol::future::or(
            async { Some(receiver.recv().await.unwrap_or_else(|_| abandoned())) },
            async {
                smol::Timer::after(timeout).await;
                None
            },
        ));
        match outcome {
            Some(result) => {
                self.resolved = Some(result.clone());
                Ok(result)
            }
            None => Err(Error::WaitTimedOut { timeout }),
        }
    }

    /// Wait asynchronously until the request is terminal
    pub async fn wait(&mut self) -> EventResult {
        if let Some(result) = &self.resolved {
            return result.clone();
        }
        let result = self.receiver.recv().await.unwrap_or_else(|_| abandoned());
        self.resolved = Some(result.clone());
        result
    }
}

/// Outcome for a request whose resolver vanished without publishing
fn abandoned() -> EventResult {
    EventResult::rejected(LISTENER_STOPPED)
}
