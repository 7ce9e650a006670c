//! Pending listen requests shared between callers and the tailer

use crate::event::Event;
use crate::matcher::MatchState;
use crate::result::{EventFuture, EventResult, Resolver, NOT_LISTENING};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, trace};

/// Where a line ends in the log stream
///
/// `generation` counts the files the tailer has opened, so every line of a
/// reopened file sorts after every line of the file before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct LinePosition {
    pub(crate) generation: u64,
    pub(crate) offset: u64,
}

/// A registered, unresolved request
struct PendingRequest {
    id: u64,
    state: MatchState,
    deadline: Option<Instant>,
    /// Log length when the request was registered; lines ending at or
    /// before it were written earlier and are skipped
    start: Option<LinePosition>,
    resolver: Resolver,
}

impl PendingRequest {
    fn is_overdue(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    fn predates(&self, line_end: LinePosition) -> bool {
        self.start.is_some_and(|start| line_end <= start)
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    pending: Vec<PendingRequest>,
    closed: bool,
}

/// Counters describing what a listener has done so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Log lines fanned out to pending requests
    pub lines_dispatched: u64,
    /// Requests resolved as observed
    pub observed: u64,
    /// Requests resolved as expired
    pub expired: u64,
    /// Requests resolved as rejected
    pub rejected: u64,
    /// Requests still pending
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    lines_dispatched: AtomicU64,
    observed: AtomicU64,
    expired: AtomicU64,
    rejected: AtomicU64,
}

/// Thread-safe set of pending requests
///
/// Registration and dispatch are serialized by one lock, so a request sees
/// exactly the lines dispatched after it was registered.
#[derive(Default)]
pub(crate) struct RequestRegistry {
    state: Mutex<RegistryState>,
    counters: Counters,
}

impl RequestRegistry {
    /// Create an open, empty registry
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Create a registry that rejects every request
    pub(crate) fn closed() -> Self {
        let registry = Self::new();
        registry.lock().closed = true;
        registry
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // request resolution never panics mid-update, so a poisoned lock
        // still guards consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request for `event`, due at `deadline`
    ///
    /// `start` is evaluated under the registry lock, so no line can be
    /// dispatched between measuring the log and adding the request.
    pub(crate) fn register(
        &self,
        event: &Event,
        deadline: Option<Instant>,
        start: impl FnOnce() -> Option<LinePosition>,
    ) -> EventFuture {
        let mut state = self.lock();
        if state.closed {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return EventFuture::ready(EventResult::rejected(NOT_LISTENING));
        }

        let id = state.next_id;
        state.next_id += 1;
        let (future, resolver) = EventFuture::pending(id);
        state.pending.push(PendingRequest {
            id,
            state: MatchState::new(event),
            deadline,
            start: start(),
            resolver,
        });
        debug!(request_id = id, %event, pending = state.pending.len(), "Registered listen request");
        future
    }

    /// Feed one log line, ending at `line_end`, to every pending request
    ///
    /// Overdue requests are expired first so a late line cannot satisfy them.
    /// Returns the number of requests observed by this line.
    pub(crate) fn dispatch_line(&self, line: &str, line_end: LinePosition) -> usize {
        let mut state = self.lock();
        self.counters.lines_dispatched.fetch_add(1, Ordering::Relaxed);
        self.expire_locked(&mut state, Instant::now());
        trace!(line, pending = state.pending.len(), "Dispatching log line");

        let mut observed = 0;
        state.pending.retain_mut(|request| {
            if request.predates(line_end) || !request.state.observe(line) {
                return true;
            }
            let events = request.state.take_observed();
            debug!(request_id = request.id, ?events, "Listen request observed");
            request.resolver.resolve(EventResult::observed(events));
            observed += 1;
            false
        });
        self.counters
            .observed
            .fetch_add(observed as u64, Ordering::Relaxed);
        observed
    }

    /// Expire every request whose deadline is at or before `now`
    pub(crate) fn sweep_expired(&self, now: Instant) -> usize {
        let mut state = self.lock();
        self.expire_locked(&mut state, now)
    }

    /// Earliest deadline among pending requests
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.lock()
            .pending
            .iter()
            .filter_map(|request| request.deadline)
            .min()
    }

    /// Expire overdue requests and forget those nobody waits for any more
    fn expire_locked(&self, state: &mut RegistryState, now: Instant) -> usize {
        state.pending.retain(|request| {
            let abandoned = request.resolver.is_abandoned();
            if abandoned {
                debug!(request_id = request.id, "Listen request abandoned by caller");
            }
            !abandoned
        });

        let before = state.pending.len();
        state.pending.retain(|request| {
            if request.is_overdue(now) {
                debug!(request_id = request.id, "Listen request expired");
                request.resolver.resolve(EventResult::Expired);
                false
            } else {
                true
            }
        });
        let expired = before - state.pending.len();
        self.counters
            .expired
            .fetch_add(expired as u64, Ordering::Relaxed);
        expired
    }

    /// Close the registry and reject everything still pending with `cause`
    pub(crate) fn reject_all(&self, cause: &str) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let rejected = state.pending.len();
        for request in state.pending.drain(..) {
            debug!(request_id = request.id, cause, "Listen request rejected");
            request.resolver.resolve(EventResult::rejected(cause));
        }
        self.counters
            .rejected
            .fetch_add(rejected as u64, Ordering::Relaxed);
        rejected
    }

    /// Whether new requests are being refused
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of pending requests
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Snapshot of the counters
    ///
    /// Taken under the lock so counts include every request already resolved.
    pub(crate) fn stats(&self) -> ListenerStats {
        let state = self.lock();
        ListenerStats {
            lines_dispatched: self.counters.lines_dispatched.load(Ordering::Relaxed),
            observed: self.counters.observed.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            pending: state.pending.len(),
        }
    }
}
