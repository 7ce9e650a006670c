//! Composable log events
//!
//! An [`Event`] is an immutable predicate tree over log lines. Leaves match any
//! line containing a fixed substring; inner nodes combine two sub-events with
//! AND or OR. Trees are shared freely between subscriptions: all per-request
//! evaluation state lives in [`MatchState`](crate::matcher::MatchState).

use std::fmt;
use std::sync::Arc;

/// A log event expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Matches any line containing the pattern (case-sensitive)
    Atomic(String),
    /// Satisfied once both sides are satisfied, in any order
    And(Arc<Event>, Arc<Event>),
    /// Satisfied once either side is satisfied
    Or(Arc<Event>, Arc<Event>),
}

impl Event {
    /// Create a leaf event matching lines that contain `pattern`
    pub fn atomic(pattern: impl Into<String>) -> Self {
        Event::Atomic(pattern.into())
    }

    /// Create an event satisfied when both `left` and `right` are
    pub fn and(left: impl Into<Event>, right: impl Into<Event>) -> Self {
        Event::And(Arc::new(left.into()), Arc::new(right.into()))
    }

    /// Create an event satisfied when either `left` or `right` is
    pub fn or(left: impl Into<Event>, right: impl Into<Event>) -> Self {
        Event::Or(Arc::new(left.into()), Arc::new(right.into()))
    }

    /// Combine this event with another using AND
    pub fn and_then(self, other: impl Into<Event>) -> Self {
        Event::and(self, other)
    }

    /// Combine this event with another using OR
    pub fn or_else(self, other: impl Into<Event>) -> Self {
        Event::or(self, other)
    }

    /// Leaf patterns in left-to-right traversal order, duplicates included
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns = Vec::new();
        self.collect_patterns(&mut patterns);
        patterns
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Event::Atomic(pattern) => out.push(pattern),
            Event::And(left, right) | Event::Or(left, right) => {
                left.collect_patterns(out);
                right.collect_patterns(out);
            }
        }
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            Event::Atomic(_) => 1,
            Event::And(left, right) | Event::Or(left, right) => {
                left.leaf_count() + right.leaf_count()
            }
        }
    }

    /// Whether this event is a single leaf
    pub fn is_atomic(&self) -> bool {
        matches!(self, Event::Atomic(_))
    }
}

impl From<&str> for Event {
    fn from(pattern: &str) -> Self {
        Event::atomic(pattern)
    }
}

impl From<String> for Event {
    fn from(pattern: String) -> Self {
        Event::Atomic(pattern)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Atomic(pattern) => write!(f, "{:?}", pattern),
            Event::And(left, right) => {
                write_operand(f, left)?;
                write!(f, " AND ")?;
                write_operand(f, right)
            }
            Event::Or(left, right) => {
                write_operand(f, left)?;
                write!(f, " OR ")?;
                write_operand(f, right)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, event: &Event) -> fmt::Result {
    if event.is_atomic() {
        write!(f, "{}", event)
    } else {
        write!(f, "({})", event)
    }
}
