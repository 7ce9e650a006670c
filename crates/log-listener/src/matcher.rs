//! Per-request evaluation of an [`Event`] against a stream of lines

use crate::event::Event;

/// A node of the flattened expression tree.
///
/// Nodes are stored post-order, so children always precede their parent and
/// the root is the last element.
#[derive(Debug, Clone)]
enum Node {
    Leaf { pattern: String, matched: bool },
    And(usize, usize),
    Or(usize, usize),
}

/// Mutable match state for one subscription
///
/// Leaves latch: once a leaf has matched it stays matched. Labels are recorded
/// in the order their leaves first matched, and only until the whole tree is
/// satisfied, after which the state is frozen.
#[derive(Debug, Clone)]
pub struct MatchState {
    nodes: Vec<Node>,
    satisfied: Vec<bool>,
    observed: Vec<String>,
}

impl MatchState {
    /// Build fresh, unmatched state for an event
    pub fn new(event: &Event) -> Self {
        let mut nodes = Vec::new();
        flatten(event, &mut nodes);
        let satisfied = vec![false; nodes.len()];
        Self {
            nodes,
            satisfied,
            observed: Vec::new(),
        }
    }

    /// Test every unmatched leaf against `line`
    ///
    /// Returns the patterns of the leaves that matched for the first time on
    /// this line. Satisfaction is recomputed once, after all leaves have been
    /// updated. A satisfied state ignores further lines.
    pub fn feed(&mut self, line: &str) -> Vec<String> {
        if self.is_satisfied() {
            return Vec::new();
        }

        let mut newly_matched = Vec::new();
        for node in &mut self.nodes {
            if let Node::Leaf { pattern, matched } = node {
                if !*matched && line.contains(pattern.as_str()) {
                    *matched = true;
                    newly_matched.push(pattern.clone());
                }
            }
        }

        if !newly_matched.is_empty() {
            self.recompute();
        }
        newly_matched
    }

    /// Feed a line and record its newly matched labels
    ///
    /// Returns whether the root is satisfied after this line.
    pub fn observe(&mut self, line: &str) -> bool {
        if self.is_satisfied() {
            return true;
        }
        let labels = self.feed(line);
        self.observed.extend(labels);
        self.is_satisfied()
    }

    /// Whether the whole expression is satisfied
    pub fn is_satisfied(&self) -> bool {
        self.satisfied.last().copied().unwrap_or(false)
    }

    /// Labels observed so far, in the order they first matched
    pub fn observed(&self) -> &[String] {
        &self.observed
    }

    /// Take the observed labels, leaving the list empty
    pub fn take_observed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.observed)
    }

    fn recompute(&mut self) {
        for index in 0..self.nodes.len() {
            self.satisfied[index] = match &self.nodes[index] {
                Node::Leaf { matched, .. } => *matched,
                Node::And(left, right) => self.satisfied[*left] && self.satisfied[*right],
                Node::Or(left, right) => self.satisfied[*left] || self.satisfied[*right],
            };
        }
    }
}

/// Append `event` post-order and return the index of its root
fn flatten(event: &Event, nodes: &mut Vec<Node>) -> usize {
    let node = match event {
        Event::Atomic(pattern) => Node::Leaf {
            pattern: pattern.clone(),
            matched: false,
        },
        Event::And(left, right) => {
            let left = flatten(left, nodes);
            let right = flatten(right, nodes);
            Node::And(left, right)
        }
        Event::Or(left, right) => {
            let left = flatten(left, nodes);
            let right = flatten(right, nodes);
            Node::Or(left, right)
        }
    };
    nodes.push(node);
    nodes.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSL: &str = "[main] SSL is enabled";
    const CORS: &str = "[main] CORS is disabled";
    const WORKER: &str = "[main] Worker Thread Count: 4";

    fn replay(event: &Event, lines: &[&str]) -> (bool, Vec<String>) {
        let mut state = MatchState::new(event);
        let mut satisfied = false;
        for line in lines {
            satisfied = state.observe(line);
        }
        (satisfied, state.observed().to_vec())
    }

    #[test]
    fn test_atomic_substring_match() {
        let mut state = MatchState::new(&Event::atomic("Worker Thread"));
        assert!(!state.observe("nothing here"));
        assert!(state.observe(WORKER));
        assert_eq!(state.observed(), ["Worker Thread"]);
    }

    #[test]
    fn test_atomic_match_is_case_sensitive() {
        let mut state = MatchState::new(&Event::atomic("ssl"));
        assert!(!state.observe(SSL));
        assert!(state.observed().is_empty());
    }

    #[test]
    fn test_and_is_order_independent() {
        let event = Event::and("SSL", "CORS");
        assert_eq!(replay(&event, &[SSL, CORS]).1, ["SSL", "CORS"]);
        assert_eq!(replay(&event, &[CORS, SSL]).1, ["CORS", "SSL"]);
        assert!(!replay(&event, &[SSL, SSL]).0);
    }

    #[test]
    fn test_or_satisfied_by_either_side() {
        let event = Event::or("SSL", "CORS");
        assert!(replay(&event, &[CORS]).0);
        assert!(replay(&event, &[SSL]).0);
        assert!(!replay(&event, &[WORKER]).0);
    }

    #[test]
    fn test_or_of_and_stops_after_and() {
        let event = Event::or(Event::and("SSL", "CORS"), "Worker Thread Count");
        let (satisfied, observed) = replay(&event, &[SSL, CORS, WORKER]);
        assert!(satisfied);
        assert_eq!(observed, ["SSL", "CORS"]);
    }

    #[test]
    fn test_nested_or_stops_at_first() {
        let event = Event::or(Event::or("SSL", "CORS"), "Worker Thread Count");
        let (satisfied, observed) = replay(&event, &[SSL, CORS, WORKER]);
        assert!(satisfied);
        assert_eq!(observed, ["SSL"]);
    }

    #[test]
    fn test_unsatisfied_branch_labels_are_kept() {
        let event = Event::or(
            Event::and("SSL", "I do not exist"),
            Event::and("CORS", "Worker Thread Count"),
        );
        let (satisfied, observed) = replay(&event, &[SSL, CORS, WORKER]);
        assert!(satisfied);
        assert_eq!(observed, ["SSL", "CORS", "Worker Thread Count"]);
    }

    #[test]
    fn test_one_line_matching_several_leaves() {
        let event = Event::or(Event::and("alpha", "beta"), "gamma");
        let mut state = MatchState::new(&event);
        assert!(state.observe("alpha beta gamma"));
        // every leaf matched on the same line, so all are recorded
        assert_eq!(state.observed(), ["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_duplicate_leaves_tracked_independently() {
        let event = Event::and("block", Event::or("block", "tx"));
        let mut state = MatchState::new(&event);
        assert!(state.observe("imported block 7"));
        assert_eq!(state.observed(), ["block", "block"]);
    }

    #[test]
    fn test_matches_are_sticky_and_state_freezes() {
        let event = Event::and("first", "second");
        let mut state = MatchState::new(&event);
        assert!(!state.observe("first"));
        assert!(!state.observe("unrelated"));
        assert!(state.observe("second"));

        // frozen: no more labels, even for lines that would match
        assert!(state.feed("first second").is_empty());
        assert!(state.observe("first"));
        assert_eq!(state.observed(), ["first", "second"]);
    }

    #[test]
    fn test_feed_reports_only_new_matches() {
        let event = Event::and("a", Event::and("b", "c"));
        let mut state = MatchState::new(&event);
        assert_eq!(state.feed("a"), vec!["a".to_string()]);
        assert!(state.feed("a").is_empty());
        assert_eq!(state.feed("b c"), vec!["b".to_string(), "c".to_string()]);
        assert!(state.is_satisfied());
    }

    #[test]
    fn test_take_observed() {
        let mut state = MatchState::new(&Event::atomic("x"));
        state.observe("x");
        assert_eq!(state.take_observed(), vec!["x".to_string()]);
        assert!(state.observed().is_empty());
        assert!(state.is_satisfied());
    }
}
