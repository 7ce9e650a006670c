//! Prepackaged events for common node occurrences

use crate::config::EventPatterns;
use crate::event::Event;

/// The node's periodic status report
pub fn heartbeat(patterns: &EventPatterns) -> Event {
    Event::atomic(patterns.heartbeat.as_str())
}

/// The node's miners have started sealing blocks
pub fn miners_started(patterns: &EventPatterns) -> Event {
    Event::atomic(patterns.miners_started.as_str())
}

/// The transaction with `tx_hash` was included in a block
pub fn transaction_sealed(patterns: &EventPatterns, tx_hash: &str) -> Event {
    Event::atomic(EventPatterns::render(&patterns.transaction_sealed, tx_hash))
}

/// The node refused the transaction with `tx_hash`
pub fn transaction_rejected(patterns: &EventPatterns, tx_hash: &str) -> Event {
    Event::atomic(EventPatterns::render(&patterns.transaction_rejected, tx_hash))
}

/// The transaction with `tx_hash` was either sealed or rejected
///
/// The observed label tells which of the two happened.
pub fn transaction_processed(patterns: &EventPatterns, tx_hash: &str) -> Event {
    Event::or(
        transaction_sealed(patterns, tx_hash),
        transaction_rejected(patterns, tx_hash),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchState;

    #[test]
    fn test_transaction_processed_reports_outcome() {
        let patterns = EventPatterns::default();
        let event = transaction_processed(&patterns, "0xfeed");

        let mut state = MatchState::new(&event);
        assert!(!state.observe("Transaction: 0xbeef was rejected"));
        assert!(state.observe("Transaction: 0xfeed was rejected: nonce too low"));
        assert_eq!(state.observed(), ["Transaction: 0xfeed was rejected"]);
    }

    #[test]
    fn test_custom_patterns() {
        let patterns = EventPatterns {
            heartbeat: "tick".to_string(),
            ..EventPatterns::default()
        };
        assert_eq!(heartbeat(&patterns), Event::atomic("tick"));
        assert_eq!(
            transaction_sealed(&patterns, "0x1"),
            Event::atomic("Transaction: 0x1 was sealed into block")
        );
    }
}
