//! Listener configuration.
//!
//! Configuration is plain serde data so it can be embedded in a larger YAML
//! harness configuration or loaded on its own. Every field has a default, so
//! an empty document is a valid configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Placeholder substituted with a transaction hash in transaction templates
pub const HASH_PLACEHOLDER: &str = "{hash}";

/// Tuning knobs for a [`Listener`](crate::Listener)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// How long the tailer sleeps at end-of-file before polling again
    pub poll_interval_ms: u64,
    /// Delay between detecting a rotation and re-resolving the log file
    pub rotation_grace_ms: u64,
    /// Reopen attempts per detected rotation before the stream is failed
    pub rotation_attempts: u32,
    /// Log patterns used by the prepackaged node events
    pub patterns: EventPatterns,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            rotation_grace_ms: 250,
            rotation_attempts: 1,
            patterns: EventPatterns::default(),
        }
    }
}

impl ListenerConfig {
    /// Parse a configuration from YAML and validate it
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Check that the configuration can drive a tailer
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::invalid_config("poll_interval_ms must be greater than 0"));
        }
        if self.rotation_attempts == 0 {
            return Err(Error::invalid_config("rotation_attempts must be at least 1"));
        }
        self.patterns.validate()
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Rotation grace period as a duration
    pub fn rotation_grace(&self) -> Duration {
        Duration::from_millis(self.rotation_grace_ms)
    }
}

/// Substrings the node writes to its log for well-known occurrences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EventPatterns {
    /// Written periodically while the node is healthy
    pub heartbeat: String,
    /// Written when the node's miners begin sealing blocks
    pub miners_started: String,
    /// Template for a transaction included in a block; contains `{hash}`
    pub transaction_sealed: String,
    /// Template for a transaction the node refused; contains `{hash}`
    pub transaction_rejected: String,
}

impl Default for EventPatterns {
    fn default() -> Self {
        Self {
            heartbeat: "p2p-status".to_string(),
            miners_started: "sealing new block".to_string(),
            transaction_sealed: "Transaction: {hash} was sealed into block".to_string(),
            transaction_rejected: "Transaction: {hash} was rejected".to_string(),
        }
    }
}

impl EventPatterns {
    fn validate(&self) -> Result<()> {
        for (name, pattern) in [
            ("heartbeat", &self.heartbeat),
            ("miners_started", &self.miners_started),
        ] {
            if pattern.is_empty() {
                return Err(Error::invalid_config(format!("pattern '{}' is empty", name)));
            }
        }
        for (name, template) in [
            ("transaction_sealed", &self.transaction_sealed),
            ("transaction_rejected", &self.transaction_rejected),
        ] {
            if !template.contains(HASH_PLACEHOLDER) {
                return Err(Error::invalid_config(format!(
                    "template '{}' must contain {}",
                    name, HASH_PLACEHOLDER
                )));
            }
        }
        Ok(())
    }

    /// Render a transaction template for the given hash
    pub fn render(template: &str, tx_hash: &str) -> String {
        template.replace(HASH_PLACEHOLDER, tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ListenerConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ListenerConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
poll_interval_ms: 10
patterns:
  heartbeat: "status report"
"#;
        let config = ListenerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.rotation_attempts, 1);
        assert_eq!(config.patterns.heartbeat, "status report");
        assert_eq!(
            config.patterns.miners_started,
            EventPatterns::default().miners_started
        );
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = ListenerConfig::from_yaml_str("poll_interval_ms: 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let yaml = r#"
patterns:
  transaction_sealed: "sealed"
"#;
        let err = ListenerConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("transaction_sealed"));
    }

    #[test]
    fn test_render_template() {
        let rendered = EventPatterns::render("Transaction: {hash} was rejected", "0xabc");
        assert_eq!(rendered, "Transaction: 0xabc was rejected");
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listener.yaml");
        std::fs::write(&path, "rotation_grace_ms: 5\nrotation_attempts: 3\n").unwrap();

        let config = ListenerConfig::from_file(&path).unwrap();
        assert_eq!(config.rotation_grace(), Duration::from_millis(5));
        assert_eq!(config.rotation_attempts, 3);
    }
}
