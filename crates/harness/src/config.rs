//! Harness configuration file

use crate::error::{Error, Result};
use log_listener::ListenerConfig;
use node_process::NodeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything needed to run a node and listen to it
///
/// ```yaml
/// node:
///   command:
///     program: ./aion.sh
///     args: ["-n", "custom"]
///   log_dir: ./node/log
///   data_dir: ./node/database
/// listener:
///   poll_interval_ms: 20
/// log_level: debug
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessConfig {
    /// How to run the node
    pub node: NodeConfig,
    /// How to tail its log
    #[serde(default)]
    pub listener: ListenerConfig,
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HarnessConfig {
    /// Combine a node and listener configuration
    pub fn new(node: NodeConfig, listener: ListenerConfig) -> Self {
        Self {
            node,
            listener,
            log_level: default_log_level(),
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Check the configuration before anything is started
    pub fn validate(&self) -> Result<()> {
        if self.node.command.program.is_empty() {
            return Err(Error::Config("node.command.program is empty".to_string()));
        }
        self.listener.validate()?;
        Ok(())
    }
}
