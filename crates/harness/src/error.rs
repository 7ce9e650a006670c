//! Error types for the harness

use thiserror::Error;

/// Errors raised while driving the node and its listener
#[derive(Debug, Error)]
pub enum Error {
    /// The node process could not be managed
    #[error("Node error: {0}")]
    Node(#[from] node_process::Error),

    /// The listener could not be attached
    #[error("Listener error: {0}")]
    Listener(#[from] log_listener::Error),

    /// The harness configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, Error>;
