//! Error types for the log listener

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while attaching a listener or waiting on a request
///
/// Failures of the log stream itself never surface here: they are delivered
/// to the pending requests as [`EventResult::Rejected`](crate::EventResult).
#[derive(Error, Debug)]
pub enum Error {
    /// The node is not running, so there is nothing to listen to
    #[error("node is not alive")]
    NodeNotAlive,

    /// The node did not report a log file
    #[error("node has no current log file")]
    NoLogFile,

    /// The node's log file could not be opened
    #[error("log file {path} is unavailable: {source}")]
    LogFileUnavailable {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A bounded wait on a request ended while the request was still pending
    #[error("request still pending after waiting {timeout:?}")]
    WaitTimedOut {
        /// How long the caller waited
        timeout: Duration,
    },

    /// Listener configuration is unusable
    #[error("invalid listener configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it
        reason: String,
    },

    /// Configuration could not be parsed
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a log file unavailable error
    pub fn log_file_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LogFileUnavailable {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
