//! Error types for node process management

use thiserror::Error;

/// Errors raised while managing the node process
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn the node
    #[error("failed to spawn node: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// Failed to send a signal to the node
    #[error("failed to send signal {signal}: {reason}")]
    SignalFailed {
        /// The signal number that failed to send
        signal: i32,
        /// The reason for the signal failure
        reason: String,
    },

    /// The node is already running
    #[error("node is already running (pid {pid})")]
    AlreadyRunning {
        /// Process id of the running node
        pid: u32,
    },

    /// The operation needs a running node
    #[error("node is not running")]
    NotRunning,

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a signal failed error
    pub fn signal_failed(signal: i32, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            signal,
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
