//! What the listener needs to know about the node it watches

use std::path::PathBuf;

/// A node whose log output can be listened to
///
/// The path may change between calls, for example when the node restarts or
/// rotates its log; the tailer re-resolves it whenever the file it holds stops
/// being the current one.
pub trait NodeLog: Send + Sync {
    /// Path of the log file the node is currently writing, if any
    fn current_log_file_path(&self) -> Option<PathBuf>;

    /// Whether the node process is running
    fn is_alive(&self) -> bool;
}

/// A log file written by a process the harness does not manage
///
/// Reports a fixed path and considers the writer alive as long as the path
/// exists.
#[derive(Debug, Clone)]
pub struct StaticLogFile {
    path: PathBuf,
}

impl StaticLogFile {
    /// Watch the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The watched path
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl NodeLog for StaticLogFile {
    fn current_log_file_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn is_alive(&self) -> bool {
        self.path.exists()
    }
}
