//! Background tailing of the node's log file
//!
//! One [`Tailer`] runs on a dedicated thread per attached listener and owns
//! the file handle exclusively. It reads lines as the node appends them,
//! hands each complete line to the request registry, and at every
//! end-of-file checks whether the file it holds is still the node's current
//! log. A rotated, truncated or re-pointed log is reopened from its start;
//! if that fails the stream is declared lost for good and every pending
//! request is rejected.

use crate::config::ListenerConfig;
use crate::node::NodeLog;
use crate::registry::{LinePosition, RequestRegistry};
use crate::result::{LISTENER_STOPPED, LOG_FILE_NOT_FOUND};
use std::fmt;
use std::fs::{File, Metadata};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a listener's log stream stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Never attached to a log file
    Unattached,
    /// Tailing the file at `path`
    Attached {
        /// File currently being read
        path: PathBuf,
    },
    /// The log file was lost and could not be recovered
    Failed {
        /// Cause given to the rejected requests
        cause: String,
    },
    /// The listener was stopped
    Stopped,
}

impl StreamState {
    /// Whether the state can never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Failed { .. } | StreamState::Stopped)
    }
}

#[derive(Debug)]
struct Stream {
    state: StreamState,
    /// Number of reopens since attach; see [`LinePosition`]
    generation: u64,
}

/// State shared between a listener and its tailer thread
#[derive(Debug)]
pub(crate) struct StreamShared {
    stream: Mutex<Stream>,
    shutdown: AtomicBool,
}

impl StreamShared {
    pub(crate) fn new(state: StreamState) -> Self {
        Self {
            stream: Mutex::new(Stream {
                state,
                generation: 0,
            }),
            shutdown: AtomicBool::new(false),
        }
    }

    fn stream(&self) -> MutexGuard<'_, Stream> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> StreamState {
        self.stream().state.clone()
    }

    fn set_state(&self, state: StreamState) {
        self.stream().state = state;
    }

    fn reattached(&self, path: PathBuf, generation: u64) {
        let mut stream = self.stream();
        stream.state = StreamState::Attached { path };
        stream.generation = generation;
    }

    /// End of what has been written to the attached log so far
    pub(crate) fn write_position(&self) -> Option<LinePosition> {
        let stream = self.stream();
        let StreamState::Attached { path } = &stream.state else {
            return None;
        };
        let metadata = std::fs::metadata(path).ok()?;
        Some(LinePosition {
            generation: stream.generation,
            offset: metadata.len(),
        })
    }

    pub(crate) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Identity of the file behind a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
}

impl FileIdentity {
    fn of(metadata: &Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                dev: metadata.dev(),
                ino: metadata.ino(),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = metadata;
            Self {}
        }
    }
}

/// Why the current file is no longer the one to read
#[derive(Debug)]
pub(crate) enum Rotation {
    /// The node reports a different log path
    Moved(PathBuf),
    /// Nothing exists at the path any more
    Missing,
    /// A different file now lives at the path
    Replaced,
    /// The file shrank below what was already consumed
    Truncated,
    /// Reading or inspecting the file failed
    Unreadable(io::Error),
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rotation::Moved(path) => write!(f, "node moved its log to {}", path.display()),
            Rotation::Missing => write!(f, "log file disappeared"),
            Rotation::Replaced => write!(f, "log file was replaced"),
            Rotation::Truncated => write!(f, "log file was truncated"),
            Rotation::Unreadable(err) => write!(f, "log file became unreadable: {}", err),
        }
    }
}

/// Line reader over one log file
pub(crate) struct LogReader {
    path: PathBuf,
    reader: BufReader<File>,
    identity: FileIdentity,
    offset: u64,
    partial: Vec<u8>,
}

impl LogReader {
    /// Open `path`, positioned at its end or its start
    pub(crate) fn open(path: &Path, from_end: bool) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let identity = FileIdentity::of(&file.metadata()?);
        let offset = if from_end {
            file.seek(SeekFrom::End(0))?
        } else {
            0
        };
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            identity,
            offset,
            partial: Vec::new(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far, up to the end of the last complete line
    fn consumed(&self) -> u64 {
        self.offset - self.partial.len() as u64
    }

    /// Next complete line, or `None` if no complete line is available yet
    ///
    /// A trailing fragment without a newline is kept until the rest of the
    /// line is written.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.partial)?;
        self.offset += read as u64;
        if self.partial.last() != Some(&b'\n') {
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.partial);
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Check whether this file is still the node's current log
    pub(crate) fn rotation(&self, reported: Option<PathBuf>) -> Option<Rotation> {
        if let Some(reported) = reported {
            if reported != self.path {
                return Some(Rotation::Moved(reported));
            }
        }
        match std::fs::metadata(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Some(Rotation::Missing),
            Err(err) => Some(Rotation::Unreadable(err)),
            Ok(metadata) if FileIdentity::of(&metadata) != self.identity => {
                Some(Rotation::Replaced)
            }
            Ok(metadata) if metadata.len() < self.offset => Some(Rotation::Truncated),
            Ok(_) => None,
        }
    }
}

/// The tailing loop for one listener
pub(crate) struct Tailer {
    node: Arc<dyn NodeLog>,
    registry: Arc<RequestRegistry>,
    shared: Arc<StreamShared>,
    poll_interval: Duration,
    rotation_grace: Duration,
    rotation_attempts: u32,
    reader: LogReader,
    generation: u64,
}

impl Tailer {
    pub(crate) fn new(
        node: Arc<dyn NodeLog>,
        registry: Arc<RequestRegistry>,
        shared: Arc<StreamShared>,
        config: &ListenerConfig,
        reader: LogReader,
    ) -> Self {
        Self {
            node,
            registry,
            shared,
            poll_interval: config.poll_interval(),
            rotation_grace: config.rotation_grace(),
            rotation_attempts: config.rotation_attempts,
            reader,
            generation: 0,
        }
    }

    /// Tail until stopped or until the log stream is lost
    pub(crate) fn run(mut self) {
        info!(path = %self.reader.path().display(), "Log tailer started");
        loop {
            if self.shared.shutdown_requested() {
                self.finish(StreamState::Stopped, LISTENER_STOPPED);
                return;
            }

            let rotation = match self.reader.next_line() {
                Ok(Some(line)) => {
                    let line_end = LinePosition {
                        generation: self.generation,
                        offset: self.reader.consumed(),
                    };
                    self.registry.dispatch_line(&line, line_end);
                    continue;
                }
                Ok(None) => self.reader.rotation(self.node.current_log_file_path()),
                Err(err) => Some(Rotation::Unreadable(err)),
            };

            match rotation {
                Some(rotation) => {
                    if let Err(cause) = self.reattach(rotation) {
                        self.finish(StreamState::Failed { cause: cause.clone() }, &cause);
                        return;
                    }
                }
                None => self.pause(self.poll_interval),
            }
        }
    }

    /// Try to reopen the node's current log from its beginning
    fn reattach(&mut self, rotation: Rotation) -> Result<(), String> {
        info!(
            path = %self.reader.path().display(),
            %rotation,
            "Log file changed underneath the listener; reattaching"
        );

        let mut last_error = rotation.to_string();
        for attempt in 1..=self.rotation_attempts {
            self.pause(self.rotation_grace);
            if self.shared.shutdown_requested() {
                return Ok(());
            }

            let Some(path) = self.node.current_log_file_path() else {
                warn!(attempt, "Node reports no log file");
                last_error = "node reports no log file".to_string();
                continue;
            };
            match LogReader::open(&path, false) {
                Ok(reader) => {
                    info!(path = %path.display(), attempt, "Reattached to log file");
                    self.reader = reader;
                    self.generation += 1;
                    self.shared.reattached(path, self.generation);
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        attempt,
                        error = %err,
                        "Failed to reopen log file"
                    );
                    last_error = format!("{}: {}", path.display(), err);
                }
            }
        }
        Err(format!("{} ({})", LOG_FILE_NOT_FOUND, last_error))
    }

    /// Sleep up to `duration`, returning early when shutdown is requested
    ///
    /// Requests keep expiring on time while asleep: the thread wakes at the
    /// earliest pending deadline, and the listener unparks it whenever a new
    /// request is registered.
    fn pause(&self, duration: Duration) {
        let until = Instant::now().checked_add(duration);
        loop {
            let now = Instant::now();
            self.registry.sweep_expired(now);
            if self.shared.shutdown_requested() || until.is_some_and(|until| now >= until) {
                return;
            }
            match until.into_iter().chain(self.registry.next_deadline()).min() {
                Some(wake) => std::thread::park_timeout(wake.saturating_duration_since(now)),
                None => std::thread::park(),
            }
        }
    }

    fn finish(&self, state: StreamState, cause: &str) {
        match &state {
            StreamState::Failed { .. } => {
                error!(cause, "Log stream lost; rejecting pending requests")
            }
            _ => info!("Log tailer stopping"),
        }
        self.shared.set_state(state);
        let rejected = self.registry.reject_all(cause);
        debug!(rejected, "Log tailer finished");
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        // only reachable with an open registry if the loop unwound
        if !self.registry.is_closed() {
            let cause = "Log tailer terminated unexpectedly.";
            self.shared.set_state(StreamState::Failed {
                cause: cause.to_string(),
            });
            self.registry.reject_all(cause);
        }
    }
}
