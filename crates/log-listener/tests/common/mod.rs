//! Common test utilities

#![allow(dead_code)]

use log_listener::{Listener, ListenerConfig, NodeLog};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Install a fmt subscriber once; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Listener settings that keep tests fast
pub fn fast_config() -> ListenerConfig {
    ListenerConfig {
        poll_interval_ms: 10,
        rotation_grace_ms: 50,
        ..ListenerConfig::default()
    }
}

/// A fake node writing to a log file in a scratch directory
///
/// The reported log path can be changed to simulate a restart.
pub struct FakeNode {
    dir: TempDir,
    path: Mutex<PathBuf>,
    alive: AtomicBool,
}

impl FakeNode {
    pub fn new() -> Arc<Self> {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("node.log");
        std::fs::write(&path, "").expect("create log file");
        Arc::new(Self {
            dir,
            path: Mutex::new(path),
            alive: AtomicBool::new(true),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_path(&self) -> PathBuf {
        self.path.lock().unwrap().clone()
    }

    /// Start reporting a different log file
    pub fn switch_log(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, "").expect("create log file");
        *self.path.lock().unwrap() = path.clone();
        path
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Append lines to the current log file
    pub fn log(&self, lines: &[&str]) {
        append_lines(&self.log_path(), lines);
    }

    pub fn attach(self: &Arc<Self>) -> Listener {
        self.attach_with(fast_config())
    }

    pub fn attach_with(self: &Arc<Self>, config: ListenerConfig) -> Listener {
        init_tracing();
        Listener::attach(self.clone(), config).expect("attach listener")
    }
}

impl NodeLog for FakeNode {
    fn current_log_file_path(&self) -> Option<PathBuf> {
        Some(self.log_path())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

pub fn append_lines(path: &Path, lines: &[&str]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open log file");
    for line in lines {
        writeln!(file, "{}", line).expect("write log line");
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Wait until the listener has consumed `count` lines in total
pub fn wait_for_lines(listener: &Listener, count: u64) {
    assert!(
        wait_until(Duration::from_secs(5), || listener.stats().lines_dispatched >= count),
        "listener consumed only {} of {} lines",
        listener.stats().lines_dispatched,
        count
    );
}
