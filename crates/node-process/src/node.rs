//! The node under test as a local child process

use crate::command::NodeCommand;
use crate::error::{Error, Result};
use crate::process::ExitStatus;
use async_process::Child;
use chrono::Utc;
use log_listener::NodeLog;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval at which `wait` polls the child
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Where and how to run the node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// The node binary and its arguments
    pub command: NodeCommand,
    /// Directory receiving one log file per node start
    pub log_dir: PathBuf,
    /// Chain database directory wiped by `reset`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// How long `stop` waits after SIGTERM before killing the node
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

impl NodeConfig {
    /// Run `command`, writing logs under `log_dir`
    pub fn new(command: NodeCommand, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            log_dir: log_dir.into(),
            data_dir: None,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }

    /// Set the directory wiped on reset
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the graceful shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Graceful shutdown timeout as a duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// A node process started by the harness
///
/// Every start writes to a new log file, so listeners attached before a
/// restart see their log disappear from under them and must be replaced.
pub struct NodeProcess {
    config: NodeConfig,
    child: Mutex<Option<Child>>,
    log_path: Mutex<Option<PathBuf>>,
}

impl NodeProcess {
    /// Create a stopped node
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            log_path: Mutex::new(None),
        }
    }

    /// The node's configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn child(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_log_path(&self, path: Option<PathBuf>) {
        *self.log_path.lock().unwrap_or_else(PoisonError::into_inner) = path;
    }

    /// Process id of the running node
    pub fn pid(&self) -> Option<u32> {
        self.child().as_ref().map(Child::id)
    }

    /// Log file of the current or most recent run
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start the node with a fresh log file and return its path
    pub fn start(&self) -> Result<PathBuf> {
        let mut child = self.child();
        if let Some(running) = child.as_mut() {
            if matches!(running.try_status(), Ok(None)) {
                return Err(Error::AlreadyRunning { pid: running.id() });
            }
        }

        std::fs::create_dir_all(&self.config.log_dir)?;
        let path = self.config.log_dir.join(format!(
            "node-{}.log",
            Utc::now().format("%Y%m%d-%H%M%S%.3f")
        ));
        let log = OpenOptions::new().create(true).append(true).open(&path)?;

        let spawned = self
            .config
            .command
            .prepare(&log)?
            .spawn()
            .map_err(|e| {
                Error::spawn_failed(format!("{}: {}", self.config.command.program, e))
            })?;

        info!(pid = spawned.id(), log = %path.display(), "Node started");
        *child = Some(spawned);
        self.set_log_path(Some(path.clone()));
        Ok(path)
    }

    /// Stop the node gracefully, killing it if it outlives the shutdown timeout
    pub async fn stop(&self) -> Result<ExitStatus> {
        let mut child = self.child().take().ok_or(Error::NotRunning)?;
        let pid = child.id();

        terminate(pid)?;
        let timeout = self.config.shutdown_timeout();
        let exited = smol::future::or(async { Some(child.status().await) }, async {
            smol::Timer::after(timeout).await;
            None
        })
        .await;

        let status = match exited {
            Some(status) => status?,
            None => {
                warn!(pid, ?timeout, "Node ignored SIGTERM; killing it");
                child.kill()?;
                child.status().await?
            }
        };
        let status = ExitStatus::from(status);
        info!(pid, ?status, "Node stopped");
        Ok(status)
    }

    /// Kill the node immediately
    pub async fn kill(&self) -> Result<ExitStatus> {
        let mut child = self.child().take().ok_or(Error::NotRunning)?;
        child.kill()?;
        let status = ExitStatus::from(child.status().await?);
        info!(pid = child.id(), ?status, "Node killed");
        Ok(status)
    }

    /// Wait for the node to exit on its own
    pub async fn wait(&self) -> Result<ExitStatus> {
        loop {
            {
                let mut guard = self.child();
                let child = guard.as_mut().ok_or(Error::NotRunning)?;
                if let Some(status) = child.try_status()? {
                    debug!(pid = child.id(), "Node exited");
                    guard.take();
                    return Ok(ExitStatus::from(status));
                }
            }
            smol::Timer::after(WAIT_POLL).await;
        }
    }

    /// Stop the node if running and delete its chain data and logs
    pub async fn reset(&self) -> Result<()> {
        if self.pid().is_some() {
            match self.stop().await {
                Ok(_) | Err(Error::NotRunning) => {}
                Err(err) => return Err(err),
            }
        }
        if let Some(data_dir) = &self.config.data_dir {
            remove_dir_if_present(data_dir)?;
        }
        remove_dir_if_present(&self.config.log_dir)?;
        self.set_log_path(None);
        info!("Node reset");
        Ok(())
    }
}

impl NodeLog for NodeProcess {
    fn current_log_file_path(&self) -> Option<PathBuf> {
        self.log_file_path()
    }

    fn is_alive(&self) -> bool {
        match self.child().as_mut() {
            Some(child) => matches!(child.try_status(), Ok(None)),
            None => false,
        }
    }
}

impl std::fmt::Debug for NodeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeProcess")
            .field("program", &self.config.command.program)
            .field("pid", &self.pid())
            .field("log_path", &self.log_file_path())
            .finish()
    }
}

fn remove_dir_if_present(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Ask the node to shut down
fn terminate(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            // already gone; the following wait reaps it
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(Error::signal_failed(15, e.to_string())),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(Error::signal_failed(-1, "graceful stop is only supported on Unix"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
command:
  program: ./aion.sh
  args: ["-n", "custom"]
log_dir: /tmp/node/log
data_dir: /tmp/node/database
"#;
        let config: NodeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.command.program, "./aion.sh");
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/node/database")));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_shutdown_timeout_saturates() {
        let config = NodeConfig::new(NodeCommand::new("true"), "/tmp/node/log")
            .with_shutdown_timeout(Duration::MAX);
        assert_eq!(config.shutdown_timeout_ms, u64::MAX);

        let config = config.with_shutdown_timeout(Duration::from_millis(1500));
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_stopped_node_is_not_alive() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeProcess::new(NodeConfig::new(NodeCommand::new("true"), dir.path()));
        assert!(!node.is_alive());
        assert_eq!(node.pid(), None);
        assert_eq!(node.current_log_file_path(), None);
    }

    #[smol_potat::test]
    async fn test_stop_without_start() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeProcess::new(NodeConfig::new(NodeCommand::new("true"), dir.path()));
        assert!(matches!(node.stop().await, Err(Error::NotRunning)));
    }
}
