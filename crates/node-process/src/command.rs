//! How to launch the node binary

use async_process::{Command as AsyncCommand, Stdio};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Program, arguments and environment of the node
///
/// Unlike `async_process::Command` this is `Clone` and serializable, so the
/// same command can start the node again after every restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeCommand {
    /// The program to execute
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Working directory, if not the harness's own
    pub current_dir: Option<PathBuf>,
}

impl NodeCommand {
    /// Create a command for `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Build a process command whose stdout and stderr go to `log`
    ///
    /// The child is killed if its handle is dropped.
    pub fn prepare(&self, log: &File) -> io::Result<AsyncCommand> {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log.try_clone()?))
            .kill_on_drop(true);

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}
