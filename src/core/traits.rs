//! Core traits and types for running the publishing workflow
//!
//! This module defines the process-spawning seam used by every step of the
//! workflow. Production code goes through
//! [`SafeCommandExecutor`](crate::security::SafeCommandExecutor); tests plug in
//! fakes that record invocations.

use crate::security::command_executor::CommandError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Command description
// ============================================================================

/// A single external process invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program name or path (e.g. `git`, `venv/bin/python`)
    pub program: String,
    /// Arguments, passed as-is without shell interpretation
    pub args: Vec<String>,
    /// Directory the process is started in
    pub working_dir: PathBuf,
    /// Extra environment variables for the child
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<(String, String)>,
    /// Variables removed from the inherited environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_remove: Vec<String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>, P: AsRef<Path>>(program: S, working_dir: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.as_ref().to_path_buf(),
            envs: Vec::new(),
            env_remove: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn env_remove<K: Into<String>>(mut self, key: K) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Program name without its directory, used for allow-list checks
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.program)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Exit status of a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

// ============================================================================
// Runner trait
// ============================================================================

/// Runs external commands to completion
///
/// Every step of the workflow blocks on the child it spawns, so
/// implementations resolve only once the process has exited.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and wait for it to exit
    ///
    /// A nonzero exit is reported through [`CommandStatus`], not as an error;
    /// errors mean the process could not be started at all.
    async fn run(&self, command: &CommandSpec) -> Result<CommandStatus, CommandError>;
}
