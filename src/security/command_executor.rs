//! SafeCommandExecutor: allow-listed process execution for the workflow steps
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved programs can execute
//! - **Injection prevention**: Uses `tokio::process::Command`, never a shell
//! - **Argument sanitization**: Arguments passed as Vec, never interpolated into shell strings
//! - **Working directory validation**: Validates existence before execution
//!
//! # Example
//!
//! ```rust,no_run
//! use pages_publisher::{CommandRunner, CommandSpec, SafeCommandExecutor};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let executor = SafeCommandExecutor::new();
//! let status = executor
//!     .run(&CommandSpec::new("git", ".").arg("--version"))
//!     .await?;
//! assert!(status.success());
//! # Ok(())
//! # }
//! ```

use crate::core::traits::{CommandRunner, CommandSpec, CommandStatus};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Allowed program names.
///
/// Matched against the file name of the program, so `venv/bin/python`
/// is covered by `python`.
pub const ALLOWED_COMMANDS: &[&str] = &["python", "python3", "pip", "pip3", "git", "uv"];

/// Errors that can occur while starting a command
#[derive(Error, Debug)]
pub enum CommandError {
    /// Program is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Process could not be spawned (binary not found, permission denied, ...)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Safe command executor with security controls
///
/// Children inherit stdout and stderr so the output of pip, the generator
/// and git reaches the operator unchanged. Stdin is closed.
#[derive(Debug, Clone, Default)]
pub struct SafeCommandExecutor {
    /// Program names allowed on top of [`ALLOWED_COMMANDS`]
    extra_allowed: Vec<String>,
}

impl SafeCommandExecutor {
    /// Create an executor that only accepts the built-in allow-list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an executor that also accepts the given program names
    ///
    /// # Example
    ///
    /// ```rust
    /// use pages_publisher::SafeCommandExecutor;
    ///
    /// let executor = SafeCommandExecutor::with_allowed(vec!["python3.12".to_string()]);
    /// assert!(executor.is_allowed("python3.12"));
    /// assert!(!executor.is_allowed("rm"));
    /// ```
    pub fn with_allowed(extra_allowed: Vec<String>) -> Self {
        Self { extra_allowed }
    }

    /// Whether the program name passes the allow-list
    pub fn is_allowed(&self, program_name: &str) -> bool {
        ALLOWED_COMMANDS.contains(&program_name)
            || self.extra_allowed.iter().any(|allowed| allowed == program_name)
    }

    fn validate(&self, command: &CommandSpec) -> Result<(), CommandError> {
        let name = command.program_name();
        #[cfg(target_os = "windows")]
        let name = name.strip_suffix(".exe").unwrap_or(name);

        if !self.is_allowed(name) {
            return Err(CommandError::CommandNotAllowed(command.program.clone()));
        }

        if !command.working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(
                command.working_dir.clone(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl CommandRunner for SafeCommandExecutor {
    async fn run(&self, command: &CommandSpec) -> Result<CommandStatus, CommandError> {
        self.validate(command)?;

        tracing::debug!(
            command = %command,
            cwd = %command.working_dir.display(),
            "Spawning command"
        );

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        for key in &command.env_remove {
            process.env_remove(key);
        }
        for (key, value) in &command.envs {
            process.env(key, value);
        }

        let status = process
            .status()
            .await
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command.program, e)))?;

        Ok(CommandStatus {
            code: status.code(),
        })
    }
}
