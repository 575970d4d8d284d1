//! Git publisher - stages, commits and pushes the output directory
//!
//! Every command runs with the output directory as its working directory and
//! is fatal on failure. A run that generated nothing new skips the commit but
//! still pushes, so a branch that was committed locally by an earlier failed
//! run reaches the remote.

use crate::core::config::PublishTargetConfig;
use crate::core::error::PublishError;
use crate::core::step::{Step, StepPolicy, run_step};
use crate::core::traits::{CommandRunner, CommandSpec};
use crate::orchestration::environment::ActivatedEnvironment;
use crate::security::command_executor::CommandError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the version-control steps did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// A new commit was created
    pub committed: bool,
    /// The push step ran and succeeded
    pub pushed: bool,
}

/// Publishes the output directory to its remote branch
pub struct GitPublisher<'a> {
    runner: &'a dyn CommandRunner,
    output_dir: PathBuf,
    target: &'a PublishTargetConfig,
    environment: Option<&'a ActivatedEnvironment>,
}

impl<'a> GitPublisher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        output_dir: &Path,
        target: &'a PublishTargetConfig,
    ) -> Self {
        Self {
            runner,
            output_dir: output_dir.to_path_buf(),
            target,
            environment: None,
        }
    }

    /// Run git with the activated environment's variables
    pub fn with_environment(mut self, environment: &'a ActivatedEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    fn git(&self) -> CommandSpec {
        let command = CommandSpec::new("git", &self.output_dir);
        match self.environment {
            Some(environment) => environment.apply(command),
            None => command,
        }
    }

    /// `git add -A .`
    pub fn stage_command(&self) -> CommandSpec {
        self.git().args(["add", "-A", "."])
    }

    /// `git diff --cached --quiet`
    pub fn detect_changes_command(&self) -> CommandSpec {
        self.git().args(["diff", "--cached", "--quiet"])
    }

    /// `git commit -m <message>`
    pub fn commit_command(&self) -> CommandSpec {
        let command = self.git().args(["commit", "-m"]).arg(self.target.commit_message.as_str());
        if self.target.allow_empty_commit {
            command.arg("--allow-empty")
        } else {
            command
        }
    }

    /// `git push -u <remote> <branch>`
    pub fn push_command(&self) -> CommandSpec {
        self.git()
            .args(["push", "-u"])
            .arg(self.target.remote.as_str())
            .arg(self.target.branch.as_str())
    }

    pub async fn stage(&self) -> Result<(), PublishError> {
        run_step(self.runner, Step::Stage, &self.stage_command(), StepPolicy::FailFast).await?;
        Ok(())
    }

    /// Whether the index differs from `HEAD`
    ///
    /// `git diff --quiet` exits 1 for differences and 0 for none; anything
    /// else is an error.
    pub async fn has_staged_changes(&self) -> Result<bool, PublishError> {
        let command = self.detect_changes_command();
        tracing::debug!(command = %command, "Checking for staged changes");

        let status = self.runner.run(&command).await.map_err(|e| match e {
            CommandError::CommandNotAllowed(program) => {
                PublishError::CommandNotAllowed {
                    step: Step::DetectChanges,
                    program,
                }
            }
            other => PublishError::StepFailed {
                step: Step::DetectChanges,
                exit_code: None,
                message: other.to_string(),
            },
        })?;

        match status.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            Some(code) => Err(PublishError::StepFailed {
                step: Step::DetectChanges,
                exit_code: Some(code),
                message: format!("`{}` exited with status {}", command, code),
            }),
            None => Err(PublishError::StepFailed {
                step: Step::DetectChanges,
                exit_code: None,
                message: format!("`{}` was terminated by a signal", command),
            }),
        }
    }

    pub async fn commit(&self) -> Result<(), PublishError> {
        run_step(self.runner, Step::Commit, &self.commit_command(), StepPolicy::FailFast).await?;
        Ok(())
    }

    pub async fn push(&self) -> Result<(), PublishError> {
        run_step(self.runner, Step::Push, &self.push_command(), StepPolicy::FailFast).await?;
        Ok(())
    }

    /// Stage, commit when something changed, then push
    pub async fn publish(&self) -> Result<PublishOutcome, PublishError> {
        self.stage().await?;

        let committed = if self.has_staged_changes().await? || self.target.allow_empty_commit {
            self.commit().await?;
            true
        } else {
            tracing::info!(
                output_dir = %self.output_dir.display(),
                "No changes to commit"
            );
            false
        };

        self.push().await?;

        Ok(PublishOutcome {
            committed,
            pushed: true,
        })
    }
}
