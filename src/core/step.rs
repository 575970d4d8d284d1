//! Workflow steps and their failure policies
//!
//! Each external invocation of the workflow goes through [`run_step`] with an
//! explicit [`StepPolicy`]. Only the step that is handed
//! [`StepPolicy::ContinueOnError`] may swallow a failure; the policy does not
//! leak to the steps that follow.

use crate::core::error::PublishError;
use crate::core::traits::{CommandRunner, CommandSpec};
use crate::security::command_executor::CommandError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the publishing workflow that spawns an external process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    CreateEnvironment,
    InstallDependencies,
    Generate,
    Stage,
    DetectChanges,
    Commit,
    Push,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CreateEnvironment => "create-environment",
            Step::InstallDependencies => "install-dependencies",
            Step::Generate => "generate",
            Step::Stage => "stage",
            Step::DetectChanges => "detect-changes",
            Step::Commit => "commit",
            Step::Push => "push",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a step's command fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepPolicy {
    /// Abort the run with the step's error
    #[default]
    FailFast,
    /// Record the failure and let the run carry on
    ContinueOnError,
}

/// Result of a step that did not abort the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StepOutcome {
    Succeeded,
    ToleratedFailure {
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
        reason: String,
    },
}

impl StepOutcome {
    pub fn is_tolerated_failure(&self) -> bool {
        matches!(self, StepOutcome::ToleratedFailure { .. })
    }
}

/// Run one step's command and apply its failure policy
///
/// A command rejected by the runner's allow-list is always fatal: it is a
/// configuration problem, not a transient failure.
pub async fn run_step(
    runner: &dyn CommandRunner,
    step: Step,
    command: &CommandSpec,
    policy: StepPolicy,
) -> Result<StepOutcome, PublishError> {
    tracing::info!(step = %step, command = %command, "Running step");

    let (exit_code, reason) = match runner.run(command).await {
        Ok(status) if status.success() => {
            tracing::debug!(step = %step, "Step succeeded");
            return Ok(StepOutcome::Succeeded);
        }
        Ok(status) => {
            let reason = match status.code {
                Some(code) => format!("`{}` exited with status {}", command, code),
                None => format!("`{}` was terminated by a signal", command),
            };
            (status.code, reason)
        }
        Err(CommandError::CommandNotAllowed(program)) => {
            return Err(PublishError::CommandNotAllowed { step, program });
        }
        Err(e) => (None, e.to_string()),
    };

    match policy {
        StepPolicy::FailFast => {
            tracing::error!(step = %step, exit_code = ?exit_code, "{}", reason);
            Err(PublishError::StepFailed {
                step,
                exit_code,
                message: reason,
            })
        }
        StepPolicy::ContinueOnError => {
            tracing::warn!(step = %step, exit_code = ?exit_code, "{} (continuing)", reason);
            Ok(StepOutcome::ToleratedFailure { exit_code, reason })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::CommandStatus;
    use async_trait::async_trait;

    enum Reply {
        Exit(i32),
        SpawnError,
        NotAllowed,
    }

    struct FixedRunner(Reply);

    #[async_trait]
    impl CommandRunner for FixedRunner {
        async fn run(&self, command: &CommandSpec) -> Result<CommandStatus, CommandError> {
            match self.0 {
                Reply::Exit(code) => Ok(CommandStatus::from_code(code)),
                Reply::SpawnError => Err(CommandError::ExecutionFailed("not found".to_string())),
                Reply::NotAllowed => Err(CommandError::CommandNotAllowed(command.program.clone())),
            }
        }
    }

    fn pip() -> CommandSpec {
        CommandSpec::new("pip", ".").arg("install")
    }

    #[tokio::test]
    async fn test_success_under_both_policies() {
        let runner = FixedRunner(Reply::Exit(0));
        for policy in [StepPolicy::FailFast, StepPolicy::ContinueOnError] {
            let outcome = run_step(&runner, Step::InstallDependencies, &pip(), policy)
                .await
                .unwrap();
            assert_eq!(outcome, StepOutcome::Succeeded);
        }
    }

    #[tokio::test]
    async fn test_fail_fast_returns_step_error() {
        let runner = FixedRunner(Reply::Exit(2));
        let error = run_step(&runner, Step::Generate, &pip(), StepPolicy::FailFast)
            .await
            .unwrap_err();

        match error {
            PublishError::StepFailed {
                step, exit_code, ..
            } => {
                assert_eq!(step, Step::Generate);
                assert_eq!(exit_code, Some(2));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_continue_on_error_tolerates_nonzero_exit() {
        let runner = FixedRunner(Reply::Exit(1));
        let outcome = run_step(
            &runner,
            Step::InstallDependencies,
            &pip(),
            StepPolicy::ContinueOnError,
        )
        .await
        .unwrap();

        assert!(outcome.is_tolerated_failure());
        match outcome {
            StepOutcome::ToleratedFailure { exit_code, reason } => {
                assert_eq!(exit_code, Some(1));
                assert!(reason.contains("pip install"));
            }
            StepOutcome::Succeeded => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_continue_on_error_tolerates_spawn_failure() {
        let runner = FixedRunner(Reply::SpawnError);
        let outcome = run_step(
            &runner,
            Step::InstallDependencies,
            &pip(),
            StepPolicy::ContinueOnError,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            StepOutcome::ToleratedFailure {
                exit_code: None,
                reason: "Command execution failed: not found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_disallowed_command_is_fatal_even_when_tolerated() {
        let runner = FixedRunner(Reply::NotAllowed);
        let error = run_step(
            &runner,
            Step::InstallDependencies,
            &pip(),
            StepPolicy::ContinueOnError,
        )
        .await
        .unwrap_err();

        assert!(matches!(error, PublishError::CommandNotAllowed { .. }));
    }

    #[test]
    fn test_step_outcome_serialization() {
        let outcome = StepOutcome::ToleratedFailure {
            exit_code: Some(1),
            reason: "network unreachable".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"toleratedFailure\""));
        assert!(json.contains("\"exitCode\":1"));

        let json = serde_json::to_string(&StepOutcome::Succeeded).unwrap();
        assert_eq!(json, r#"{"status":"succeeded"}"#);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::DetectChanges.to_string(), "detect-changes");
        assert_eq!(Step::InstallDependencies.to_string(), "install-dependencies");
    }
}
