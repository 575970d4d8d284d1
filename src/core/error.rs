//! Error handling for the publishing workflow
//!
//! This module provides error types with recovery guidance using the
//! thiserror crate for ergonomic error handling.

use crate::core::step::Step;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the publishing workflow
#[derive(Error, Debug)]
pub enum PublishError {
    // Step errors
    #[error("[{step}] step failed: {message}")]
    StepFailed {
        step: Step,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("[{step}] command is not allowed: {program}")]
    CommandNotAllowed { step: Step, program: String },

    // Environment errors
    #[error("failed to remove stale environment at {path}: {message}")]
    EnvironmentCleanup { path: PathBuf, message: String },

    // Security errors
    #[error("{count} potential secret(s) detected in the output directory")]
    SecretsDetected { count: usize },

    #[error("failed to scan the output directory: {message}")]
    ScanFailed { message: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),

    // State errors
    #[error("failed to persist run state: {0}")]
    StateError(String),
}

impl PublishError {
    /// Step the error originated from, if it came from a step
    pub fn failed_step(&self) -> Option<Step> {
        match self {
            Self::StepFailed { step, .. } | Self::CommandNotAllowed { step, .. } => Some(*step),
            Self::EnvironmentCleanup { .. } => Some(Step::CreateEnvironment),
            _ => None,
        }
    }

    /// Process exit code the binary should terminate with
    ///
    /// A failing child's nonzero code is propagated as-is; everything else
    /// maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StepFailed {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::StepFailed {
                step: Step::CreateEnvironment,
                ..
            } => vec![
                "Check that python3 and its venv module are installed",
                "Remove the environment directory and try again",
            ],
            Self::StepFailed {
                step: Step::Generate,
                ..
            } => vec![
                "Check the generator output above",
                "Run the generation script manually inside the environment",
            ],
            Self::StepFailed {
                step: Step::Push, ..
            } => vec![
                "Check network access and credentials for the remote",
                "Pull remote changes into the output directory if the push was rejected",
            ],
            Self::StepFailed { .. } => vec!["Check the command output above"],
            Self::CommandNotAllowed { .. } => {
                vec!["Add the program to security.allowedCommands in the config file"]
            }
            Self::EnvironmentCleanup { .. } => vec![
                "Check permissions of the environment directory",
                "Switch environment.policy to persist",
            ],
            Self::SecretsDetected { .. } => vec![
                "Inspect the reported files before publishing",
                "Add false positives to security.secretsScanning.ignorePatterns",
            ],
            Self::ScanFailed { .. } => vec!["Check that the output directory is readable"],
            Self::ConfigError(_) => vec!["Run `pages-publisher check` to validate the config"],
            Self::StateError(_) => vec![
                "Check that the project directory is writable",
                "Delete .publish-state.json and try again",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::StepFailed { step, .. } => match step {
                Step::CreateEnvironment => "ENVIRONMENT_FAILED",
                Step::InstallDependencies => "INSTALL_FAILED",
                Step::Generate => "GENERATION_FAILED",
                Step::Stage => "STAGE_FAILED",
                Step::DetectChanges => "DETECT_CHANGES_FAILED",
                Step::Commit => "COMMIT_FAILED",
                Step::Push => "PUSH_FAILED",
            },
            Self::CommandNotAllowed { .. } => "COMMAND_NOT_ALLOWED",
            Self::EnvironmentCleanup { .. } => "ENVIRONMENT_CLEANUP_FAILED",
            Self::SecretsDetected { .. } => "SECRETS_DETECTED",
            Self::ScanFailed { .. } => "SCAN_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::StateError(_) => "STATE_ERROR",
        }
    }
}

impl From<std::io::Error> for PublishError {
    fn from(error: std::io::Error) -> Self {
        Self::StateError(error.to_string())
    }
}
