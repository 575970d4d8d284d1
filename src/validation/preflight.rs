//! Preflight checks - verifies the project layout a run depends on
//!
//! The workflow itself never checks these up front: a run simply fails at
//! the step that trips over a missing piece. `pages-publisher check` runs the
//! checks on demand so an operator can fix the layout before the next
//! scheduled run.
//!
//! # Example
//!
//! ```no_run
//! use pages_publisher::validation::PreflightChecker;
//! use pages_publisher::{PublishConfig, SafeCommandExecutor};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let runner = SafeCommandExecutor::new();
//! let checker = PreflightChecker::new(&runner);
//! let report = checker.check(Path::new("."), &PublishConfig::default()).await;
//!
//! for check in &report.checks {
//!     println!("{}: {}", check.name, check.message);
//! }
//! # Ok(())
//! # }
//! ```

use crate::core::config::PublishConfig;
use crate::core::traits::{CommandRunner, CommandSpec};
use serde::Serialize;
use std::path::Path;

/// Outcome of a single check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightCheck {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
}

/// Result of all checks
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub passed: bool,
    pub checks: Vec<PreflightCheck>,
}

impl PreflightReport {
    pub fn failures(&self) -> impl Iterator<Item = &PreflightCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Runs preflight checks against a project directory
pub struct PreflightChecker<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> PreflightChecker<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Run every check; later checks are skipped when their prerequisite failed
    pub async fn check(&self, project_path: &Path, config: &PublishConfig) -> PreflightReport {
        let mut checks = Vec::new();

        let project_ok = project_path.is_dir();
        checks.push(PreflightCheck {
            name: "project-directory",
            passed: project_ok,
            message: format!("{}", project_path.display()),
        });

        let script = project_path.join(&config.generation.script);
        checks.push(PreflightCheck {
            name: "generation-script",
            passed: script.is_file(),
            message: if script.is_file() {
                format!("{} found", config.generation.script)
            } else {
                format!("{} not found", script.display())
            },
        });

        let output_dir = project_path.join(&config.publish.output_dir);
        let output_ok = output_dir.is_dir();
        checks.push(PreflightCheck {
            name: "output-directory",
            passed: output_ok,
            message: if output_ok {
                format!("{} exists", config.publish.output_dir)
            } else {
                format!("{} is not a directory", output_dir.display())
            },
        });

        if output_ok {
            let in_work_tree = self
                .succeeds(
                    CommandSpec::new("git", &output_dir)
                        .args(["rev-parse", "--is-inside-work-tree"]),
                )
                .await;
            checks.push(PreflightCheck {
                name: "git-work-tree",
                passed: in_work_tree,
                message: if in_work_tree {
                    "output directory is inside a git work tree".to_string()
                } else {
                    "output directory is not inside a git work tree".to_string()
                },
            });

            if in_work_tree {
                let remote = &config.publish.remote;
                let has_remote = self
                    .succeeds(
                        CommandSpec::new("git", &output_dir)
                            .args(["remote", "get-url"])
                            .arg(remote.as_str()),
                    )
                    .await;
                checks.push(PreflightCheck {
                    name: "git-remote",
                    passed: has_remote,
                    message: if has_remote {
                        format!("remote '{}' is configured", remote)
                    } else {
                        format!("remote '{}' is not configured", remote)
                    },
                });
            }
        }

        PreflightReport {
            passed: checks.iter().all(|c| c.passed),
            checks,
        }
    }

    async fn succeeds(&self, command: CommandSpec) -> bool {
        match self.runner.run(&command).await {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!(command = %command, "Preflight command failed: {}", e);
                false
            }
        }
    }
}
