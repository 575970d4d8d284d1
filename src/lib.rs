//! pages-publisher - regenerates a static site and publishes it to a git branch
//!
//! The workflow provisions a virtual environment, installs the generator's
//! dependencies, runs the generator and commits and pushes the output
//! directory. See [`PublishOrchestrator`] for the entry point.
//!
//! ```no_run
//! use pages_publisher::{PublishConfig, PublishOrchestrator, SafeCommandExecutor};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), pages_publisher::PublishError> {
//! let runner = Arc::new(SafeCommandExecutor::new());
//! let mut orchestrator = PublishOrchestrator::new(".", PublishConfig::default(), runner);
//! let report = orchestrator.run().await?;
//! println!("committed: {}", report.committed());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use self::core::*;
pub use orchestration::{
    ExecutionEnvironment, FailedRun, GitPublisher, HistoryOptions, PublishOrchestrator,
    PublishOutcome, RunHistory, RunReport,
};
pub use security::{CommandError, SafeCommandExecutor, ScanReport, SecretFinding, SecretsScanner};
pub use validation::{PreflightChecker, PreflightReport};
