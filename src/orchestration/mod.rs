//! Orchestration layer for the publishing workflow
//!
//! This module provides the high-level components that provision the
//! environment, run the generator and publish the output directory.

pub mod environment;
pub mod history;
pub mod orchestrator;
pub mod vcs;

// Re-export main types for convenience
pub use environment::{ActivatedEnvironment, ExecutionEnvironment, provision};
pub use history::{FailedRun, HistoryOptions, RunHistory, RunRecord, RunStatistics};
pub use orchestrator::{PublishOrchestrator, RunReport};
pub use vcs::{GitPublisher, PublishOutcome};
