//! RunHistory - Track and summarize publishing runs
//!
//! Features:
//! - Record every run, successful or not
//! - Filter records by age and outcome
//! - Calculate statistics (success rate, duration, tolerated installs)
//! - Generate a Markdown summary
//! - Persistent storage in `.pages-publisher/history.json`, capped at
//!   [`MAX_RECORDS`] records

use crate::core::error::PublishError;
use crate::core::state_machine::RunState;
use crate::core::step::StepOutcome;
use crate::orchestration::orchestrator::RunReport;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// History directory inside the project
pub const HISTORY_DIR: &str = ".pages-publisher";

/// History file inside [`HISTORY_DIR`]
pub const HISTORY_FILE: &str = "history.json";

/// Records kept by default; older ones are dropped on save
pub const MAX_RECORDS: usize = 500;

/// A single recorded run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub final_state: RunState,
    /// `None` when the run failed before installation
    pub install: Option<StepOutcome>,
    pub committed: bool,
    pub pushed: bool,
    pub dry_run: bool,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub duration: u64,
}

/// A run that ended with an error, as known to the caller
#[derive(Debug, Clone, Default)]
pub struct FailedRun<'a> {
    /// `None` when the run failed before it was assigned an id
    pub run_id: Option<&'a str>,
    pub started_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub install: Option<StepOutcome>,
    pub duration: u64,
}

/// Options for filtering records
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    pub since: Option<DateTime<Utc>>,
    pub failures_only: bool,
    pub limit: Option<usize>,
}

impl HistoryOptions {
    /// Records from the last `days` days
    pub fn last_days(days: i64) -> Self {
        Self {
            since: Some(Utc::now() - Duration::days(days)),
            ..Default::default()
        }
    }
}

/// Aggregated statistics over a set of runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub total_runs: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub success_rate: f64,
    pub average_duration: f64,
    pub tolerated_install_failures: usize,
    pub no_change_runs: usize,
    pub last_run: Option<DateTime<Utc>>,
}

/// Markdown report over the history
#[derive(Debug, Clone)]
pub struct HistoryReport {
    pub generated_at: DateTime<Utc>,
    pub statistics: RunStatistics,
    pub recent_runs: Vec<RunRecord>,
    pub markdown_summary: String,
}

/// Data file structure
#[derive(Debug, Serialize, Deserialize)]
struct HistoryDataFile {
    version: String,
    records: Vec<RunRecord>,
    last_updated: String,
}

/// Run history of one project
pub struct RunHistory {
    records: Vec<RunRecord>,
    data_file_path: PathBuf,
    max_records: usize,
}

impl RunHistory {
    /// Create a history for the project at `project_path`
    pub fn new<P: Into<PathBuf>>(project_path: P) -> Self {
        let data_file_path = project_path.into().join(HISTORY_DIR).join(HISTORY_FILE);

        Self {
            records: Vec::new(),
            data_file_path,
            max_records: MAX_RECORDS,
        }
    }

    /// Keep at most `max_records` records, oldest dropped first
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.max(1);
        self
    }

    /// Load existing records; a missing or unreadable file starts empty
    pub async fn initialize(&mut self) -> Result<(), anyhow::Error> {
        if let Err(e) = self.load_records().await {
            if self.data_file_path.exists() {
                tracing::warn!(
                    path = %self.data_file_path.display(),
                    "Ignoring unreadable history file: {:#}",
                    e
                );
            }
            self.records = Vec::new();
        }
        Ok(())
    }

    /// Record a run that completed
    pub async fn record_run(&mut self, report: &RunReport) -> Result<(), anyhow::Error> {
        self.push_record(RunRecord {
            id: report.run_id.clone(),
            timestamp: report.started_at,
            success: true,
            final_state: report.final_state,
            install: Some(report.install.clone()),
            committed: report.committed(),
            pushed: report.pushed(),
            dry_run: report.dry_run,
            error: None,
            error_code: None,
            duration: report.duration_ms,
        });
        self.save_records().await
    }

    /// Record a run that ended with `error`
    pub async fn record_failure(
        &mut self,
        run: FailedRun<'_>,
        error: &PublishError,
    ) -> Result<(), anyhow::Error> {
        let timestamp = run.started_at.unwrap_or_else(Utc::now);
        let id = run.run_id.map(str::to_string).unwrap_or_else(|| {
            format!("{}-{}", timestamp.timestamp_millis(), uuid::Uuid::new_v4())
        });

        self.push_record(RunRecord {
            id,
            timestamp,
            success: false,
            final_state: RunState::Failed,
            install: run.install,
            committed: false,
            pushed: false,
            dry_run: run.dry_run,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
            duration: run.duration,
        });
        self.save_records().await
    }

    fn push_record(&mut self, record: RunRecord) {
        self.records.push(record);
        if self.records.len() > self.max_records {
            let excess = self.records.len() - self.max_records;
            self.records.drain(..excess);
        }
    }

    /// Filtered records, most recent first
    pub fn get_records(&self, options: &HistoryOptions) -> Vec<RunRecord> {
        let mut filtered: Vec<_> = self
            .records
            .iter()
            .filter(|r| {
                if let Some(since) = options.since
                    && r.timestamp < since
                {
                    return false;
                }

                !(options.failures_only && r.success)
            })
            .cloned()
            .collect();

        filtered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = options.limit {
            filtered.truncate(limit);
        }

        filtered
    }

    /// Calculate statistics over the filtered records
    pub fn get_statistics(&self, options: &HistoryOptions) -> RunStatistics {
        let records = self.get_records(&HistoryOptions {
            limit: None,
            ..options.clone()
        });

        if records.is_empty() {
            return RunStatistics {
                total_runs: 0,
                success_count: 0,
                failure_count: 0,
                success_rate: 0.0,
                average_duration: 0.0,
                tolerated_install_failures: 0,
                no_change_runs: 0,
                last_run: None,
            };
        }

        let success_count = records.iter().filter(|r| r.success).count();
        let total_duration: u64 = records.iter().map(|r| r.duration).sum();

        RunStatistics {
            total_runs: records.len(),
            success_count,
            failure_count: records.len() - success_count,
            success_rate: (success_count as f64 / records.len() as f64) * 100.0,
            average_duration: total_duration as f64 / records.len() as f64,
            tolerated_install_failures: records
                .iter()
                .filter(|r| r.install.as_ref().is_some_and(StepOutcome::is_tolerated_failure))
                .count(),
            no_change_runs: records
                .iter()
                .filter(|r| r.pushed && !r.committed)
                .count(),
            last_run: records.first().map(|r| r.timestamp),
        }
    }

    /// Generate a Markdown report
    pub fn generate_report(&self, options: &HistoryOptions) -> HistoryReport {
        let statistics = self.get_statistics(options);

        let mut recent_options = options.clone();
        if recent_options.limit.is_none() {
            recent_options.limit = Some(10);
        }
        let recent_runs = self.get_records(&recent_options);
        let markdown_summary = Self::generate_markdown_summary(&statistics, &recent_runs);

        HistoryReport {
            generated_at: Utc::now(),
            statistics,
            recent_runs,
            markdown_summary,
        }
    }

    async fn load_records(&mut self) -> Result<(), anyhow::Error> {
        let data = fs::read_to_string(&self.data_file_path).await?;
        let mut parsed: HistoryDataFile = serde_json::from_str(&data)?;
        if parsed.records.len() > self.max_records {
            let excess = parsed.records.len() - self.max_records;
            parsed.records.drain(..excess);
        }
        self.records = parsed.records;
        Ok(())
    }

    async fn save_records(&self) -> Result<(), anyhow::Error> {
        if let Some(dir) = self.data_file_path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let data = HistoryDataFile {
            version: "1.0".to_string(),
            records: self.records.clone(),
            last_updated: Utc::now().to_rfc3339(),
        };

        let json = serde_json::to_string_pretty(&data)?;

        // Atomic write: write to temp file, then rename
        let temp_file = self.data_file_path.with_extension("json.tmp");
        fs::write(&temp_file, json).await?;
        fs::rename(&temp_file, &self.data_file_path).await?;

        Ok(())
    }

    fn generate_markdown_summary(statistics: &RunStatistics, recent_runs: &[RunRecord]) -> String {
        let mut lines = Vec::new();

        lines.push("# Publishing Run History\n".to_string());
        lines.push(format!("**Generated**: {}\n", Utc::now().to_rfc3339()));

        lines.push("## Overall Statistics\n".to_string());
        lines.push(format!("- **Total Runs**: {}", statistics.total_runs));
        lines.push(format!("- **Successful**: {}", statistics.success_count));
        lines.push(format!("- **Failed**: {}", statistics.failure_count));
        lines.push(format!("- **Success Rate**: {:.2}%", statistics.success_rate));
        lines.push(format!(
            "- **Average Duration**: {:.2}s",
            statistics.average_duration / 1000.0
        ));
        lines.push(format!(
            "- **Tolerated Install Failures**: {}",
            statistics.tolerated_install_failures
        ));
        lines.push(format!("- **Runs Without Changes**: {}\n", statistics.no_change_runs));

        if !recent_runs.is_empty() {
            lines.push("## Recent Runs\n".to_string());
            lines.push("| Timestamp | State | Install | Commit | Status | Duration |".to_string());
            lines.push("|-----------|-------|---------|--------|--------|----------|".to_string());

            for record in recent_runs {
                let status = if record.success {
                    "✅ Success".to_string()
                } else {
                    format!("❌ {}", record.error_code.as_deref().unwrap_or("Failed"))
                };
                let install = match &record.install {
                    Some(StepOutcome::Succeeded) => "ok",
                    Some(StepOutcome::ToleratedFailure { .. }) => "tolerated",
                    None => "-",
                };
                let commit = match (record.committed, record.pushed) {
                    (true, _) => "new",
                    (false, true) => "unchanged",
                    (false, false) => "-",
                };

                lines.push(format!(
                    "| {} | {:?} | {} | {} | {} | {:.2}s |",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.final_state,
                    install,
                    commit,
                    status,
                    record.duration as f64 / 1000.0
                ));
            }
            lines.push(String::new());
        }

        lines.join("\n")
    }
}
