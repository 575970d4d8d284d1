//! State machine for tracking a publishing run
//!
//! This module provides state management with atomic file operations.
//! The state file of the last run stays in the project directory so an
//! operator can see where a failed run stopped.

use crate::core::error::PublishError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// State file name
pub const STATE_FILE: &str = ".publish-state.json";

/// Run state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Initial,
    Provisioning,
    Activated,
    DependenciesResolved,
    Generated,
    Published,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Published | RunState::Failed)
    }

    /// States from which a fatal failure can be entered
    pub fn can_fail(&self) -> bool {
        matches!(
            self,
            RunState::Initial
                | RunState::Provisioning
                | RunState::Activated
                | RunState::DependenciesResolved
                | RunState::Generated
        )
    }

    /// The state that follows on success, `None` for terminal states
    pub fn next(&self) -> Option<RunState> {
        match self {
            RunState::Initial => Some(RunState::Provisioning),
            RunState::Provisioning => Some(RunState::Activated),
            RunState::Activated => Some(RunState::DependenciesResolved),
            RunState::DependenciesResolved => Some(RunState::Generated),
            RunState::Generated => Some(RunState::Published),
            RunState::Published | RunState::Failed => None,
        }
    }

    /// Runs only move forward one state at a time, or fail
    pub fn can_transition_to(&self, to: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.next() == Some(to) || (to == RunState::Failed && self.can_fail())
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    /// From state
    pub from: RunState,

    /// To state
    pub to: RunState,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Additional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Run state data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStateData {
    /// Current state
    #[serde(rename = "currentState")]
    pub current_state: RunState,

    /// Run identifier
    #[serde(rename = "runId", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// State transition history
    pub transitions: Vec<StateTransition>,

    /// Last error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// State machine for tracking a publishing run
pub struct RunStateMachine {
    current_state: RunState,
    transitions: Vec<StateTransition>,
    state_file_path: PathBuf,
    run_id: Option<String>,
    error: Option<String>,
}

impl RunStateMachine {
    /// Create a new state machine
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        let state_file_path = project_path.as_ref().join(STATE_FILE);

        Self {
            current_state: RunState::Initial,
            transitions: Vec::new(),
            state_file_path,
            run_id: None,
            error: None,
        }
    }

    /// Start tracking a new run, discarding the previous run's state
    pub async fn begin(&mut self, run_id: &str) -> Result<(), std::io::Error> {
        self.clear().await?;
        self.run_id = Some(run_id.to_string());
        self.save().await
    }

    /// Transition to a new state
    ///
    /// Moves that skip a state or leave a terminal state are rejected.
    pub async fn transition(
        &mut self,
        to: RunState,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<(), PublishError> {
        if !self.current_state.can_transition_to(to) {
            return Err(PublishError::StateError(format!(
                "invalid transition {:?} → {:?}",
                self.current_state, to
            )));
        }

        let transition = StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            metadata: metadata.clone(),
        };

        tracing::debug!("State {:?} → {:?}", self.current_state, to);

        self.transitions.push(transition);
        self.current_state = to;

        if let Some(meta) = metadata
            && let Some(serde_json::Value::String(error)) = meta.get("error")
        {
            self.error = Some(error.clone());
        }

        // Persist state
        self.save().await?;

        Ok(())
    }

    /// Get current state
    pub fn get_state(&self) -> RunState {
        self.current_state
    }

    /// Get state data
    pub fn get_state_data(&self) -> RunStateData {
        RunStateData {
            current_state: self.current_state,
            run_id: self.run_id.clone(),
            transitions: self.transitions.clone(),
            error: self.error.clone(),
        }
    }

    /// States visited so far, in order, excluding `Initial`
    pub fn visited(&self) -> Vec<RunState> {
        self.transitions.iter().map(|t| t.to).collect()
    }

    /// Restore state from file
    pub async fn restore(&mut self) -> Result<bool, std::io::Error> {
        if !self.state_file_path.exists() {
            return Ok(false);
        }

        let content = fs::read_to_string(&self.state_file_path).await?;
        let data: RunStateData = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        self.current_state = data.current_state;
        self.run_id = data.run_id;
        self.error = data.error;
        self.transitions = data.transitions;

        Ok(true)
    }

    /// Save state to file (atomic operation)
    async fn save(&self) -> Result<(), std::io::Error> {
        let data = self.get_state_data();

        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        // Atomic write: write to temp file, then rename
        let temp_file = self.state_file_path.with_extension("json.tmp");
        fs::write(&temp_file, json).await?;
        fs::rename(&temp_file, &self.state_file_path).await?;

        Ok(())
    }

    /// Clear state file
    pub async fn clear(&mut self) -> Result<(), std::io::Error> {
        if self.state_file_path.exists() {
            fs::remove_file(&self.state_file_path).await?;
        }

        self.current_state = RunState::Initial;
        self.transitions.clear();
        self.run_id = None;
        self.error = None;

        Ok(())
    }

    /// Get last error
    pub fn get_last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Get elapsed time between the first and last transition
    pub fn get_elapsed_time(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// State left behind by the last run, if its file exists
    pub async fn load_last<P: AsRef<Path>>(
        project_path: P,
    ) -> Result<Option<Self>, std::io::Error> {
        let mut state_machine = Self::new(project_path);
        Ok(state_machine.restore().await?.then_some(state_machine))
    }

    /// Multi-line summary of a restored run for terminal output
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} {:?} after {:.2}s",
            self.run_id.as_deref().unwrap_or("unknown run"),
            self.current_state,
            self.get_elapsed_time() as f64 / 1000.0
        )];
        if let Some(error) = self.get_last_error() {
            lines.push(format!("error: {}", error));
        }
        if self.current_state == RunState::Failed {
            lines.extend(self.get_history().lines().map(str::to_string));
        }
        lines.join("\n")
    }

    /// Get transition history as human-readable string
    pub fn get_history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let time = t.timestamp.to_rfc3339();
                let meta = if let Some(metadata) = &t.metadata {
                    format!(" ({})", serde_json::to_string(metadata).unwrap_or_default())
                } else {
                    String::new()
                };
                format!("{}: {:?} → {:?}{}", time, t.from, t.to, meta)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
