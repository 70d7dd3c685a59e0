//! Run ledger records.
//!
//! A run is created `running` by the start record and sealed exactly once by
//! the finish record. Steps and artifacts are append-only children of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::id::{AgentId, RecipeId, RunId, WorkflowId};
use crate::recipe::Phase;
use crate::workflow::TriggerType;

/// Lifecycle status of a run.
///
/// `Unknown` only appears when reading records written without a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    /// Lenient parse for stored values; anything unrecognized is `Unknown`.
    pub fn from_stored(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or(RunStatus::Unknown)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "success" | "succeeded" | "ok" => Ok(RunStatus::Success),
            "failed" | "failure" | "error" => Ok(RunStatus::Failed),
            "unknown" => Ok(RunStatus::Unknown),
            other => Err(format!("unknown run status: '{other}'")),
        }
    }
}

/// Terminal outcome written by the finish record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed { error: String },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Success => RunStatus::Success,
            RunOutcome::Failed { .. } => RunStatus::Failed,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RunOutcome::Success => None,
            RunOutcome::Failed { error } => Some(error),
        }
    }
}

/// The start record of a run.
#[derive(Debug, Clone)]
pub struct RunStart {
    pub id: RunId,
    /// None for ad-hoc runs that are not bound to a stored workflow.
    pub workflow_id: Option<WorkflowId>,
    pub name: String,
    pub agent_id: Option<AgentId>,
    pub recipe_id: Option<RecipeId>,
    pub trigger: TriggerType,
    pub started_at: DateTime<Utc>,
}

/// The finish record of a run.
#[derive(Debug, Clone)]
pub struct RunFinish {
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    /// Defaults to the time the record is written.
    pub finished_at: Option<DateTime<Utc>>,
    /// Defaults to `finished_at - started_at`.
    pub duration_ms: Option<f64>,
}

/// A run as read back from the ledger.
///
/// Optional fields stay optional because older records may lack them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workflow_id: Option<WorkflowId>,
    pub name: String,
    pub agent_id: Option<AgentId>,
    pub recipe_id: Option<RecipeId>,
    pub trigger: TriggerType,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl StepLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepLevel::Info => "info",
            StepLevel::Warn => "warn",
            StepLevel::Error => "error",
        }
    }

    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("warn") | Some("warning") => StepLevel::Warn,
            Some("error") => StepLevel::Error,
            _ => StepLevel::Info,
        }
    }
}

impl fmt::Display for StepLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step record inside a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStep {
    pub run_id: RunId,
    /// None when a stored step names a phase outside the fixed set.
    pub phase: Option<Phase>,
    pub message: String,
    pub payload: serde_json::Value,
    pub result: serde_json::Value,
    pub level: StepLevel,
    pub timestamp: DateTime<Utc>,
}

/// Something a run produced: a ticket id, a published KB link, a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub run_id: RunId,
    pub kind: String,
    pub title: String,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Full projection of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetails {
    pub run: Run,
    pub steps: Vec<RunStep>,
    pub artifacts: Vec<RunArtifact>,
}

/// Filter for `latest_runs`.
#[derive(Debug, Clone)]
pub struct RunQuery {
    pub limit: u32,
    /// Empty matches every status.
    pub statuses: Vec<RunStatus>,
    pub since: Option<DateTime<Utc>>,
}

impl Default for RunQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            statuses: Vec::new(),
            since: None,
        }
    }
}

/// Rollup over a window of runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunStats {
    pub count: u64,
    /// Percentage in `0.0..=100.0`.
    pub success_rate: f64,
    pub p95_duration_ms: f64,
    /// Error of the most recent failed run, empty if none.
    pub last_error: String,
}
