use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{OmxError, OmxResult};

/// State of an external sub-workflow run, after boundary mapping.
///
/// Raw provider status strings are mapped into this vocabulary as soon as
/// they cross the service boundary and never travel further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Synthesized locally when a status query fails. Never parsed from the
    /// wire, and never terminal.
    Unknown,
}

impl JobState {
    pub fn from_provider(status: &str) -> Self {
        match status.to_uppercase().as_str() {
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            "PENDING" | "QUEUED" => Self::Queued,
            "STARTING" => Self::Starting,
            "RUNNING" | "STOPPING" => Self::Running,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Unknown)
    }
}

/// Everything needed to launch one sub-workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_type: String,
    pub run_label: String,
    pub input_locator: String,
    pub output_locator: String,
    #[serde(default)]
    pub extra_parameters: IndexMap<String, String>,
    pub job_definition_ref: String,
    pub execution_role: String,
    pub resource_group: String,
}

/// A successfully launched sub-workflow run. The authoritative track list
/// for one orchestration run is the set of these, carried between
/// invocations by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchedJob {
    pub job_type: String,
    pub job_id: String,
    pub job_arn: String,
}

/// One job's status as observed by a single poll pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub job_type: String,
    pub job_id: String,
    pub state: JobState,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub message: String,
}

/// Combined outcome of one poll pass over a whole fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAggregate {
    pub run_label: String,
    pub job_statuses: Vec<JobStatusSnapshot>,
    pub all_terminal: bool,
    pub any_failed: bool,
}

impl RunAggregate {
    /// Recompute the aggregate flags from a snapshot set.
    pub fn from_snapshots(run_label: &str, job_statuses: Vec<JobStatusSnapshot>) -> Self {
        let all_terminal = !job_statuses.is_empty()
            && job_statuses.iter().all(|s| s.state.is_terminal());
        let any_failed = job_statuses.iter().any(|s| s.state.is_failure());
        Self {
            run_label: run_label.to_string(),
            job_statuses,
            all_terminal,
            any_failed,
        }
    }
}

/// The trigger manifest describing one batch of samples and the workflows
/// that should run over them.
///
/// Samplesheet references are keyed `samplesheet_{job_type}.csv`; declaration
/// order in the file is preserved and drives launch order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub run_label: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub workflows: Vec<String>,
    #[serde(default)]
    pub samplesheets: IndexMap<String, String>,
    /// Per-workflow parameter overrides, merged into each job's parameters.
    #[serde(default)]
    pub parameters: IndexMap<String, IndexMap<String, String>>,
}

impl Manifest {
    pub const FILE_NAME: &'static str = "run_manifest.json";

    pub fn samplesheet_key(job_type: &str) -> String {
        format!("samplesheet_{job_type}.csv")
    }

    pub fn samplesheet_for(&self, job_type: &str) -> Option<&str> {
        self.samplesheets
            .get(&Self::samplesheet_key(job_type))
            .map(String::as_str)
    }

    pub fn from_path(path: &Path) -> OmxResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| OmxError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| OmxError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Registry entry for one job type: where its definition lives and what
/// identity/grouping the launch must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub job_definition_ref: String,
    pub execution_role: String,
    pub resource_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Cross-invocation payload threading the track list between a launch and
/// the poll cycles that follow it. The engine itself holds no run state;
/// this file is the caller's memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_label: String,
    pub output_locator: String,
    pub launched: Vec<LaunchedJob>,
}

impl RunState {
    pub fn load(path: &Path) -> OmxResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| OmxError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| OmxError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> OmxResult<()> {
        let raw = serde_json::to_string_pretty(self).map_err(|source| OmxError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, raw).map_err(|source| OmxError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }
}
