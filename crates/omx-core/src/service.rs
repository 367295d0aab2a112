//! Boundary to the external job-control API.
//!
//! Implementations classify transport and API failures at this seam; the
//! engine above it only ever sees `LaunchError` on the launch path and
//! `anyhow::Error` on the status path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One launch request, fully resolved.
#[derive(Debug, Clone, Serialize)]
pub struct StartRunRequest {
    pub job_definition_ref: String,
    pub run_name: String,
    pub parameters: IndexMap<String, String>,
    pub output_locator: String,
    pub execution_role: String,
    pub resource_group: String,
    pub tags: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartedRun {
    pub job_id: String,
    pub job_arn: String,
}

/// Raw status of one run as the provider reports it. The `status` string is
/// provider vocabulary; it is mapped to `JobState` immediately after this
/// struct crosses the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct RunDetails {
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

/// Launch failures, classified at the boundary.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Rate-limit signal from the API; the launcher retries these.
    #[error("launch throttled: {0}")]
    Throttled(String),

    /// Anything else; fatal for the job, not retried.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

#[async_trait]
pub trait RunService: Send + Sync {
    async fn start_run(&self, request: &StartRunRequest) -> Result<StartedRun, LaunchError>;

    async fn get_run(&self, job_id: &str) -> anyhow::Result<RunDetails>;
}
