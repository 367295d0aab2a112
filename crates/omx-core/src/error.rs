use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OmxError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json parse error in {path}: {source}")]
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("yaml parse error in {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("configuration error for workflow {job_type}: {reason}")]
    Configuration { job_type: String, reason: String },

    #[error("launch failed for workflow {job_type}: {source}")]
    LaunchFailure {
        job_type: String,
        source: anyhow::Error,
    },

    #[error("no workflows were launched; check samplesheet availability")]
    NoJobsLaunched,

    #[error("status query failed for run {job_id}: {source}")]
    StatusQuery {
        job_id: String,
        source: anyhow::Error,
    },

    #[error("notification delivery failed: {source}")]
    Notification { source: anyhow::Error },

    #[error("provisioning incomplete: {0}")]
    Provisioning(String),
}

pub type OmxResult<T> = Result<T, OmxError>;
