//! Single-pass status poll over a launched fan-out.
//!
//! One invocation, no waiting, no retries. The caller supplies the interval
//! between poll cycles and decides when to stop, so the poller stays
//! re-entrant and free of shared state.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::OmxError;
use crate::model::{JobState, JobStatusSnapshot, LaunchedJob, RunAggregate};
use crate::service::RunService;

pub struct Poller {
    service: Arc<dyn RunService>,
}

impl Poller {
    pub fn new(service: Arc<dyn RunService>) -> Self {
        Self { service }
    }

    /// Query every launched job once and fold the snapshots into an
    /// aggregate. A failed status query yields an `Unknown` snapshot
    /// carrying the error text; it never aborts the pass.
    pub async fn poll(&self, run_label: &str, jobs: &[LaunchedJob]) -> RunAggregate {
        let queries = jobs.iter().map(|job| self.snapshot(job));
        let snapshots = futures::future::join_all(queries).await;
        RunAggregate::from_snapshots(run_label, snapshots)
    }

    async fn snapshot(&self, job: &LaunchedJob) -> JobStatusSnapshot {
        match self.service.get_run(&job.job_id).await {
            Ok(details) => {
                let state = JobState::from_provider(&details.status);
                debug!("Run {} ({}) is {}", job.job_id, job.job_type, state.as_str());
                JobStatusSnapshot {
                    job_type: job.job_type.clone(),
                    job_id: job.job_id.clone(),
                    state,
                    started_at: details.started_at,
                    stopped_at: details.stopped_at,
                    message: details.message.unwrap_or_default(),
                }
            }
            Err(source) => {
                let error = OmxError::StatusQuery {
                    job_id: job.job_id.clone(),
                    source,
                };
                warn!("{}", error);
                JobStatusSnapshot {
                    job_type: job.job_type.clone(),
                    job_id: job.job_id.clone(),
                    state: JobState::Unknown,
                    started_at: None,
                    stopped_at: None,
                    message: error.to_string(),
                }
            }
        }
    }
}
