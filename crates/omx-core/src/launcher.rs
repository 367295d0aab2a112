//! Serial, rate-limited launch of a resolved job batch.
//!
//! At most one launch request is in flight at any time. Consecutive jobs
//! are spaced by a fixed inter-launch interval; throttled attempts are
//! retried with exponential backoff plus jitter.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::LauncherConfig;
use crate::error::{OmxError, OmxResult};
use crate::model::{JobSpec, LaunchedJob};
use crate::service::{LaunchError, RunService, StartRunRequest};

pub struct Launcher {
    service: Arc<dyn RunService>,
    config: LauncherConfig,
}

impl Launcher {
    pub fn new(service: Arc<dyn RunService>) -> Self {
        Self::with_config(service, LauncherConfig::default())
    }

    pub fn with_config(service: Arc<dyn RunService>, config: LauncherConfig) -> Self {
        Self { service, config }
    }

    /// Launch every spec in order. Jobs that exhaust their retries or fail
    /// fatally are logged and excluded; the batch continues. Errors only
    /// when a non-empty batch produced nothing.
    pub async fn launch(&self, specs: &[JobSpec]) -> OmxResult<Vec<LaunchedJob>> {
        let mut launched = Vec::new();

        for (idx, spec) in specs.iter().enumerate() {
            if idx > 0 {
                debug!(
                    "Waiting {:.1}s before launching next workflow",
                    self.config.launch_interval_secs
                );
                tokio::time::sleep(self.config.launch_interval()).await;
            }

            match self.launch_one(spec).await {
                Ok(job) => {
                    info!(
                        "Launched workflow {} as run {}",
                        spec.job_type, job.job_id
                    );
                    launched.push(job);
                }
                Err(e) => {
                    warn!("Failed to launch workflow {}: {}", spec.job_type, e);
                }
            }
        }

        if launched.is_empty() && !specs.is_empty() {
            return Err(OmxError::NoJobsLaunched);
        }
        Ok(launched)
    }

    async fn launch_one(&self, spec: &JobSpec) -> OmxResult<LaunchedJob> {
        let request = build_request(spec);
        let max_attempts = self.config.retry_max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            match self.service.start_run(&request).await {
                Ok(started) => {
                    return Ok(LaunchedJob {
                        job_type: spec.job_type.clone(),
                        job_id: started.job_id,
                        job_arn: started.job_arn,
                    });
                }
                Err(LaunchError::Throttled(message)) => {
                    if attempt >= max_attempts {
                        return Err(OmxError::LaunchFailure {
                            job_type: spec.job_type.clone(),
                            source: anyhow::anyhow!(
                                "throttled on all {max_attempts} attempts: {message}"
                            ),
                        });
                    }
                    let delay = self.retry_delay(attempt);
                    warn!(
                        "Launch of {} throttled, retrying in {:.2}s (attempt {}/{})",
                        spec.job_type,
                        delay.as_secs_f64(),
                        attempt,
                        max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(LaunchError::Fatal(source)) => {
                    return Err(OmxError::LaunchFailure {
                        job_type: spec.job_type.clone(),
                        source,
                    });
                }
            }
        }
    }

    /// Backoff for the given failed attempt (1-indexed), with jitter.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.retry_delay_without_jitter(attempt);
        let jitter = self.config.retry_jitter_secs.max(0.0);
        let jitter_secs = if jitter == 0.0 {
            0.0
        } else {
            rand::thread_rng().gen_range(0.0..jitter)
        };
        base + Duration::from_secs_f64(jitter_secs)
    }

    fn retry_delay_without_jitter(&self, attempt: u32) -> Duration {
        // Exponent cap keeps the doubling well inside f64 precision.
        const MAX_EXP: i32 = 30;
        let exp = i32::try_from(attempt.saturating_sub(1)).map_or(MAX_EXP, |e| e.min(MAX_EXP));
        let base = self.config.retry_base_delay_secs.max(0.0);
        Duration::from_secs_f64(base * 2f64.powi(exp))
    }
}

/// Build the wire request for one job. The run name embeds the launch
/// timestamp, so re-triggering the same run label yields distinct runs.
pub fn build_request(spec: &JobSpec) -> StartRunRequest {
    let launched_at = Utc::now();
    let run_name = format!(
        "{}-{}-{}",
        spec.job_type,
        spec.run_label,
        launched_at.format("%Y%m%d%H%M%S")
    );

    let mut tags = IndexMap::new();
    tags.insert("run_label".to_string(), spec.run_label.clone());
    tags.insert("workflow".to_string(), spec.job_type.clone());
    tags.insert("start_time".to_string(), launched_at.to_rfc3339());

    StartRunRequest {
        job_definition_ref: spec.job_definition_ref.clone(),
        run_name,
        parameters: spec.extra_parameters.clone(),
        output_locator: spec.output_locator.clone(),
        execution_role: spec.execution_role.clone(),
        resource_group: spec.resource_group.clone(),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{RunDetails, StartedRun};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Scripted {
        Success,
        Throttle,
        Fatal,
    }

    /// Scripted service that records when each launch call lands.
    struct ScriptedService {
        outcomes: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ScriptedService {
        fn new() -> Self {
            Self {
                outcomes: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn script(&self, job_type: &str, outcomes: Vec<Scripted>) {
            self.outcomes
                .lock()
                .unwrap()
                .insert(job_type.to_string(), outcomes.into());
        }

        fn calls_for(&self, job_type: &str) -> Vec<Instant> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(jt, _)| jt == job_type)
                .map(|(_, at)| *at)
                .collect()
        }
    }

    #[async_trait]
    impl RunService for ScriptedService {
        async fn start_run(&self, request: &StartRunRequest) -> Result<StartedRun, LaunchError> {
            let job_type = request
                .tags
                .get("workflow")
                .cloned()
                .unwrap_or_default();
            self.calls
                .lock()
                .unwrap()
                .push((job_type.clone(), Instant::now()));

            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .get_mut(&job_type)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Scripted::Success);

            match outcome {
                Scripted::Success => Ok(StartedRun {
                    job_id: format!("{job_type}-run"),
                    job_arn: format!("arn:runs/{job_type}-run"),
                }),
                Scripted::Throttle => {
                    Err(LaunchError::Throttled("ThrottlingException".to_string()))
                }
                Scripted::Fatal => Err(LaunchError::Fatal(anyhow::anyhow!("access denied"))),
            }
        }

        async fn get_run(&self, _job_id: &str) -> anyhow::Result<RunDetails> {
            unimplemented!("not used by launcher tests")
        }
    }

    fn test_config() -> LauncherConfig {
        LauncherConfig {
            launch_interval_secs: 10.0,
            retry_base_delay_secs: 1.0,
            retry_max_attempts: 5,
            retry_jitter_secs: 0.0,
        }
    }

    fn spec(job_type: &str) -> JobSpec {
        JobSpec {
            job_type: job_type.to_string(),
            run_label: "batch42".to_string(),
            input_locator: format!("s3://in/batch42/samplesheet_{job_type}.csv"),
            output_locator: format!("s3://out/batch42/{job_type}/"),
            extra_parameters: IndexMap::new(),
            job_definition_ref: format!("arn:workflows/{job_type}"),
            execution_role: "arn:role/omx".to_string(),
            resource_group: "group-1".to_string(),
        }
    }

    fn launcher(service: Arc<ScriptedService>) -> Launcher {
        Launcher::with_config(service, test_config())
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_launches_are_paced() {
        let service = Arc::new(ScriptedService::new());
        let start = Instant::now();

        let launched = launcher(service.clone())
            .launch(&[spec("mag"), spec("metatdenovo"), spec("rnaseq")])
            .await
            .expect("launch succeeds");

        assert_eq!(launched.len(), 3);
        let t0 = service.calls_for("mag")[0];
        let t1 = service.calls_for("metatdenovo")[0];
        let t2 = service.calls_for("rnaseq")[0];
        assert_eq!(t0 - start, Duration::ZERO);
        assert!(t1 - t0 >= Duration::from_secs(10));
        assert!(t2 - t1 >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_launch_retries_with_backoff_then_succeeds() {
        let service = Arc::new(ScriptedService::new());
        service.script("rnaseq", vec![Scripted::Throttle, Scripted::Throttle]);

        let launched = launcher(service.clone())
            .launch(&[spec("mag"), spec("rnaseq")])
            .await
            .expect("launch succeeds");

        assert_eq!(launched.len(), 2);
        assert_eq!(launched[1].job_type, "rnaseq");

        let calls = service.calls_for("rnaseq");
        assert_eq!(calls.len(), 3);
        // backoff doubles: 1s after the first throttle, 2s after the second
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));

        // the whole of rnaseq's launch was delayed by the fixed interval
        // plus accumulated backoff
        let mag_call = service.calls_for("mag")[0];
        assert!(calls[2] - mag_call >= Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_excludes_job_and_continues() {
        let service = Arc::new(ScriptedService::new());
        service.script(
            "mag",
            vec![
                Scripted::Throttle,
                Scripted::Throttle,
                Scripted::Throttle,
                Scripted::Throttle,
                Scripted::Throttle,
            ],
        );

        let launched = launcher(service.clone())
            .launch(&[spec("mag"), spec("rnaseq")])
            .await
            .expect("batch still succeeds");

        let names: Vec<_> = launched.iter().map(|j| j.job_type.as_str()).collect();
        assert_eq!(names, vec!["rnaseq"]);
        assert_eq!(service.calls_for("mag").len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let service = Arc::new(ScriptedService::new());
        service.script("mag", vec![Scripted::Fatal]);

        let launched = launcher(service.clone())
            .launch(&[spec("mag"), spec("rnaseq")])
            .await
            .expect("batch still succeeds");

        assert_eq!(launched.len(), 1);
        assert_eq!(service.calls_for("mag").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_launched_is_an_error() {
        let service = Arc::new(ScriptedService::new());
        service.script("mag", vec![Scripted::Fatal]);
        service.script("rnaseq", vec![Scripted::Fatal]);

        let result = launcher(service).launch(&[spec("mag"), spec("rnaseq")]).await;
        assert!(matches!(result, Err(OmxError::NoJobsLaunched)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch_is_not_an_error() {
        let service = Arc::new(ScriptedService::new());
        let launched = launcher(service).launch(&[]).await.expect("empty ok");
        assert!(launched.is_empty());
    }

    #[test]
    fn test_backoff_growth_without_jitter() {
        let service = Arc::new(ScriptedService::new());
        let launcher = launcher(service);
        assert_eq!(
            launcher.retry_delay_without_jitter(1),
            Duration::from_secs(1)
        );
        assert_eq!(
            launcher.retry_delay_without_jitter(2),
            Duration::from_secs(2)
        );
        assert_eq!(
            launcher.retry_delay_without_jitter(3),
            Duration::from_secs(4)
        );
        assert_eq!(
            launcher.retry_delay_without_jitter(4),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let service = Arc::new(ScriptedService::new());
        let config = LauncherConfig {
            retry_jitter_secs: 1.0,
            ..test_config()
        };
        let launcher = Launcher::with_config(service, config);
        for _ in 0..100 {
            let delay = launcher.retry_delay(1).as_secs_f64();
            assert!((1.0..2.0).contains(&delay), "delay {delay} out of bounds");
        }
    }

    #[test]
    fn test_build_request_names_and_tags() {
        let request = build_request(&spec("mag"));
        assert!(request.run_name.starts_with("mag-batch42-"));
        assert_eq!(request.tags.get("workflow"), Some(&"mag".to_string()));
        assert_eq!(request.tags.get("run_label"), Some(&"batch42".to_string()));
        assert!(request.tags.contains_key("start_time"));
        assert_eq!(request.job_definition_ref, "arn:workflows/mag");
    }
}
