use std::time::Duration;

use serde::Deserialize;

/// Launcher tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    /// Minimum gap between consecutive launch requests in seconds.
    /// The default matches a 0.1 TPS launch quota.
    pub launch_interval_secs: f64,

    /// First retry delay in seconds; doubles on each further attempt.
    pub retry_base_delay_secs: f64,

    /// Maximum launch attempts per job, including the first.
    pub retry_max_attempts: u32,

    /// Upper bound of the random jitter added to each retry delay, in seconds.
    pub retry_jitter_secs: f64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            launch_interval_secs: std::env::var("LAUNCH_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
            retry_base_delay_secs: std::env::var("RETRY_BASE_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0),
            retry_max_attempts: std::env::var("RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            retry_jitter_secs: std::env::var("RETRY_JITTER_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0),
        }
    }
}

impl LauncherConfig {
    pub fn launch_interval(&self) -> Duration {
        Duration::from_secs_f64(self.launch_interval_secs.max(0.0))
    }
}

/// Poll-loop tuning for the `watch` command.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Gap between poll cycles in seconds.
    pub poll_interval_secs: f64,

    /// Cycle ceiling; exhausting it fails the run.
    pub max_cycles: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60.0),
            max_cycles: std::env::var("MAX_POLL_CYCLES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(480),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.0))
    }
}
