//! Renders a poll aggregate into a human-readable run report and hands it
//! to a notification channel.

use async_trait::async_trait;

use crate::model::{JobStatusSnapshot, RunAggregate};

/// Subject lines longer than this are cut; most notification transports
/// reject or mangle anything longer.
pub const SUBJECT_MAX_LEN: usize = 100;

const FOOTER: &str = "---\nThis notification has been sent to all configured email addresses.";

/// A rendered notification, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Render the final report for one run.
///
/// The outcome is FAILED when any job failed, and also when the aggregate
/// never reached a terminal state, so a run abandoned mid-flight (watch
/// budget exhausted, jobs stuck) never reads as a success.
pub fn render_report(aggregate: &RunAggregate) -> Notification {
    let outcome = if aggregate.any_failed || !aggregate.all_terminal {
        "FAILED"
    } else {
        "SUCCEEDED"
    };

    let subject = truncate_subject(&format!(
        "[{}] {} - {} workflows",
        aggregate.run_label,
        outcome,
        aggregate.job_statuses.len()
    ));

    let mut body = String::new();
    body.push_str(&format!("Run: {}\n", aggregate.run_label));
    body.push_str(&format!("Outcome: {outcome}\n"));
    body.push_str(&format!("Workflows: {}\n\n", aggregate.job_statuses.len()));
    for snapshot in &aggregate.job_statuses {
        body.push_str(&render_job(snapshot));
        body.push('\n');
    }
    body.push_str(FOOTER);
    body.push('\n');

    Notification { subject, body }
}

fn render_job(snapshot: &JobStatusSnapshot) -> String {
    let started = snapshot
        .started_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string());
    let stopped = snapshot
        .stopped_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "n/a".to_string());
    let message = if snapshot.message.is_empty() {
        "n/a"
    } else {
        snapshot.message.as_str()
    };

    format!(
        concat!(
            "Workflow: {workflow}\n",
            "  Run id:  {id}\n",
            "  Status:  {status}\n",
            "  Started: {started}\n",
            "  Stopped: {stopped}\n",
            "  Message: {message}\n",
        ),
        workflow = snapshot.job_type,
        id = snapshot.job_id,
        status = snapshot.state.as_str(),
        started = started,
        stopped = stopped,
        message = message,
    )
}

fn truncate_subject(subject: &str) -> String {
    subject.chars().take(SUBJECT_MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobState, RunAggregate};
    use chrono::TimeZone;

    fn snapshot(job_type: &str, state: JobState) -> crate::model::JobStatusSnapshot {
        crate::model::JobStatusSnapshot {
            job_type: job_type.to_string(),
            job_id: format!("{job_type}-id"),
            state,
            started_at: None,
            stopped_at: None,
            message: String::new(),
        }
    }

    #[test]
    fn test_success_subject_and_body() {
        let agg = RunAggregate::from_snapshots(
            "batch42",
            vec![
                snapshot("mag", JobState::Completed),
                snapshot("rnaseq", JobState::Completed),
            ],
        );
        let notification = render_report(&agg);

        assert_eq!(notification.subject, "[batch42] SUCCEEDED - 2 workflows");
        assert!(notification.body.contains("Outcome: SUCCEEDED"));
        assert!(notification.body.contains("Workflow: mag"));
        assert!(notification.body.contains("Workflow: rnaseq"));
        assert!(notification.body.ends_with(&format!("{FOOTER}\n")));
    }

    #[test]
    fn test_any_failure_flips_outcome() {
        let agg = RunAggregate::from_snapshots(
            "batch42",
            vec![
                snapshot("mag", JobState::Completed),
                snapshot("rnaseq", JobState::Failed),
            ],
        );
        let notification = render_report(&agg);

        assert_eq!(notification.subject, "[batch42] FAILED - 2 workflows");
        assert!(notification.body.contains("Outcome: FAILED"));
    }

    #[test]
    fn test_non_terminal_aggregate_reports_failed() {
        // a run still in flight when the report goes out must not read as a
        // success
        let agg = RunAggregate::from_snapshots(
            "batch42",
            vec![
                snapshot("mag", JobState::Completed),
                snapshot("rnaseq", JobState::Running),
            ],
        );
        let notification = render_report(&agg);
        assert!(notification.subject.contains("FAILED"));
    }

    #[test]
    fn test_subject_truncated_to_limit() {
        let long_label = "b".repeat(200);
        let agg = RunAggregate::from_snapshots(&long_label, vec![snapshot("mag", JobState::Completed)]);
        let notification = render_report(&agg);
        assert_eq!(notification.subject.chars().count(), SUBJECT_MAX_LEN);
        assert!(notification.subject.starts_with("[bbb"));
    }

    #[test]
    fn test_missing_fields_render_as_placeholders() {
        let agg = RunAggregate::from_snapshots("batch42", vec![snapshot("mag", JobState::Failed)]);
        let notification = render_report(&agg);
        assert!(notification.body.contains("Started: n/a"));
        assert!(notification.body.contains("Stopped: n/a"));
        assert!(notification.body.contains("Message: n/a"));
    }

    #[test]
    fn test_timestamps_and_message_rendered_when_present() {
        let mut snap = snapshot("mag", JobState::Failed);
        snap.started_at = Some(chrono::Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
        snap.stopped_at = Some(chrono::Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
        snap.message = "container exited with code 1".to_string();

        let notification = render_report(&RunAggregate::from_snapshots("batch42", vec![snap]));
        assert!(notification.body.contains("Started: 2024-03-01T08:00:00+00:00"));
        assert!(notification.body.contains("Stopped: 2024-03-01T09:30:00+00:00"));
        assert!(notification.body.contains("Message: container exited with code 1"));
    }
}
