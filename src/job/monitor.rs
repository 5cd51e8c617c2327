use super::status::{parse_job_status, StatusParseError};
use super::{JobId, JobState, JobStatus};
use crate::error::{FlowError, Result};
use crate::subprocess::{BacalhauRunner, ProcessOutput};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Read-only status queries; safe to call concurrently for distinct jobs.
#[derive(Clone)]
pub struct JobMonitor {
    client: Arc<dyn BacalhauRunner>,
}

impl JobMonitor {
    pub fn new(client: Arc<dyn BacalhauRunner>) -> Self {
        Self { client }
    }

    /// Query the network once for `job_id`.
    ///
    /// Client failures and unreadable payloads come back as an `Unknown`
    /// status so the polling loop keeps waiting. A missing client binary and
    /// a completed job without a published result are errors.
    pub async fn poll(&self, job_id: &JobId) -> Result<JobStatus> {
        job_id.require()?;

        let output = match self.client.list(job_id.as_str()).await {
            Ok(output) => output,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("status query failed for job {}: {}", job_id, e);
                return Ok(JobStatus::unknown());
            }
        };

        let note = client_note(&output);

        let status = match parse_job_status(&output.stdout) {
            Ok(status) => status,
            Err(StatusParseError::Malformed(e)) => {
                warn!("job status is unreadable: {} ({}){}", job_id, e, note);
                return Ok(JobStatus::unknown());
            }
            Err(StatusParseError::MissingPublishedResult) => {
                error!(
                    "job completed without a published result: {}{}\n{}",
                    job_id,
                    note,
                    pretty_payload(&output.stdout)
                );
                return Err(FlowError::InconsistentState {
                    job_id: job_id.to_string(),
                });
            }
        };

        let line = state_line(job_id, &status, &note);
        match status.state() {
            JobState::Error => error!("{}\n{}", line, pretty_payload(&output.stdout)),
            _ if !output.status.success() => warn!("{}", line),
            _ => info!("{}", line),
        }

        Ok(status)
    }
}

/// Exit indicator and stderr of a failed client call, empty on success.
fn client_note(output: &ProcessOutput) -> String {
    if output.status.success() {
        return String::new();
    }
    match output.stderr.trim() {
        "" => format!(" [client {}]", output.status),
        stderr => format!(" [client {}: {}]", output.status, stderr),
    }
}

/// The one summary line logged per poll.
fn state_line(job_id: &JobId, status: &JobStatus, note: &str) -> String {
    match status.state() {
        JobState::Unknown => format!("job status is empty! {}{}", job_id, note),
        JobState::Completed => format!(
            "job completed: {} -> {}{}",
            job_id,
            status.output().map(|o| o.as_str()).unwrap_or_default(),
            note
        ),
        JobState::Error => format!("job returns error: {}{}", job_id, note),
        state => format!("job not completed: {} - {}{}", job_id, state, note),
    }
}

/// Re-indent a JSON payload for diagnostics, falling back to the raw text.
fn pretty_payload(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| payload.to_string())
}
