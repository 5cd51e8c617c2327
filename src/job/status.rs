//! Decoding of job-listing payloads
//!
//! The client prints a JSON array of job records. Only the first record is
//! considered; its nested `State.State` label becomes the [`JobState`] and,
//! for completed jobs, the first execution that published a result supplies
//! the output reference.

use super::{ContentReference, JobState, JobStatus};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusParseError {
    #[error("Malformed status payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Job is Completed but no execution published a result")]
    MissingPublishedResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JobRecord {
    state: JobRecordState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JobRecordState {
    state: String,
    #[serde(default)]
    executions: Option<Vec<ExecutionRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionRecord {
    #[serde(default)]
    published_results: Option<PublishedResults>,
}

#[derive(Debug, Deserialize)]
struct PublishedResults {
    #[serde(rename = "CID", default)]
    cid: Option<String>,
}

impl ExecutionRecord {
    fn published_reference(&self) -> Option<ContentReference> {
        self.published_results
            .as_ref()
            .and_then(|results| results.cid.as_deref())
            .and_then(|cid| ContentReference::new(cid).ok())
    }
}

/// Decode a raw status payload.
///
/// An empty payload or an empty array yields [`JobState::Unknown`]; neither
/// says anything about the job beyond "no data yet".
pub fn parse_job_status(payload: &str) -> Result<JobStatus, StatusParseError> {
    if payload.trim().is_empty() {
        return Ok(JobStatus::unknown());
    }

    let records: Vec<JobRecord> = serde_json::from_str(payload)?;
    let Some(record) = records.into_iter().next() else {
        return Ok(JobStatus::unknown());
    };

    match JobState::from_label(&record.state.state) {
        JobState::Completed => record
            .state
            .executions
            .iter()
            .flatten()
            .find_map(ExecutionRecord::published_reference)
            .map(JobStatus::completed)
            .ok_or(StatusParseError::MissingPublishedResult),
        state => Ok(JobStatus::pending(state)),
    }
}
