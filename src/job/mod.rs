//! Jobs on the execution network
//!
//! Types shared by the submit / poll / fetch operations, plus one module per
//! operation. Every operation goes through a [`BacalhauRunner`] so it can be
//! exercised against a scripted client in tests.
//!
//! [`BacalhauRunner`]: crate::subprocess::BacalhauRunner

pub mod fetcher;
pub mod monitor;
pub mod status;
pub mod submitter;

pub use fetcher::{FetchedOutput, ResultFetcher};
pub use monitor::JobMonitor;
pub use status::{parse_job_status, StatusParseError};
pub use submitter::JobSubmitter;

use crate::error::{FlowError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Identifier of a dataset or result on the content-addressed network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentReference(String);

impl ContentReference {
    /// Trimmed reference. Whitespace and `:` are rejected inside the value
    /// since either would break the `<source>:<mount>` input flag.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FlowError::Precondition(
                "content reference must not be empty".to_string(),
            ));
        }
        if trimmed.chars().any(|c| c == ':' || c.is_whitespace()) {
            return Err(FlowError::Precondition(format!(
                "content reference '{}' must not contain whitespace or ':'",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job identifier as reported by the execution network.
///
/// Submission may hand back an empty id when the client fails; such an id
/// is carried as-is and rejected by every operation that needs a real job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let id = Self::from_client_output(&value.into());
        id.require()?;
        Ok(id)
    }

    /// Wrap whatever the client printed, trimmed, without validation.
    pub fn from_client_output(output: &str) -> Self {
        Self(output.trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn require(&self) -> Result<()> {
        if self.is_empty() {
            return Err(FlowError::Precondition(
                "job id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Processes one input partition
    Local,
    /// Merges the outputs of every local job
    Aggregate,
}

impl JobType {
    /// Flag selecting the job's entry point inside the container
    pub fn entry_flag(&self) -> &'static str {
        match self {
            JobType::Local => "--train",
            JobType::Aggregate => "--aggregate",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Local => write!(f, "local"),
            JobType::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Where inputs land inside the job container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPolicy {
    /// One input mounted directly at the input root
    Single,
    /// Inputs mounted at `<root>/1 .. <root>/N`
    Numbered,
}

impl MountPolicy {
    pub fn for_input_count(count: usize) -> Self {
        if count > 1 {
            MountPolicy::Numbered
        } else {
            MountPolicy::Single
        }
    }

    /// Mount path for the input at zero-based `index`
    pub fn mount_path(&self, root: &str, index: usize) -> String {
        match self {
            MountPolicy::Single => root.to_string(),
            MountPolicy::Numbered => format!("{}/{}", root.trim_end_matches('/'), index + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: JobId,
    pub job_type: JobType,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobState {
    /// No record for the job was returned
    Unknown,
    Submitted,
    Running,
    Completed,
    /// `Error` or `Failed`
    Error,
    /// Any state label not listed above
    Other(String),
}

impl JobState {
    pub fn from_label(label: &str) -> Self {
        match label {
            "" => JobState::Unknown,
            "Submitted" => JobState::Submitted,
            "Running" => JobState::Running,
            "Completed" => JobState::Completed,
            "Error" | "Failed" => JobState::Error,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Unknown => write!(f, "Unknown"),
            JobState::Submitted => write!(f, "Submitted"),
            JobState::Running => write!(f, "Running"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Error => write!(f, "Error"),
            JobState::Other(label) => f.write_str(label),
        }
    }
}

/// Result of one status query. `output` is set only for completed jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    state: JobState,
    output: Option<ContentReference>,
}

impl JobStatus {
    pub fn unknown() -> Self {
        Self {
            state: JobState::Unknown,
            output: None,
        }
    }

    pub fn completed(output: ContentReference) -> Self {
        Self {
            state: JobState::Completed,
            output: Some(output),
        }
    }

    /// Status for any state other than `Completed`.
    pub(crate) fn pending(state: JobState) -> Self {
        debug_assert!(state != JobState::Completed);
        Self {
            state,
            output: None,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn output(&self) -> Option<&ContentReference> {
        self.output.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        self.state == JobState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.state == JobState::Error
    }

    pub fn is_terminal(&self) -> bool {
        self.is_completed() || self.is_failed()
    }
}
