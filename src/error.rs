use thiserror::Error;

use crate::config::ConfigError;
use crate::job::{JobType, StatusParseError};
use crate::subprocess::ProcessError;

#[derive(Error, Debug)]
pub enum FlowError {
    /// A caller handed over an empty identifier or reference list.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input file error: {0}")]
    Input(String),

    #[error("Execution client error: {0}")]
    Process(#[from] ProcessError),

    #[error("Status decode error: {0}")]
    Status(#[from] StatusParseError),

    /// The network reports `Completed` but no execution published a result.
    #[error("Job {job_id} completed without a published result")]
    InconsistentState { job_id: String },

    #[error("Job {job_id} ended in state {state}")]
    JobFailed { job_id: String, state: String },

    #[error("{job_type} submission failed for inputs [{inputs}]: no job id returned")]
    SubmissionFailed { job_type: JobType, inputs: String },

    #[error("Submitted {actual} {job_type} jobs for {expected} inputs")]
    HandleCountMismatch {
        job_type: JobType,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Process exit code for the binary: 2 for bad input, 1 for runtime failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlowError::Precondition(_) | FlowError::Config(_) | FlowError::Input(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
