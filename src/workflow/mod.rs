//! Two-phase workflow execution
//!
//! A run moves strictly forward through the phases below. Both polling
//! phases loop until every job they watch reports `Completed`; there is no
//! per-job timeout, so a job that never finishes stalls the run.
//!
//! ```text
//! Loading → SubmittingLocal → PollingLocal → FetchingLocal
//!         → SubmittingAggregate → PollingAggregate → FetchingAggregate → Done
//! ```

pub mod input;
pub mod orchestrator;
pub mod pool;

pub use input::load_references;
pub use orchestrator::{PollOutcome, WorkflowOrchestrator};
pub use pool::WorkerPool;

use crate::job::{ContentReference, FetchedOutput, JobHandle, JobStatus};
use serde::Serialize;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum WorkflowPhase {
    Loading,
    SubmittingLocal,
    PollingLocal,
    FetchingLocal,
    SubmittingAggregate,
    PollingAggregate,
    FetchingAggregate,
    Done,
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowPhase::Loading => "Loading",
            WorkflowPhase::SubmittingLocal => "SubmittingLocal",
            WorkflowPhase::PollingLocal => "PollingLocal",
            WorkflowPhase::FetchingLocal => "FetchingLocal",
            WorkflowPhase::SubmittingAggregate => "SubmittingAggregate",
            WorkflowPhase::PollingAggregate => "PollingAggregate",
            WorkflowPhase::FetchingAggregate => "FetchingAggregate",
            WorkflowPhase::Done => "Done",
        };
        f.write_str(name)
    }
}

/// In-memory record of one workflow invocation. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    pub phase: WorkflowPhase,
    pub inputs: Vec<ContentReference>,
    pub local_jobs: Vec<JobHandle>,
    /// Last status observed for each local job, in submission order
    pub local_statuses: Vec<JobStatus>,
    /// Aggregate inputs, in local submission order
    pub local_outputs: Vec<ContentReference>,
    pub local_results: Vec<FetchedOutput>,
    pub aggregate_job: Option<JobHandle>,
    pub aggregate_output: Option<ContentReference>,
    pub final_result: Option<FetchedOutput>,
    pub local_poll_rounds: usize,
    pub aggregate_poll_rounds: usize,
}

impl WorkflowRun {
    pub fn new(inputs: Vec<ContentReference>) -> Self {
        Self {
            phase: WorkflowPhase::Loading,
            inputs,
            local_jobs: Vec::new(),
            local_statuses: Vec::new(),
            local_outputs: Vec::new(),
            local_results: Vec::new(),
            aggregate_job: None,
            aggregate_output: None,
            final_result: None,
            local_poll_rounds: 0,
            aggregate_poll_rounds: 0,
        }
    }

    /// Move to `next`. Phases only ever advance.
    pub(crate) fn advance(&mut self, next: WorkflowPhase) {
        debug_assert!(next > self.phase, "{} -> {} goes backwards", self.phase, next);
        info!("workflow phase: {} -> {}", self.phase, next);
        self.phase = next;
    }
}
