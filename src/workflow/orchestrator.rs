//! Workflow orchestrator
//!
//! Drives one run end to end: fan out one local job per input reference,
//! wait for all of them, feed their outputs to a single aggregate job, wait
//! for it, and fetch the final artifact.

use super::input::load_references;
use super::pool::WorkerPool;
use super::{WorkflowPhase, WorkflowRun};
use crate::config::WorkflowConfig;
use crate::error::{FlowError, Result};
use crate::job::{
    ContentReference, FetchedOutput, JobHandle, JobMonitor, JobStatus, JobSubmitter, JobType,
    ResultFetcher,
};
use crate::subprocess::{BacalhauRunner, SubprocessManager};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Statuses from the polling round in which every job had completed.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub statuses: Vec<JobStatus>,
    pub rounds: usize,
}

pub struct WorkflowOrchestrator {
    config: WorkflowConfig,
    submitter: JobSubmitter,
    monitor: JobMonitor,
    fetcher: ResultFetcher,
}

impl WorkflowOrchestrator {
    pub fn new(config: WorkflowConfig, subprocess: &SubprocessManager) -> Self {
        let client = Arc::new(subprocess.bacalhau(&config.executable, &config.env));
        Self::with_client(config, client)
    }

    pub fn with_client(config: WorkflowConfig, client: Arc<dyn BacalhauRunner>) -> Self {
        Self {
            submitter: JobSubmitter::new(Arc::clone(&client), &config),
            monitor: JobMonitor::new(Arc::clone(&client)),
            fetcher: ResultFetcher::new(client, config.fetch_attempts, config.fetch_retry_delay),
            config,
        }
    }

    pub fn submitter(&self) -> &JobSubmitter {
        &self.submitter
    }

    pub fn monitor(&self) -> &JobMonitor {
        &self.monitor
    }

    pub fn fetcher(&self) -> &ResultFetcher {
        &self.fetcher
    }

    /// Load the input list from `input_file` and run the workflow over it.
    pub async fn run(&self, input_file: &Path, max_jobs: Option<usize>) -> Result<WorkflowRun> {
        info!("loading input references from {}", input_file.display());
        let references = load_references(input_file, max_jobs).await?;
        self.run_references(references).await
    }

    /// Run the workflow over an already loaded reference list.
    pub async fn run_references(&self, references: Vec<ContentReference>) -> Result<WorkflowRun> {
        if references.is_empty() {
            return Err(FlowError::Precondition(
                "workflow needs at least one input reference".to_string(),
            ));
        }

        let mut run = WorkflowRun::new(references);
        let pool = WorkerPool::new(self.config.parallelism());

        run.advance(WorkflowPhase::SubmittingLocal);
        info!("running local jobs on {} inputs", run.inputs.len());
        run.local_jobs = self.submit_local(&pool, &run.inputs).await?;

        run.advance(WorkflowPhase::PollingLocal);
        info!("waiting for local jobs to complete...");
        let local = self.poll_until_complete(&pool, &run.local_jobs).await?;
        run.local_poll_rounds = local.rounds;
        run.local_statuses = local.statuses;

        run.advance(WorkflowPhase::FetchingLocal);
        info!("all local jobs completed, saving results...");
        run.local_outputs = completed_outputs(&run.local_jobs, &run.local_statuses)?;
        run.local_results = self.fetch_all(&pool, &run.local_jobs).await?;
        info!(
            "local job outputs: [{}]",
            join_references(&run.local_outputs)
        );

        run.advance(WorkflowPhase::SubmittingAggregate);
        let aggregate = self
            .submitter
            .submit(JobType::Aggregate, &run.local_outputs)
            .await?;
        if aggregate.id.is_empty() {
            return Err(FlowError::SubmissionFailed {
                job_type: JobType::Aggregate,
                inputs: join_references(&run.local_outputs),
            });
        }

        run.advance(WorkflowPhase::PollingAggregate);
        info!("waiting for aggregate job to complete...");
        let jobs = std::slice::from_ref(&aggregate);
        let outcome = self.poll_until_complete(&pool, jobs).await?;
        run.aggregate_poll_rounds = outcome.rounds;
        run.aggregate_output = completed_outputs(jobs, &outcome.statuses)?
            .into_iter()
            .next();
        run.aggregate_job = Some(aggregate);
        drop(pool);

        run.advance(WorkflowPhase::FetchingAggregate);
        info!("aggregate job completed, saving results...");
        if let Some(job) = &run.aggregate_job {
            let fetched = match &self.config.output_dir {
                Some(dir) => self.fetcher.fetch_into(&job.id, dir).await?,
                None => self.fetcher.fetch(&job.id).await?,
            };
            self.check_artifact(&fetched);
            run.final_result = Some(fetched);
        }

        run.advance(WorkflowPhase::Done);
        Ok(run)
    }

    /// Submit one local job per reference. Every reference must yield a job id.
    async fn submit_local(
        &self,
        pool: &WorkerPool,
        references: &[ContentReference],
    ) -> Result<Vec<JobHandle>> {
        let handles = pool
            .map(references, |reference| {
                self.submitter
                    .submit(JobType::Local, std::slice::from_ref(reference))
            })
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        if handles.len() != references.len() {
            return Err(FlowError::HandleCountMismatch {
                job_type: JobType::Local,
                expected: references.len(),
                actual: handles.len(),
            });
        }

        if let Some((_, reference)) = handles
            .iter()
            .zip(references)
            .find(|(handle, _)| handle.id.is_empty())
        {
            return Err(FlowError::SubmissionFailed {
                job_type: JobType::Local,
                inputs: reference.to_string(),
            });
        }

        Ok(handles)
    }

    /// Poll every job once per round until all of them report `Completed`.
    ///
    /// Rounds are `poll_interval` apart. With `halt_on_job_error` a job in
    /// `Error` ends the loop with [`FlowError::JobFailed`]; otherwise the loop
    /// keeps waiting on it.
    pub async fn poll_until_complete(
        &self,
        pool: &WorkerPool,
        jobs: &[JobHandle],
    ) -> Result<PollOutcome> {
        let total = jobs.len();
        let mut rounds = 0;

        loop {
            rounds += 1;
            let statuses = pool
                .map(jobs, |job| self.monitor.poll(&job.id))
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?;

            if self.config.halt_on_job_error {
                if let Some((job, status)) = jobs
                    .iter()
                    .zip(&statuses)
                    .find(|(_, status)| status.is_failed())
                {
                    return Err(FlowError::JobFailed {
                        job_id: job.id.to_string(),
                        state: status.state().to_string(),
                    });
                }
            }

            let completed = statuses.iter().filter(|s| s.is_completed()).count();
            if completed >= total {
                return Ok(PollOutcome { statuses, rounds });
            }

            info!("{}/{} jobs completed", completed, total);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn fetch_all(&self, pool: &WorkerPool, jobs: &[JobHandle]) -> Result<Vec<FetchedOutput>> {
        let fetched = pool
            .map(jobs, |job| self.fetcher.fetch(&job.id))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        for output in &fetched {
            self.check_artifact(output);
        }
        Ok(fetched)
    }

    fn check_artifact(&self, fetched: &FetchedOutput) {
        if !fetched.succeeded {
            warn!(
                "results for job {} could not be downloaded after {} attempts",
                fetched.job_id, fetched.attempts
            );
        } else if !fetched.has_artifact(&self.config.expected_artifact) {
            warn!(
                "results for job {} in {} lack {}",
                fetched.job_id,
                fetched.dir.display(),
                self.config.expected_artifact.display()
            );
        }
    }
}

/// Output references of completed jobs, in job order.
fn completed_outputs(jobs: &[JobHandle], statuses: &[JobStatus]) -> Result<Vec<ContentReference>> {
    jobs.iter()
        .zip(statuses)
        .map(|(job, status)| {
            status
                .output()
                .cloned()
                .ok_or_else(|| FlowError::InconsistentState {
                    job_id: job.id.to_string(),
                })
        })
        .collect()
}

fn join_references(references: &[ContentReference]) -> String {
    references
        .iter()
        .map(ContentReference::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobId;
    use crate::subprocess::MockProcessRunner;
    use std::time::Duration;

    const RUNNING: &str = r#"[{"State": {"State": "Running"}}]"#;
    const ERROR: &str = r#"[{"State": {"State": "Error"}}]"#;

    fn completed(cid: &str) -> String {
        format!(
            r#"[{{"State": {{"State": "Completed", "Executions": [{{"PublishedResults": {{"CID": "{}"}}}}]}}}}]"#,
            cid
        )
    }

    fn test_config() -> WorkflowConfig {
        WorkflowConfig {
            poll_interval: Duration::ZERO,
            max_parallel: Some(4),
            ..Default::default()
        }
    }

    fn orchestrator(mock: &MockProcessRunner, config: WorkflowConfig) -> WorkflowOrchestrator {
        let manager = SubprocessManager::new(Arc::new(mock.clone()));
        WorkflowOrchestrator::new(config, &manager)
    }

    fn handle(id: &str) -> JobHandle {
        JobHandle {
            id: JobId::new(id).unwrap(),
            job_type: JobType::Local,
            submitted_at: chrono::Utc::now(),
        }
    }

    fn is_list_for(id: &'static str) -> impl Fn(&[String]) -> bool + Send + Sync + 'static {
        move |args: &[String]| {
            args.first().map(String::as_str) == Some("list") && args.iter().any(|a| a == id)
        }
    }

    #[tokio::test]
    async fn test_poll_runs_until_all_completed() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau")
            .with_args(is_list_for("j1"))
            .returns_stdout(&completed("QmA"))
            .finish();
        mock.expect_command("bacalhau")
            .with_args(is_list_for("j2"))
            .returns_stdout(RUNNING)
            .times(1)
            .finish();
        mock.expect_command("bacalhau")
            .with_args(is_list_for("j2"))
            .returns_stdout(&completed("QmB"))
            .finish();

        let orchestrator = orchestrator(&mock, test_config());
        let pool = WorkerPool::new(4);
        let outcome = orchestrator
            .poll_until_complete(&pool, &[handle("j1"), handle("j2")])
            .await
            .unwrap();

        assert_eq!(outcome.rounds, 2);
        assert!(outcome.statuses.iter().all(JobStatus::is_completed));
        assert_eq!(mock.count_calls(is_list_for("j1")), 2);
        assert_eq!(mock.count_calls(is_list_for("j2")), 2);
    }

    #[tokio::test]
    async fn test_poll_waits_through_empty_statuses() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau")
            .returns_stdout("")
            .times(3)
            .finish();
        mock.expect_command("bacalhau")
            .returns_stdout(&completed("QmA"))
            .finish();

        let orchestrator = orchestrator(&mock, test_config());
        let pool = WorkerPool::new(1);
        let outcome = orchestrator
            .poll_until_complete(&pool, &[handle("j1")])
            .await
            .unwrap();

        assert_eq!(outcome.rounds, 4);
        assert!(mock.verify_called("bacalhau", 4));
    }

    #[tokio::test]
    async fn test_poll_halts_on_error() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau")
            .with_args(is_list_for("j1"))
            .returns_stdout(&completed("QmA"))
            .finish();
        mock.expect_command("bacalhau")
            .with_args(is_list_for("j2"))
            .returns_stdout(ERROR)
            .finish();

        let orchestrator = orchestrator(&mock, test_config());
        let pool = WorkerPool::new(2);
        let result = orchestrator
            .poll_until_complete(&pool, &[handle("j1"), handle("j2")])
            .await;

        assert!(matches!(
            result,
            Err(FlowError::JobFailed { job_id, state }) if job_id == "j2" && state == "Error"
        ));
    }

    #[tokio::test]
    async fn test_poll_keeps_waiting_on_error_when_not_halting() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau")
            .returns_stdout(ERROR)
            .times(2)
            .finish();
        mock.expect_command("bacalhau")
            .returns_stdout(&completed("QmA"))
            .finish();

        let config = WorkflowConfig {
            halt_on_job_error: false,
            ..test_config()
        };
        let orchestrator = orchestrator(&mock, config);
        let pool = WorkerPool::new(1);
        let outcome = orchestrator
            .poll_until_complete(&pool, &[handle("j1")])
            .await
            .unwrap();

        assert_eq!(outcome.rounds, 3);
    }

    #[test]
    fn test_completed_outputs_keep_job_order() {
        let jobs = vec![handle("j1"), handle("j2")];
        let statuses = vec![
            JobStatus::completed(ContentReference::new("QmA").unwrap()),
            JobStatus::completed(ContentReference::new("QmB").unwrap()),
        ];

        let outputs = completed_outputs(&jobs, &statuses).unwrap();
        assert_eq!(join_references(&outputs), "QmA, QmB");

        let statuses = vec![statuses[0].clone(), JobStatus::unknown()];
        assert!(matches!(
            completed_outputs(&jobs, &statuses),
            Err(FlowError::InconsistentState { job_id }) if job_id == "j2"
        ));
    }
}
