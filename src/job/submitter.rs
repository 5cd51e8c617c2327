use super::{ContentReference, JobHandle, JobId, JobType, MountPolicy};
use crate::config::WorkflowConfig;
use crate::error::{FlowError, Result};
use crate::subprocess::{BacalhauRunner, InputMount};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

/// Submits jobs without waiting for them to run.
pub struct JobSubmitter {
    client: Arc<dyn BacalhauRunner>,
    image: String,
    entry_point: Vec<String>,
    input_scheme: String,
    input_mount: String,
    output_mount: String,
}

impl JobSubmitter {
    pub fn new(client: Arc<dyn BacalhauRunner>, config: &WorkflowConfig) -> Self {
        Self {
            client,
            image: config.image.clone(),
            entry_point: config.entry_point.clone(),
            input_scheme: config.input_scheme.clone(),
            input_mount: config.input_mount.clone(),
            output_mount: config.output_mount.clone(),
        }
    }

    fn input_mounts(&self, inputs: &[ContentReference]) -> Vec<InputMount> {
        let policy = MountPolicy::for_input_count(inputs.len());
        inputs
            .iter()
            .enumerate()
            .map(|(index, reference)| InputMount {
                source: format!("{}{}", self.input_scheme, reference),
                target: policy.mount_path(&self.input_mount, index),
            })
            .collect()
    }

    fn container_command(&self, job_type: JobType) -> Vec<String> {
        let mut command = self.entry_point.clone();
        command.push(job_type.entry_flag().to_string());
        command.push(format!("--input={}", self.input_mount));
        command.push(format!("--output={}", self.output_mount));
        command
    }

    /// Submit one job reading `inputs`.
    ///
    /// A client that exits non-zero is logged, not raised: the returned
    /// handle then carries whatever id text was printed, possibly none, and
    /// the caller decides what an empty id means.
    pub async fn submit(&self, job_type: JobType, inputs: &[ContentReference]) -> Result<JobHandle> {
        if inputs.is_empty() {
            return Err(FlowError::Precondition(format!(
                "{} job needs at least one input reference",
                job_type
            )));
        }

        let mounts = self.input_mounts(inputs);
        let command = self.container_command(job_type);
        let output = self
            .client
            .docker_run(&mounts, &self.image, &command)
            .await?;

        if !output.status.success() {
            error!(
                "failed {} job submission ({}): {} {}",
                job_type,
                output.status,
                output.stdout.trim(),
                output.stderr.trim()
            );
        }

        let id = JobId::from_client_output(&output.stdout);
        info!("{} job submitted: {}", job_type, id);

        Ok(JobHandle {
            id,
            job_type,
            submitted_at: Utc::now(),
        })
    }
}
