use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::error::ProcessError;
use super::runner::{ProcessCommand, ProcessOutput, ProcessRunner};

/// One `--input` flag: a storage URI mounted at a path inside the job container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMount {
    pub source: String,
    pub target: String,
}

impl InputMount {
    /// Render as the `<source>:<target>` value the client expects
    pub fn to_flag_value(&self) -> String {
        format!("{}:{}", self.source, self.target)
    }
}

/// Thin wrapper over the execution network's command-line client.
///
/// Every call returns the raw process output; interpreting exit codes and
/// payloads is left to the job layer.
#[async_trait]
pub trait BacalhauRunner: Send + Sync {
    /// `docker run --id-only --wait=false`, returns immediately after submission
    async fn docker_run(
        &self,
        inputs: &[InputMount],
        image: &str,
        command: &[String],
    ) -> Result<ProcessOutput, ProcessError>;

    /// `list --output json --id-filter <job_id>`
    async fn list(&self, job_id: &str) -> Result<ProcessOutput, ProcessError>;

    /// `get --output-dir <dir> <job_id>`
    async fn get(&self, job_id: &str, output_dir: &Path) -> Result<ProcessOutput, ProcessError>;
}

pub struct BacalhauRunnerImpl {
    runner: Arc<dyn ProcessRunner>,
    executable: String,
    env: BTreeMap<String, String>,
}

impl BacalhauRunnerImpl {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        executable: impl Into<String>,
        env: BTreeMap<String, String>,
    ) -> Self {
        Self {
            runner,
            executable: executable.into(),
            env,
        }
    }

    /// Client invocation carrying the configured environment
    fn command(&self, args: Vec<String>) -> ProcessCommand {
        ProcessCommand {
            program: self.executable.clone(),
            args,
            env: self.env.clone(),
        }
    }
}

/// Build the argument list for a non-blocking docker job submission.
fn docker_run_args(inputs: &[InputMount], image: &str, command: &[String]) -> Vec<String> {
    let mut args: Vec<String> = ["docker", "run", "--id-only", "--wait=false"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for input in inputs {
        args.push("--input".to_string());
        args.push(input.to_flag_value());
    }

    args.push(image.to_string());
    args.push("--".to_string());
    args.extend(command.iter().cloned());
    args
}

#[async_trait]
impl BacalhauRunner for BacalhauRunnerImpl {
    async fn docker_run(
        &self,
        inputs: &[InputMount],
        image: &str,
        command: &[String],
    ) -> Result<ProcessOutput, ProcessError> {
        let cmd = self.command(docker_run_args(inputs, image, command));
        self.runner.run(cmd).await
    }

    async fn list(&self, job_id: &str) -> Result<ProcessOutput, ProcessError> {
        let args = ["list", "--output", "json", "--id-filter", job_id];
        let cmd = self.command(args.iter().map(|s| s.to_string()).collect());
        self.runner.run(cmd).await
    }

    async fn get(&self, job_id: &str, output_dir: &Path) -> Result<ProcessOutput, ProcessError> {
        let cmd = self.command(vec![
            "get".to_string(),
            "--output-dir".to_string(),
            output_dir.to_string_lossy().into_owned(),
            job_id.to_string(),
        ]);
        self.runner.run(cmd).await
    }
}
