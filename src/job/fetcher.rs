use super::JobId;
use crate::error::Result;
use crate::subprocess::BacalhauRunner;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const SCRATCH_PREFIX: &str = "cidflow-";

/// Where a job's published output was downloaded to.
///
/// A fetch that ran out of attempts still yields the (empty) directory;
/// check `succeeded` or [`FetchedOutput::has_artifact`] before trusting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedOutput {
    pub job_id: JobId,
    pub dir: PathBuf,
    pub attempts: u32,
    pub succeeded: bool,
}

impl FetchedOutput {
    pub fn has_artifact(&self, relative: &Path) -> bool {
        self.dir.join(relative).is_file()
    }
}

/// Downloads published job outputs with a bounded number of attempts.
#[derive(Clone)]
pub struct ResultFetcher {
    client: Arc<dyn BacalhauRunner>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ResultFetcher {
    pub fn new(client: Arc<dyn BacalhauRunner>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Fetch into a freshly allocated, uniquely named scratch directory.
    pub async fn fetch(&self, job_id: &JobId) -> Result<FetchedOutput> {
        job_id.require()?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()?
            .keep();
        self.fetch_attempts(job_id, dir).await
    }

    /// Fetch into `dir`, creating it if needed.
    pub async fn fetch_into(&self, job_id: &JobId, dir: &Path) -> Result<FetchedOutput> {
        job_id.require()?;
        tokio::fs::create_dir_all(dir).await?;
        self.fetch_attempts(job_id, dir.to_path_buf()).await
    }

    async fn fetch_attempts(&self, job_id: &JobId, dir: PathBuf) -> Result<FetchedOutput> {
        info!("getting results for job: {} into {}", job_id, dir.display());

        let mut attempts = 0;
        let mut succeeded = false;

        while attempts < self.max_attempts {
            if attempts > 0 && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
            attempts += 1;

            match self.client.get(job_id.as_str(), &dir).await {
                Ok(output) if output.status.success() => {
                    succeeded = true;
                    break;
                }
                Ok(output) => warn!(
                    "failed ({}) to get job {} (attempt {}/{}): {} {}",
                    output.status,
                    job_id,
                    attempts,
                    self.max_attempts,
                    output.stdout.trim(),
                    output.stderr.trim()
                ),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => warn!(
                    "failed to get job {} (attempt {}/{}): {}",
                    job_id, attempts, self.max_attempts, e
                ),
            }
        }

        if !succeeded {
            warn!(
                "giving up on results for job {} after {} attempts",
                job_id, attempts
            );
        }

        Ok(FetchedOutput {
            job_id: job_id.clone(),
            dir,
            attempts,
            succeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::subprocess::{BacalhauRunnerImpl, MockProcessRunner};
    use std::collections::BTreeMap;

    fn fetcher(mock: &MockProcessRunner, attempts: u32) -> ResultFetcher {
        let client = BacalhauRunnerImpl::new(Arc::new(mock.clone()), "bacalhau", BTreeMap::new());
        ResultFetcher::new(Arc::new(client), attempts, Duration::ZERO)
    }

    fn job(id: &str) -> JobId {
        JobId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau")
            .returns_exit_code(1)
            .times(2)
            .finish();
        mock.expect_command("bacalhau").returns_success().finish();

        let fetched = fetcher(&mock, 5).fetch(&job("j1")).await.unwrap();

        assert!(fetched.succeeded);
        assert_eq!(fetched.attempts, 3);
        assert!(fetched.dir.is_dir());
        assert!(mock.verify_called("bacalhau", 3));
        std::fs::remove_dir_all(&fetched.dir).unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau")
            .returns_exit_code(2)
            .returns_stdout("timeout contacting node")
            .finish();

        let fetched = fetcher(&mock, 5).fetch(&job("j1")).await.unwrap();

        assert!(!fetched.succeeded);
        assert_eq!(fetched.attempts, 5);
        assert!(mock.verify_called("bacalhau", 5));
        assert!(fetched.dir.is_dir());
        assert!(!fetched.has_artifact(Path::new("outputs/model.txt")));
        std::fs::remove_dir_all(&fetched.dir).unwrap();
    }

    #[tokio::test]
    async fn test_scratch_dirs_are_unique() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau").returns_success().finish();
        let fetcher = fetcher(&mock, 5);

        let first = fetcher.fetch(&job("j1")).await.unwrap();
        let second = fetcher.fetch(&job("j1")).await.unwrap();

        assert_ne!(first.dir, second.dir);
        assert!(first
            .dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));
        std::fs::remove_dir_all(&first.dir).unwrap();
        std::fs::remove_dir_all(&second.dir).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_into_passes_directory() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau").returns_success().finish();
        let temp = tempfile::TempDir::new().unwrap();
        let target = temp.path().join("final");

        let fetched = fetcher(&mock, 5)
            .fetch_into(&job("agg-1"), &target)
            .await
            .unwrap();

        assert_eq!(fetched.dir, target);
        assert!(target.is_dir());
        let args = &mock.get_call_history()[0].args;
        assert_eq!(args[2], target.to_string_lossy());
        assert_eq!(args[3], "agg-1");
    }

    #[tokio::test]
    async fn test_has_artifact() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("outputs")).unwrap();
        std::fs::write(temp.path().join("outputs/model.txt"), "0.5\n10\n").unwrap();

        let fetched = FetchedOutput {
            job_id: job("j1"),
            dir: temp.path().to_path_buf(),
            attempts: 1,
            succeeded: true,
        };

        assert!(fetched.has_artifact(Path::new("outputs/model.txt")));
        assert!(!fetched.has_artifact(Path::new("outputs/missing.txt")));
    }

    #[tokio::test]
    async fn test_missing_client_is_fatal() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("bacalhau").returns_not_found().finish();

        let temp = tempfile::TempDir::new().unwrap();
        let result = fetcher(&mock, 5).fetch_into(&job("j1"), temp.path()).await;

        assert!(matches!(result, Err(FlowError::Process(_))));
        assert!(mock.verify_called("bacalhau", 1));
    }
}
