//! Workflow configuration
//!
//! Every tunable the orchestrator needs (client executable, container image,
//! polling cadence, fetch retry cap, parallelism) lives in [`WorkflowConfig`],
//! which is handed to the orchestrator at construction. Values come from
//! defaults, an optional TOML file, and a handful of environment overrides.

pub mod loader;

pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Execution network client binary
    pub executable: String,

    /// Container image every job runs in
    pub image: String,

    /// Command run inside the container before the job-type flag
    pub entry_point: Vec<String>,

    /// URI scheme prefixed to content references (`ipfs://`)
    pub input_scheme: String,

    /// Mount root for job inputs inside the container
    pub input_mount: String,

    /// Directory the job payload writes its results to
    pub output_mount: String,

    /// Delay between polling rounds
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Maximum number of fetch attempts per job
    pub fetch_attempts: u32,

    /// Delay between failed fetch attempts
    #[serde(with = "humantime_serde")]
    pub fetch_retry_delay: Duration,

    /// Worker pool size; defaults to available processing units
    pub max_parallel: Option<usize>,

    /// Stop the run as soon as any job reports `Error`
    pub halt_on_job_error: bool,

    /// File expected inside a fetched result directory
    pub expected_artifact: PathBuf,

    /// Destination for the final artifact; a scratch directory when unset
    pub output_dir: Option<PathBuf>,

    /// Extra environment passed to every client invocation
    pub env: BTreeMap<String, String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            executable: "bacalhau".to_string(),
            image: "filipmasar/eth-lisbon:ml9".to_string(),
            entry_point: vec!["python".to_string(), "main.py".to_string()],
            input_scheme: "ipfs://".to_string(),
            input_mount: "/inputs".to_string(),
            output_mount: "/outputs".to_string(),
            poll_interval: Duration::from_secs(2),
            fetch_attempts: 5,
            fetch_retry_delay: Duration::ZERO,
            max_parallel: None,
            halt_on_job_error: true,
            expected_artifact: PathBuf::from("outputs/model.txt"),
            output_dir: None,
            env: BTreeMap::new(),
        }
    }
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executable.trim().is_empty() {
            return Err(invalid("executable", "must not be empty"));
        }
        if self.image.trim().is_empty() {
            return Err(invalid("image", "must not be empty"));
        }
        if self.entry_point.is_empty() {
            return Err(invalid("entry_point", "must name a command"));
        }
        if !self.input_mount.starts_with('/') {
            return Err(invalid("input_mount", "must be an absolute path"));
        }
        if !self.output_mount.starts_with('/') {
            return Err(invalid("output_mount", "must be an absolute path"));
        }
        if self.fetch_attempts == 0 {
            return Err(invalid("fetch_attempts", "must be at least 1"));
        }
        if self.max_parallel == Some(0) {
            return Err(invalid("max_parallel", "must be at least 1"));
        }
        Ok(())
    }

    /// Pool size used for submission and polling fan-out
    pub fn parallelism(&self) -> usize {
        self.max_parallel.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        })
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_attempts, 5);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(config.parallelism() >= 1);
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config: WorkflowConfig = toml::from_str(
            r#"
            image = "example/stats:2"
            poll_interval = "500ms"
            max_parallel = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.image, "example/stats:2");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.parallelism(), 3);
        assert_eq!(config.executable, "bacalhau");
        assert_eq!(config.fetch_attempts, 5);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = toml::from_str::<WorkflowConfig>("retries = 3");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_failures() {
        let config = WorkflowConfig {
            fetch_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "fetch_attempts",
                ..
            })
        ));

        let config = WorkflowConfig {
            input_mount: "inputs".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkflowConfig {
            max_parallel: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
