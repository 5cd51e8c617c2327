use super::{ConfigError, WorkflowConfig};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Environment variables that override individual config keys.
const ENV_EXECUTABLE: &str = "CIDFLOW_EXECUTABLE";
const ENV_IMAGE: &str = "CIDFLOW_IMAGE";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from an optional TOML file, apply environment overrides,
    /// then validate.
    pub async fn load(path: Option<&Path>) -> Result<WorkflowConfig, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_file(path).await?,
            None => WorkflowConfig::default(),
        };

        Self::merge_env_vars(&mut config, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    async fn load_file(path: &Path) -> Result<WorkflowConfig, ConfigError> {
        debug!("Loading workflow config from {}", path.display());

        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn merge_env_vars<F>(config: &mut WorkflowConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(executable) = lookup(ENV_EXECUTABLE) {
            debug!("{} overrides executable", ENV_EXECUTABLE);
            config.executable = executable;
        }
        if let Some(image) = lookup(ENV_IMAGE) {
            debug!("{} overrides image", ENV_IMAGE);
            config.image = image;
        }
    }
}
