pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vmaas_cloud::RetryPolicies;
use vmaas_cloud_cmp::{ApiShape, ClientConfig};

pub const ENV_CONFIG_PATH: &str = "VMAAS_CONFIG_PATH";
pub const ENV_API_URL: &str = "VMAAS_API_URL";
pub const ENV_TOKEN: &str = "VMAAS_TOKEN";
pub const ENV_SERVICE_INSTANCE: &str = "VMAAS_SERVICE_INSTANCE";

/// Connection and retry settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub api_shape: ApiShape,

    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Locate the config file, apply environment overrides and validate
    ///
    /// A missing file is not an error as long as the environment supplies
    /// the URL and token.
    pub fn load() -> Result<Self> {
        let base = match find_config_file() {
            Ok(path) => Self::from_file(&path)?,
            Err(ConfigError::ConfigFileNotFound) => {
                tracing::debug!("no config file found, using environment only");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        let settings = base.with_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Environment variables win over values from the file
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = non_empty_env(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(token) = non_empty_env(ENV_TOKEN) {
            self.token = token;
        }
        if let Some(id) = non_empty_env(ENV_SERVICE_INSTANCE) {
            self.api_shape = ApiShape::ServiceInstance { id };
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::MissingSetting("api_url", ENV_API_URL));
        }
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingSetting("token", ENV_TOKEN));
        }
        if let ApiShape::ServiceInstance { id } = &self.api_shape {
            if id.trim().is_empty() {
                return Err(ConfigError::MissingSetting(
                    "api_shape.id",
                    ENV_SERVICE_INSTANCE,
                ));
            }
        }
        self.retry.validate()?;
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_url, &self.token).with_api_shape(self.api_shape.clone())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Global config directory (`~/.config/vmaas`)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("vmaas");
    Ok(config_dir)
}

/// Find the settings file
///
/// Search order:
/// 1. `VMAAS_CONFIG_PATH` (direct path)
/// 2. current directory: `vmaas.yaml`
/// 3. `./.vmaas/vmaas.yaml`
/// 4. `~/.config/vmaas/config.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    let local = current_dir.join("vmaas.yaml");
    if local.exists() {
        return Ok(local);
    }

    let project = current_dir.join(".vmaas").join("vmaas.yaml");
    if project.exists() {
        return Ok(project);
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}
