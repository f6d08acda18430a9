//! Store configuration.
//!
//! ```yaml
//! policies: ./policies.yaml
//! format: yaml          # optional, guessed from the extension
//! engine:
//!   maxConditionDepth: 16
//! ```

use std::path::{Path, PathBuf};

use gatepdp::PolicyConfig;
use serde::{Deserialize, Serialize};

use crate::document::Format;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("cannot tell the format of config {}", .0.display())]
    UnknownFormat(PathBuf),
}

/// Where the policies live and which limits apply to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Policy document. Relative paths are resolved against the config file.
    pub policies: PathBuf,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub engine: PolicyConfig,
}

impl StoreConfig {
    pub fn new(policies: impl Into<PathBuf>) -> Self {
        StoreConfig {
            policies: policies.into(),
            format: None,
            engine: PolicyConfig::default(),
        }
    }

    /// Load from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = Format::from_path(path).ok_or_else(|| ConfigError::UnknownFormat(path.to_path_buf()))?;
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&contents, format).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        if config.policies.is_relative() {
            if let Some(base) = path.parent() {
                config.policies = base.join(&config.policies);
            }
        }
        tracing::debug!(config = %path.display(), policies = %config.policies.display(), "loaded store config");
        Ok(config)
    }

    fn parse(contents: &str, format: Format) -> Result<Self, String> {
        match format {
            Format::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        }
    }
}
