use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::SystemSettings;

/// Engine configuration loaded from a TOML file with environment-variable
/// overrides layered on top. Doubles as the [`SystemSettings`] collaborator
/// for deployments that configure the engine statically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub approval: ApprovalConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Mirrors the acceptance-required-for-approval system setting.
    #[serde(default)]
    pub acceptance_required: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
}

const ENV_ACCEPTANCE_REQUIRED: &str = "CASCADE_ACCEPTANCE_REQUIRED";

impl EngineConfig {
    /// Loads from the given file when present, then applies process
    /// environment overrides. With no path the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_overrides(env::vars())?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        toml::from_str(&raw)
            .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
    }

    /// Applies recognized environment overrides from any (key, value)
    /// source; unknown keys are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if key == ENV_ACCEPTANCE_REQUIRED {
                self.approval.acceptance_required = parse_bool(&key, &value)?;
            }
        }
        Ok(())
    }
}

impl SystemSettings for EngineConfig {
    fn acceptance_required_for_approval(&self) -> bool {
        self.approval.acceptance_required
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_owned(), value: value.to_owned() }),
    }
}
