//! Launcher settings loaded from YAML

use crate::backend::{BackendClientConfig, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the user's config directory
pub const SETTINGS_FILE: &str = "settings.yaml";

/// Directory under the user's config directory
pub const SETTINGS_DIR: &str = "pipeline-launcher";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Top-level settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LauncherSettings {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub wait: WaitSettings,
}

/// Where and how to reach the orchestration backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSettings {
    /// Base URL of the backend API
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Polling behaviour while waiting for an execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitSettings {
    #[serde(default)]
    pub delay_secs: Option<u64>,

    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl LauncherSettings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        // An empty document deserializes to null, which means all defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: LauncherSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from an explicit path, or from the default location if a file exists there
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/pipeline-launcher/settings.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.backend.request_timeout_secs == Some(0) {
            return Err(SettingsError::Invalid(
                "backend.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.wait.max_attempts == Some(0) {
            return Err(SettingsError::Invalid(
                "wait.max_attempts must be greater than 0".to_string(),
            ));
        }
        if let Some(endpoint) = &self.backend.endpoint {
            if endpoint.trim().is_empty() {
                return Err(SettingsError::Invalid(
                    "backend.endpoint must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Client configuration with an optional endpoint override from the command line
    pub fn client_config(&self, endpoint_override: Option<&str>) -> BackendClientConfig {
        let mut config = BackendClientConfig::default();

        if let Some(endpoint) = endpoint_override.or(self.backend.endpoint.as_deref()) {
            config = config.with_endpoint(endpoint.to_string());
        }
        if let Some(timeout) = self.backend.request_timeout_secs {
            config = config.with_timeout(timeout);
        }

        let defaults = WaitPolicy::default();
        config.with_wait(WaitPolicy {
            delay_secs: self.wait.delay_secs.unwrap_or(defaults.delay_secs),
            max_attempts: self.wait.max_attempts.or(defaults.max_attempts),
        })
    }
}
