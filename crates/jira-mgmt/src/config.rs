//! Configuration file loading and saving.
//!
//! Settings live in a TOML file, by default
//! `$XDG_CONFIG_HOME/jira-mgmt/config.toml`. A missing file yields defaults.
//! The API token is never stored here; it is read from [`TOKEN_ENV`].

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::jira::{AuthType, InstanceType};

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "JIRA_API_TOKEN";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "JIRA_MGMT_CONFIG";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL, e.g. `https://example.atlassian.net`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
    /// Account email for basic auth (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `cloud` or `server`; detected from the instance when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<InstanceType>,
    /// `basic` or `bearer`; inferred from `email` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
    /// Project used when a statement names none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_project: Option<String>,
    /// Board used by `summary()` when none is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_board: Option<u64>,
    /// HTTP timeout in seconds (default: 30).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load configuration from `path` if it exists.
    ///
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Write the configuration, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Configured project, ignoring blank values.
    pub fn project(&self) -> Option<&str> {
        self.active_project
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Configured board, ignoring zero.
    pub fn board(&self) -> Option<u64> {
        self.active_board.filter(|id| *id > 0)
    }
}

/// `<config dir>/jira-mgmt/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jira-mgmt").join("config.toml"))
}

/// Explicit path (flag or [`CONFIG_ENV`]) if given, otherwise the default.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().ok_or_else(|| {
            anyhow!(
                "Could not determine a config directory; pass --config or set {}",
                CONFIG_ENV
            )
        }),
    }
}
