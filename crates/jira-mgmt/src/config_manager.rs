//! Configuration management layer.
//!
//! Turns the on-disk [`AppConfig`] into what the rest of the tool needs: a
//! [`ClientConfig`] for the HTTP client and the [`ScopeDefaults`] consulted by
//! the query executor. Also persists the `config set-*` commands.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::errors::{instance_not_configured, token_missing};
use crate::jira::{AuthType, ClientConfig, InstanceType};
use crate::query::ScopeDefaults;

/// Manages loading and updating the config file at one path.
///
/// # Examples
///
/// ```no_run
/// use jira_mgmt::config_manager::ConfigManager;
///
/// let manager = ConfigManager::new("/home/me/.config/jira-mgmt/config.toml");
/// manager.set_active_project("PROJ").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns defaults if the file doesn't exist.
    pub fn load(&self) -> Result<AppConfig> {
        AppConfig::load(&self.path)
    }

    fn update<F: FnOnce(&mut AppConfig)>(&self, change: F) -> Result<AppConfig> {
        let mut config = self.load()?;
        change(&mut config);
        config.save(&self.path)?;
        Ok(config)
    }

    pub fn set_active_project(&self, project: &str) -> Result<AppConfig> {
        let project = project.trim().to_string();
        self.update(|c| c.active_project = Some(project))
    }

    pub fn set_active_board(&self, board: u64) -> Result<AppConfig> {
        self.update(|c| c.active_board = Some(board))
    }

    pub fn set_instance(
        &self,
        url: &str,
        email: Option<String>,
        instance_type: Option<InstanceType>,
        auth_type: Option<AuthType>,
    ) -> Result<AppConfig> {
        let url = url.trim().trim_end_matches('/').to_string();
        self.update(|c| {
            c.instance_url = Some(url);
            c.email = email;
            c.instance_type = instance_type;
            c.auth_type = auth_type;
        })
    }
}

/// Configured scope, with command-line overrides taking precedence.
pub fn scope_from(
    config: &AppConfig,
    project_override: Option<&str>,
    board_override: Option<u64>,
) -> ScopeDefaults {
    let project = project_override
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .or_else(|| config.project())
        .map(str::to_string);
    let board = board_override.filter(|id| *id > 0).or_else(|| config.board());
    ScopeDefaults { project, board }
}

/// Client settings for the configured instance.
///
/// Fails with an actionable error when the instance URL or the token is
/// missing.
pub fn client_config_from(config: &AppConfig, token: Option<String>) -> Result<ClientConfig> {
    let base_url = config
        .instance_url
        .clone()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(instance_not_configured)?;
    let token = token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| token_missing(crate::config::TOKEN_ENV))?;

    Ok(ClientConfig {
        base_url,
        email: config.email.clone(),
        token,
        instance_type: config.instance_type.unwrap_or_default(),
        auth_type: config.auth_type,
        timeout: config.timeout(),
    })
}
