//! Configuration management for gital
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GITAL_*)
//! 3. Config file (~/.config/gital/config.toml)
//! 4. Default values
//!
//! The private token is not part of this file, see [`crate::Secrets`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default timeout for the group inventory request
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Which clone URL of a project to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    /// `ssh_url_to_repo`
    #[default]
    Ssh,
    /// `http_url_to_repo`
    Https,
}

/// GitLab connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// Base URL of the GitLab instance, e.g. `https://gitlab.example.com/`
    pub url: Option<String>,

    /// API path appended to the base URL, e.g. `api/v4/`
    pub postfix: Option<String>,

    /// Timeout for the inventory request, in seconds
    pub timeout_secs: u64,

    /// Clone over SSH or HTTPS
    pub clone_protocol: CloneProtocol,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: None,
            postfix: None,
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            clone_protocol: CloneProtocol::default(),
        }
    }
}

/// Clone settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CloneConfig {
    /// Branch to check out after cloning; the remote HEAD when unset
    pub branch: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// GitLab settings
    pub gitlab: GitLabConfig,

    /// Clone settings
    pub clone: CloneConfig,
}

/// The GitLab endpoint once all required values are known
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub postfix: String,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/gital/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gital").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GITAL_URL: GitLab base URL
    /// - GITAL_POSTFIX: API path postfix
    /// - GITAL_TIMEOUT: inventory request timeout in seconds
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("GITAL_URL") {
            self.gitlab.url = Some(url);
        }

        if let Ok(postfix) = std::env::var("GITAL_POSTFIX") {
            self.gitlab.postfix = Some(postfix);
        }

        if let Some(secs) = std::env::var("GITAL_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            self.gitlab.timeout_secs = secs;
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, url: Option<String>, postfix: Option<String>) -> Self {
        if let Some(url) = url {
            self.gitlab.url = Some(url);
        }

        if let Some(postfix) = postfix {
            self.gitlab.postfix = Some(postfix);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(url: Option<String>, postfix: Option<String>) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(url, postfix))
    }

    /// Check that the base URL and postfix are present
    pub fn endpoint(&self) -> Result<Endpoint> {
        let url = non_empty(self.gitlab.url.as_deref()).ok_or_else(|| {
            Error::ConfigurationMissing("You need to specify gitlab url.".to_string())
        })?;
        let postfix = non_empty(self.gitlab.postfix.as_deref()).ok_or_else(|| {
            Error::ConfigurationMissing("You need to specify gitlab url postfix.".to_string())
        })?;

        Ok(Endpoint {
            url: url.to_string(),
            postfix: postfix.to_string(),
            timeout: Duration::from_secs(self.gitlab.timeout_secs),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
