//! Secrets management for gital
//!
//! The GitLab private token is stored separately from configuration to avoid
//! accidental sharing. The secrets file is located at
//! `~/.config/gital/secrets.toml` and must have restrictive permissions
//! (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variable (GITLAB_PRIVATE_TOKEN)
//! 2. Secrets file (~/.config/gital/secrets.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Environment variable holding the private token
pub const TOKEN_ENV: &str = "GITLAB_PRIVATE_TOKEN";

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// GitLab configuration
    pub gitlab: GitLabSecrets,
}

/// GitLab-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitLabSecrets {
    /// GitLab personal access token, sent as `PRIVATE-TOKEN`
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path)?.permissions().mode();

            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        if let Some(ref mut token) = secrets.gitlab.token {
            *token = token.trim().to_string();
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/gital/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gital").join("secrets.toml"))
    }

    /// Get the GitLab token with environment variable override
    pub fn gitlab_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                debug!("Using GitLab token from {} environment variable", TOKEN_ENV);
                return Some(token);
            }
        }

        self.file_token()
    }

    fn file_token(&self) -> Option<String> {
        self.gitlab
            .token
            .as_ref()
            .filter(|t| !t.is_empty())
            .cloned()
    }

    /// Like [`Secrets::gitlab_token`], but a missing token is a fatal error
    pub fn require_gitlab_token(&self) -> Result<String> {
        self.gitlab_token().ok_or_else(|| {
            Error::ConfigurationMissing(
                "You need to specify your gitlab user's private token in the secrets file \
                 or the GITLAB_PRIVATE_TOKEN environment variable."
                    .to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_secrets() {
        let secrets = Secrets::default();
        assert!(secrets.gitlab.token.is_none());
        assert!(secrets.file_token().is_none());
    }

    #[test]
    fn test_parse_secrets() {
        let toml = r#"
[gitlab]
token = "glpat-xxxxxxxxxxxx"
"#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.file_token().as_deref(), Some("glpat-xxxxxxxxxxxx"));
    }

    #[test]
    fn test_empty_token_is_absent() {
        let secrets = Secrets {
            gitlab: GitLabSecrets {
                token: Some(String::new()),
            },
        };
        assert!(secrets.file_token().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[gitlab]\ntoken = \"test\"").unwrap();

        let perms = std::fs::Permissions::from_mode(0o644);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let result = Secrets::load_from_file(file.path());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("insecure permissions"));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_permissions_accepted_and_trimmed() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[gitlab]\ntoken = \"  glpat-test \"").unwrap();

        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(file.path(), perms).unwrap();

        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.gitlab.token.as_deref(), Some("glpat-test"));
    }
}
