//! Error types for gital

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for gital operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gital operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by libgit2
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// A required configuration value is absent
    #[error("{0}")]
    ConfigurationMissing(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No repository metadata at the given path
    #[error("No git repository found at {}", .0.display())]
    RepoNotFound(PathBuf),

    /// The repository has no remotes to synchronize against
    #[error("Repository at {} has no remotes", .0.display())]
    NoRemote(PathBuf),

    /// A project path that would escape the group directory
    #[error("Invalid project path '{0}'")]
    InvalidProjectPath(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
