//! Cloning a project into the group directory

use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{ErrorClass, ErrorCode, FetchOptions};
use tracing::{debug, info};

use super::credentials::GitAuth;
use crate::{Error, Result};

/// Suffix of the staging directory a clone is written to before it is
/// moved into place
const STAGING_SUFFIX: &str = ".gital-partial";

/// Options for a clone
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Branch to check out; the remote HEAD when unset
    pub branch: Option<String>,
    pub auth: GitAuth,
}

/// Staging directory used while cloning into `target`
///
/// `group/billing` is cloned into `group/.billing.gital-partial` first.
pub fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}{STAGING_SUFFIX}"))
}

/// Clone `url` into `target`
///
/// The clone is written to a staging directory and renamed into place only
/// once it is complete, so an interrupted clone never shows up at `target`.
/// A staging directory left behind by an earlier interrupted run is removed
/// first.
pub fn clone_repo(url: &str, target: &Path, options: &CloneOptions) -> Result<PathBuf> {
    if target.exists() {
        return Err(Error::Other(format!(
            "Destination {} already exists",
            target.display()
        )));
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let staging = staging_path(target);
    if staging.exists() {
        debug!(path = %staging.display(), "Removing leftover partial clone");
        std::fs::remove_dir_all(&staging)?;
    }

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(options.auth.callbacks());

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    if let Some(branch) = options.branch.as_deref() {
        builder.branch(branch);
    }

    debug!(url, path = %staging.display(), "Cloning");
    match builder.clone(url, &staging) {
        Ok(repo) => drop(repo),
        Err(e) => {
            // Best effort: a half-written staging dir is retried next run anyway
            let _ = std::fs::remove_dir_all(&staging);
            return Err(Error::Other(describe_clone_error(url, &e)));
        }
    }

    std::fs::rename(&staging, target)?;
    info!(url, path = %target.display(), "Clone completed");

    Ok(target.to_path_buf())
}

/// Turn a clone error into a message naming the likely cause
fn describe_clone_error(url: &str, err: &git2::Error) -> String {
    if err.code() == ErrorCode::Auth || err.class() == ErrorClass::Ssh {
        return format!(
            "Authentication failed for {}. Check your credentials or repository access.",
            url
        );
    }

    if matches!(err.class(), ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssl) {
        return format!(
            "Network error cloning {}: {}",
            url,
            err.message().trim_end_matches('.')
        );
    }

    if err.code() == ErrorCode::NotFound {
        return format!(
            "Repository or branch not found: {}. Check the URL is correct.",
            url
        );
    }

    format!("git clone failed: {}", err.message())
}
