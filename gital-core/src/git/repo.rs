//! Git repository access

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository};

use crate::{Error, Result};

/// Information about a git remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Name of the remote (e.g., "origin")
    pub name: String,
    /// URL of the remote, if configured
    pub url: Option<String>,
    /// Configured fetch refspecs; empty for push-only remotes
    pub fetch_refspecs: Vec<String>,
}

impl RemoteInfo {
    /// Whether a plain `git fetch <remote>` would do anything
    pub fn has_fetch_refspec(&self) -> bool {
        !self.fetch_refspecs.is_empty()
    }
}

/// What HEAD points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// On a branch with at least one commit
    Branch(String),
    /// On a branch that has no commits yet
    Unborn(String),
    /// Not on any branch
    Detached,
}

impl HeadState {
    /// Name of the checked-out branch, born or not
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            HeadState::Branch(name) | HeadState::Unborn(name) => Some(name),
            HeadState::Detached => None,
        }
    }
}

/// A git repository wrapper providing the operations the synchronizer needs
pub struct GitRepo {
    /// The underlying git2 repository
    repo: Repository,
    /// Path the repository was opened at
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open the git repository at exactly `path`
    ///
    /// Unlike discovery, parent directories are not searched: a project
    /// directory without its own `.git` is reported as [`Error::RepoNotFound`]
    /// even when the group directory lives inside another repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::open(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::RepoNotFound(path.to_path_buf())
            } else {
                Error::Git(e)
            }
        })?;

        Ok(Self {
            repo,
            root: path.to_path_buf(),
        })
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if the given path holds a git repository
    pub fn is_git_repo(path: impl AsRef<Path>) -> bool {
        Repository::open(path.as_ref()).is_ok()
    }

    /// Whether the repository has a working tree
    pub fn has_worktree(&self) -> bool {
        !self.repo.is_bare()
    }

    /// Determine what HEAD points at
    pub fn head_state(&self) -> Result<HeadState> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head
                .shorthand()
                .map(|s| HeadState::Branch(s.to_string()))
                .unwrap_or(HeadState::Detached)),
            Ok(_) => Ok(HeadState::Detached),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let head = self.repo.find_reference("HEAD")?;
                let name = head
                    .symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(str::to_string);
                Ok(name.map(HeadState::Unborn).unwrap_or(HeadState::Detached))
            }
            Err(e) => Err(Error::Git(e)),
        }
    }

    /// List all remotes with their fetch refspecs
    pub fn list_remotes(&self) -> Result<Vec<RemoteInfo>> {
        let names = self.repo.remotes()?;

        let mut result = Vec::new();
        for name in names.iter().flatten() {
            let remote = self.repo.find_remote(name)?;
            let fetch_refspecs = remote
                .fetch_refspecs()?
                .iter()
                .flatten()
                .map(str::to_string)
                .collect();

            result.push(RemoteInfo {
                name: name.to_string(),
                url: remote.url().map(str::to_string),
                fetch_refspecs,
            });
        }

        Ok(result)
    }

    /// Get access to the underlying git2 repository
    pub fn inner(&self) -> &Repository {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testutil::{commit_file, init_repo};
    use tempfile::TempDir;

    #[test]
    fn test_open_non_git_dir() {
        let dir = TempDir::new().unwrap();
        let result = GitRepo::open(dir.path());
        assert!(matches!(result, Err(Error::RepoNotFound(_))));
        assert!(!GitRepo::is_git_repo(dir.path()));
    }

    #[test]
    fn test_open_does_not_search_parents() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        assert!(matches!(GitRepo::open(&nested), Err(Error::RepoNotFound(_))));
    }

    #[test]
    fn test_head_state_unborn_then_branch() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        let git = GitRepo::open(dir.path()).unwrap();

        assert_eq!(git.head_state().unwrap(), HeadState::Unborn("main".to_string()));

        commit_file(&repo, "README", "hello\n", "initial");
        assert_eq!(git.head_state().unwrap(), HeadState::Branch("main".to_string()));
    }

    #[test]
    fn test_head_state_detached() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        let oid = commit_file(&repo, "README", "hello\n", "initial");
        repo.set_head_detached(oid).unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        let head = git.head_state().unwrap();
        assert_eq!(head, HeadState::Detached);
        assert_eq!(head.branch_name(), None);
    }

    #[test]
    fn test_list_remotes_reports_missing_refspec() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        repo.remote("origin", "https://example.com/a.git").unwrap();
        repo.config()
            .unwrap()
            .set_str("remote.pushonly.url", "https://example.com/c.git")
            .unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        let remotes = git.list_remotes().unwrap();

        let origin = remotes.iter().find(|r| r.name == "origin").unwrap();
        assert!(origin.has_fetch_refspec());
        assert_eq!(origin.url.as_deref(), Some("https://example.com/a.git"));

        let push_only = remotes.iter().find(|r| r.name == "pushonly").unwrap();
        assert!(!push_only.has_fetch_refspec());
    }
}
