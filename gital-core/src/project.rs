//! Projects and groups as seen by the orchestrator

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// A repository belonging to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Display name
    pub name: String,
    /// Path relative to the group directory
    pub path: String,
    /// URL to clone from
    pub clone_url: String,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        clone_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            clone_url: clone_url.into(),
        }
    }

    /// Resolve the project's checkout directory under `group_dir`
    ///
    /// Rejects absolute paths and anything that climbs out of the group
    /// directory.
    pub fn local_path(&self, group_dir: &Path) -> Result<PathBuf> {
        let relative = Path::new(&self.path);
        let safe = !self.path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        if !safe {
            return Err(Error::InvalidProjectPath(self.path.clone()));
        }

        Ok(group_dir.join(relative))
    }
}

/// A group of projects and its local directory
#[derive(Debug, Clone)]
pub struct Group {
    /// Group key as passed on the command line
    pub key: String,
    /// `root/key`
    pub directory: PathBuf,
}

impl Group {
    pub fn new(key: impl Into<String>, root: &Path) -> Self {
        let key = key.into();
        let directory = root.join(&key);
        Self { key, directory }
    }

    /// Create the group directory if missing
    ///
    /// Returns true if the directory was created by this call.
    pub fn ensure_directory(&self) -> Result<bool> {
        if self.directory.is_dir() {
            return Ok(false);
        }

        std::fs::create_dir_all(&self.directory)?;
        Ok(true)
    }
}
