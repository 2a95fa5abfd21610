//! Clone orchestrator
//!
//! Walks the projects of a group: clones what is missing, and either skips or
//! synchronizes what is already there. Every project is handled on its own;
//! one failure never stops the batch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::git::{clone_repo, CloneOptions, GitAuth};
use crate::project::{Group, Project};
use crate::report::{Event, EventBuffer, Reporter};
use crate::sync::Synchronizer;
use crate::{Error, Result};

/// What happened to one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectStatus {
    Cloned,
    CloneFailed(String),
    AlreadyPresent,
    Updated,
    UpdateFailed,
    Invalid(String),
    /// Not started because the batch was cancelled
    Cancelled,
}

/// Per-status counts for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub cloned: usize,
    pub present: usize,
    pub updated: usize,
    pub failed: usize,
}

impl Tally {
    pub fn from_statuses(statuses: &[ProjectStatus]) -> Self {
        let mut tally = Tally::default();
        for status in statuses {
            match status {
                ProjectStatus::Cloned => tally.cloned += 1,
                ProjectStatus::AlreadyPresent => tally.present += 1,
                ProjectStatus::Updated => tally.updated += 1,
                ProjectStatus::CloneFailed(_)
                | ProjectStatus::UpdateFailed
                | ProjectStatus::Invalid(_) => tally.failed += 1,
                ProjectStatus::Cancelled => {}
            }
        }
        tally
    }
}

/// Shared flag telling the orchestrator to stop starting new projects
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Synchronize projects that are already cloned instead of skipping them
    pub update_existing: bool,
    /// Branch to clone; remote HEAD when unset
    pub clone_branch: Option<String>,
    pub auth: GitAuth,
}

/// Clones or updates every project of a group
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    options: OrchestratorOptions,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(options: OrchestratorOptions) -> Self {
        Self {
            options,
            cancel: CancelFlag::new(),
        }
    }

    /// Use `cancel` to stop the batch from outside
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process `projects` one after another under `root/group_key`
    pub fn sync(
        &self,
        group_key: &str,
        projects: &[Project],
        root: &Path,
        reporter: &dyn Reporter,
    ) -> Result<Vec<ProjectStatus>> {
        let group = self.prepare_group(group_key, root, reporter)?;

        let statuses: Vec<ProjectStatus> = projects
            .iter()
            .map(|project| {
                process_project(project, &group.directory, &self.options, &self.cancel, reporter)
            })
            .collect();

        reporter.report(Event::Summary(Tally::from_statuses(&statuses)));
        Ok(statuses)
    }

    /// Process up to `jobs` projects at a time
    ///
    /// Each project's events are buffered and replayed as one block, in
    /// project order, so output matches a sequential run.
    pub async fn sync_concurrent(
        &self,
        group_key: &str,
        projects: Vec<Project>,
        root: &Path,
        jobs: usize,
        reporter: &dyn Reporter,
    ) -> Result<Vec<ProjectStatus>> {
        let group = self.prepare_group(group_key, root, reporter)?;
        let semaphore = Arc::new(Semaphore::new(jobs.max(1)));

        let mut handles = Vec::with_capacity(projects.len());
        for project in projects {
            let semaphore = Arc::clone(&semaphore);
            let group_dir = group.directory.clone();
            let options = self.options.clone();
            let cancel = self.cancel.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Other(e.to_string()))?;

                tokio::task::spawn_blocking(move || {
                    let buffer = EventBuffer::new();
                    let status = process_project(&project, &group_dir, &options, &cancel, &buffer);
                    (status, buffer)
                })
                .await
                .map_err(|e| Error::Other(format!("Project worker failed: {}", e)))
            }));
        }

        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            let joined = handle
                .await
                .map_err(|e| Error::Other(format!("Project worker failed: {}", e)));

            match joined.and_then(|inner| inner) {
                Ok((status, buffer)) => {
                    buffer.replay(reporter);
                    statuses.push(status);
                }
                Err(e) => {
                    warn!(error = %e, "Project worker lost");
                    statuses.push(ProjectStatus::UpdateFailed);
                }
            }
        }

        reporter.report(Event::Summary(Tally::from_statuses(&statuses)));
        Ok(statuses)
    }

    fn prepare_group(&self, group_key: &str, root: &Path, reporter: &dyn Reporter) -> Result<Group> {
        let group = Group::new(group_key, root);
        let created = group.ensure_directory()?;
        debug!(group = %group.key, path = %group.directory.display(), created, "Group directory ready");

        reporter.report(Event::GroupDirectory {
            group: group.key.clone(),
            path: group.directory.clone(),
            created,
        });
        Ok(group)
    }
}

/// Clone, skip or synchronize one project
fn process_project(
    project: &Project,
    group_dir: &Path,
    options: &OrchestratorOptions,
    cancel: &CancelFlag,
    reporter: &dyn Reporter,
) -> ProjectStatus {
    if cancel.is_cancelled() {
        return ProjectStatus::Cancelled;
    }

    let path: PathBuf = match project.local_path(group_dir) {
        Ok(path) => path,
        Err(e) => {
            warn!(project = %project.name, error = %e, "Skipping project");
            reporter.report(Event::InvalidProject {
                project: project.name.clone(),
                reason: e.to_string(),
            });
            return ProjectStatus::Invalid(e.to_string());
        }
    };

    if !path.exists() {
        reporter.report(Event::CloneStarted {
            project: project.name.clone(),
        });

        let clone_options = CloneOptions {
            branch: options.clone_branch.clone(),
            auth: options.auth.clone(),
        };

        return match clone_repo(&project.clone_url, &path, &clone_options) {
            Ok(_) => {
                info!(project = %project.name, "Cloned");
                reporter.report(Event::CloneCompleted {
                    project: project.name.clone(),
                });
                ProjectStatus::Cloned
            }
            Err(e) => {
                warn!(project = %project.name, error = %e, "Clone failed");
                reporter.report(Event::CloneFailed {
                    project: project.name.clone(),
                    reason: e.to_string(),
                });
                ProjectStatus::CloneFailed(e.to_string())
            }
        };
    }

    if !options.update_existing {
        reporter.report(Event::AlreadyPresent {
            project: project.name.clone(),
        });
        return ProjectStatus::AlreadyPresent;
    }

    reporter.report(Event::UpdateStarted {
        project: project.name.clone(),
    });

    let synchronizer = Synchronizer::new(reporter, options.auth.clone());
    if synchronizer.update(&project.name, &path) {
        ProjectStatus::Updated
    } else {
        ProjectStatus::UpdateFailed
    }
}
