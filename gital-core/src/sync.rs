//! Repository synchronizer
//!
//! Brings an existing checkout up to date: fetch every remote, then
//! fast-forward each local branch that tracks an upstream.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::git::{
    apply_plan, fetch_all, plan_update, FetchReport, GitAuth, GitRepo, GitRef, HeadState,
    RefSnapshot, UpdateDecision,
};
use crate::report::{Event, Reporter};
use crate::{Error, Result};

/// Outcome for one branch; `Err` holds a git error that stopped the update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResult {
    pub branch: String,
    pub outcome: std::result::Result<UpdateDecision, String>,
}

/// Everything one synchronization pass did
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Checked-out branch, `None` when HEAD is detached
    pub active_branch: Option<String>,
    pub fetch: FetchReport,
    /// Per-branch results in branch name order
    pub branches: Vec<BranchResult>,
}

impl SyncReport {
    /// Decision taken for `branch`, if it was processed without error
    pub fn decision(&self, branch: &str) -> Option<UpdateDecision> {
        self.branches
            .iter()
            .find(|b| b.branch == branch)
            .and_then(|b| b.outcome.clone().ok())
    }
}

/// Fetches and fast-forwards existing repositories
pub struct Synchronizer<'a> {
    reporter: &'a dyn Reporter,
    auth: GitAuth,
}

impl<'a> Synchronizer<'a> {
    pub fn new(reporter: &'a dyn Reporter, auth: GitAuth) -> Self {
        Self { reporter, auth }
    }

    /// Synchronize the repository at `path`, reporting the result
    ///
    /// Returns false if the repository could not be processed at all;
    /// skipped branches do not count as failures.
    pub fn update(&self, project: &str, path: &Path) -> bool {
        match self.run(path) {
            Ok(_) => {
                self.reporter.report(Event::Done {
                    project: project.to_string(),
                });
                true
            }
            Err(e) => {
                warn!(project, error = %e, "Update failed");
                self.reporter.report(Event::UpdateFailed {
                    project: project.to_string(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Synchronize the repository at `path`
    pub fn run(&self, path: &Path) -> Result<SyncReport> {
        let git = GitRepo::open(path)?;
        let repo = git.inner();

        let head = git.head_state()?;
        let active_branch = head.branch_name().map(str::to_string);
        self.reporter.report(Event::ActiveBranch {
            branch: active_branch.clone(),
        });

        let remotes = git.list_remotes()?;
        if remotes.is_empty() {
            return Err(Error::NoRemote(path.to_path_buf()));
        }

        let fetch = fetch_all(repo, &remotes, &self.auth, self.reporter);

        // Without a working tree nothing is "checked out" in the sense that
        // matters here: every branch can be moved by ref alone.
        let snapshot_head = if git.has_worktree() {
            head
        } else {
            HeadState::Detached
        };
        let snapshot = RefSnapshot::capture(repo, &snapshot_head)?;

        if fetch.aborted {
            verify_tracking_refs(&snapshot)?;
            info!(path = %path.display(), "Tracking refs verified after maintenance conflict");
        }

        let mut branches = Vec::new();
        for branch in snapshot.local_branches() {
            self.reporter.report(Event::BranchUpdate {
                branch: branch.name.clone(),
            });

            let result = plan_update(branch, snapshot.upstream_state(branch), repo)
                .and_then(|plan| apply_plan(repo, branch, plan));

            let outcome = match result {
                Ok((decision, detail)) => {
                    debug!(branch = %branch.name, %decision, ?detail, "Branch processed");
                    self.reporter.report(Event::BranchUpdated {
                        branch: branch.name.clone(),
                        decision,
                        detail,
                    });
                    Ok(decision)
                }
                Err(e) => {
                    warn!(branch = %branch.name, error = %e, "Branch update failed");
                    self.reporter.report(Event::BranchFailed {
                        branch: branch.name.clone(),
                        reason: e.to_string(),
                    });
                    Err(e.to_string())
                }
            };

            branches.push(BranchResult {
                branch: branch.name.clone(),
                outcome,
            });
        }

        Ok(SyncReport {
            active_branch,
            fetch,
            branches,
        })
    }
}

/// After a maintenance conflict, make sure every upstream that exists still
/// resolves to a commit before any branch is moved
fn verify_tracking_refs(snapshot: &RefSnapshot) -> Result<()> {
    for branch in snapshot.local_branches() {
        let Some(upstream) = branch.upstream.as_deref() else {
            continue;
        };
        if let Some(reference) = snapshot.get(upstream) {
            if reference.commit().is_none() {
                return Err(Error::Other(format!(
                    "Fetch was interrupted by repository maintenance and {} cannot be \
                     resolved; branches were not updated",
                    upstream
                )));
            }
        }
    }
    Ok(())
}
