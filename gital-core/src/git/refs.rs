//! Snapshot of the references in a repository
//!
//! Branches, remote-tracking branches and tags are resolved once per
//! synchronization pass into plain values, so the update logic works on data
//! rather than live git objects.

use std::collections::BTreeMap;

use git2::{Oid, ReferenceType, Repository};
use tracing::debug;

use super::repo::HeadState;
use crate::Result;

/// A local branch (`refs/heads/*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBranch {
    /// Short name, e.g. `main`
    pub name: String,
    /// Full reference name
    pub refname: String,
    /// Tip commit; `None` for an unborn branch
    pub tip: Option<Oid>,
    /// Full reference name of the tracked upstream, if configured
    pub upstream: Option<String>,
    /// Whether this branch is checked out
    pub is_head: bool,
}

/// A remote-tracking branch (`refs/remotes/*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    /// Short name, e.g. `origin/main`
    pub name: String,
    pub refname: String,
    /// `None` when the ref points at an object that is not a reachable commit
    pub tip: Option<Oid>,
}

/// A tag (`refs/tags/*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub refname: String,
    /// Peeled commit, if the tag points at one
    pub target: Option<Oid>,
}

/// Any reference the synchronizer cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Local(LocalBranch),
    Remote(RemoteBranch),
    Tag(Tag),
}

impl GitRef {
    /// Full reference name
    pub fn refname(&self) -> &str {
        match self {
            GitRef::Local(b) => &b.refname,
            GitRef::Remote(b) => &b.refname,
            GitRef::Tag(t) => &t.refname,
        }
    }

    /// Commit the reference resolves to
    pub fn commit(&self) -> Option<Oid> {
        match self {
            GitRef::Local(b) => b.tip,
            GitRef::Remote(b) => b.tip,
            GitRef::Tag(t) => t.target,
        }
    }
}

/// State of a branch's upstream within a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamState {
    /// No upstream configured
    Untracked,
    /// Configured, but the ref is gone or does not resolve to a commit
    Missing,
    /// Configured and resolved
    At(Oid),
}

/// All references of a repository, keyed by full name
#[derive(Debug, Clone, Default)]
pub struct RefSnapshot {
    refs: BTreeMap<String, GitRef>,
}

impl RefSnapshot {
    /// Read every branch, remote-tracking branch and tag
    ///
    /// An unborn checked-out branch has no reference yet; it is added from
    /// `head` so that it still shows up in the branch list.
    pub fn capture(repo: &Repository, head: &HeadState) -> Result<Self> {
        let mut refs = BTreeMap::new();

        for reference in repo.references()? {
            let reference = reference?;
            if reference.kind() == Some(ReferenceType::Symbolic) {
                continue;
            }
            let Some(refname) = reference.name().map(str::to_string) else {
                continue;
            };
            let commit = reference.peel_to_commit().ok().map(|c| c.id());

            let entry = if let Some(name) = refname.strip_prefix("refs/heads/") {
                GitRef::Local(LocalBranch {
                    name: name.to_string(),
                    upstream: upstream_of(repo, &refname),
                    is_head: head.branch_name() == Some(name),
                    refname: refname.clone(),
                    tip: commit,
                })
            } else if let Some(name) = refname.strip_prefix("refs/remotes/") {
                GitRef::Remote(RemoteBranch {
                    name: name.to_string(),
                    refname: refname.clone(),
                    tip: commit,
                })
            } else if let Some(name) = refname.strip_prefix("refs/tags/") {
                GitRef::Tag(Tag {
                    name: name.to_string(),
                    refname: refname.clone(),
                    target: commit,
                })
            } else {
                continue;
            };

            refs.insert(refname, entry);
        }

        if let HeadState::Unborn(name) = head {
            let refname = format!("refs/heads/{name}");
            if !refs.contains_key(&refname) {
                debug!(branch = %name, "Checked-out branch is unborn");
                refs.insert(
                    refname.clone(),
                    GitRef::Local(LocalBranch {
                        name: name.clone(),
                        upstream: upstream_of(repo, &refname),
                        refname,
                        tip: None,
                        is_head: true,
                    }),
                );
            }
        }

        Ok(Self { refs })
    }

    /// Build a snapshot from already-resolved references
    pub fn from_refs(refs: impl IntoIterator<Item = GitRef>) -> Self {
        Self {
            refs: refs
                .into_iter()
                .map(|r| (r.refname().to_string(), r))
                .collect(),
        }
    }

    /// Local branches, sorted by name
    pub fn local_branches(&self) -> impl Iterator<Item = &LocalBranch> {
        self.refs.values().filter_map(|r| match r {
            GitRef::Local(b) => Some(b),
            _ => None,
        })
    }

    /// Remote-tracking branches, sorted by name
    pub fn remote_branches(&self) -> impl Iterator<Item = &RemoteBranch> {
        self.refs.values().filter_map(|r| match r {
            GitRef::Remote(b) => Some(b),
            _ => None,
        })
    }

    /// Tags, sorted by name
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.refs.values().filter_map(|r| match r {
            GitRef::Tag(t) => Some(t),
            _ => None,
        })
    }

    /// Look up a reference by full name
    pub fn get(&self, refname: &str) -> Option<&GitRef> {
        self.refs.get(refname)
    }

    /// Resolve the upstream of `branch` within this snapshot
    pub fn upstream_state(&self, branch: &LocalBranch) -> UpstreamState {
        let Some(upstream) = branch.upstream.as_deref() else {
            return UpstreamState::Untracked;
        };

        match self.get(upstream).and_then(GitRef::commit) {
            Some(oid) => UpstreamState::At(oid),
            None => UpstreamState::Missing,
        }
    }
}

/// Full name of the configured upstream of `refname`
fn upstream_of(repo: &Repository, refname: &str) -> Option<String> {
    repo.branch_upstream_name(refname)
        .ok()
        .and_then(|buf| buf.as_str().map(str::to_string))
}
