//! Fast-forward-only branch updates
//!
//! [`plan_update`] decides what should happen to one local branch given its
//! upstream and their shared history; [`apply_plan`] carries it out. The
//! checked-out branch goes through a safe checkout so local changes are never
//! overwritten; every other branch only has its ref moved.

use std::fmt;

use git2::build::CheckoutBuilder;
use git2::{ErrorCode, Oid, Repository};
use tracing::{debug, info};

use super::refs::{LocalBranch, UpstreamState};
use crate::Result;

/// Reflog message for refs moved by the synchronizer
const REFLOG_MESSAGE: &str = "gital: fast-forward";

/// What happened to a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDecision {
    UpToDate,
    FastForwarded,
    SkippedNoUpstream,
    SkippedNoRevisions,
    SkippedUpstreamMissing,
    SkippedDivergedOrDirty,
}

impl UpdateDecision {
    /// Whether the branch was left alone for a reason worth pointing out
    pub fn is_skip(self) -> bool {
        !matches!(self, UpdateDecision::UpToDate | UpdateDecision::FastForwarded)
    }
}

impl fmt::Display for UpdateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdateDecision::UpToDate => "up to date",
            UpdateDecision::FastForwarded => "fast-forwarded",
            UpdateDecision::SkippedNoUpstream => "skipped, no upstream branch",
            UpdateDecision::SkippedNoRevisions => "skipped, no revisions yet",
            UpdateDecision::SkippedUpstreamMissing => "skipped, upstream branch is missing",
            UpdateDecision::SkippedDivergedOrDirty => "skipped",
        };
        f.write_str(text)
    }
}

/// Commit graph queries the planner needs
pub trait History {
    /// Most recent common ancestor, `None` for unrelated histories
    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>>;

    /// Whether `ancestor` is reachable from `descendant` (or equal to it)
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool>;
}

impl History for Repository {
    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        match Repository::merge_base(self, a, b) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.graph_descendant_of(descendant, ancestor)?)
    }
}

/// The action chosen for a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Nothing to do; the decision is final
    Settled {
        decision: UpdateDecision,
        detail: Option<String>,
    },
    /// Move the (not checked out) branch ref to `target`
    MoveRef { from: Oid, target: Oid },
    /// Check out `target` over the working tree, then move the branch ref
    CheckoutFastForward { from: Oid, target: Oid },
}

impl UpdatePlan {
    fn settled(decision: UpdateDecision, detail: Option<String>) -> Self {
        UpdatePlan::Settled { decision, detail }
    }
}

/// Decide how to update `branch` towards its upstream
pub fn plan_update(
    branch: &LocalBranch,
    upstream: UpstreamState,
    history: &dyn History,
) -> Result<UpdatePlan> {
    let (tip, upstream_tip) = match (upstream, branch.tip) {
        (UpstreamState::Untracked, _) => {
            return Ok(UpdatePlan::settled(UpdateDecision::SkippedNoUpstream, None));
        }
        (_, None) => {
            return Ok(UpdatePlan::settled(UpdateDecision::SkippedNoRevisions, None));
        }
        (UpstreamState::Missing, _) => {
            return Ok(UpdatePlan::settled(
                UpdateDecision::SkippedUpstreamMissing,
                branch.upstream.as_deref().map(short_refname),
            ));
        }
        (UpstreamState::At(upstream_tip), Some(tip)) => (tip, upstream_tip),
    };

    let base = history.merge_base(tip, upstream_tip)?;
    debug!(branch = %branch.name, %tip, %upstream_tip, ?base, "Planning branch update");

    if base == Some(upstream_tip) {
        return Ok(UpdatePlan::settled(UpdateDecision::UpToDate, None));
    }

    if branch.is_head {
        if base == Some(tip) {
            Ok(UpdatePlan::CheckoutFastForward {
                from: tip,
                target: upstream_tip,
            })
        } else {
            Ok(diverged())
        }
    } else if history.is_ancestor(tip, upstream_tip)? {
        Ok(UpdatePlan::MoveRef {
            from: tip,
            target: upstream_tip,
        })
    } else {
        Ok(diverged())
    }
}

fn diverged() -> UpdatePlan {
    UpdatePlan::settled(
        UpdateDecision::SkippedDivergedOrDirty,
        Some("not possible to fast-forward".to_string()),
    )
}

/// Carry out a plan produced by [`plan_update`]
///
/// Returns the final decision and an optional human-readable detail.
pub fn apply_plan(
    repo: &Repository,
    branch: &LocalBranch,
    plan: UpdatePlan,
) -> Result<(UpdateDecision, Option<String>)> {
    match plan {
        UpdatePlan::Settled { decision, detail } => Ok((decision, detail)),
        UpdatePlan::MoveRef { from, target } => {
            repo.find_reference(&branch.refname)?
                .set_target(target, REFLOG_MESSAGE)?;
            info!(branch = %branch.name, %from, %target, "Moved branch ref");
            Ok((UpdateDecision::FastForwarded, Some(range(from, target))))
        }
        UpdatePlan::CheckoutFastForward { from, target } => {
            let commit = repo.find_commit(target)?;

            let mut checkout = CheckoutBuilder::new();
            checkout.safe();

            match repo.checkout_tree(commit.as_object(), Some(&mut checkout)) {
                Ok(()) => {}
                Err(e) if e.code() == ErrorCode::Conflict => {
                    debug!(branch = %branch.name, error = %e, "Checkout refused");
                    return Ok((
                        UpdateDecision::SkippedDivergedOrDirty,
                        Some("local changes would be overwritten".to_string()),
                    ));
                }
                Err(e) => return Err(e.into()),
            }

            repo.find_reference(&branch.refname)?
                .set_target(target, REFLOG_MESSAGE)?;
            info!(branch = %branch.name, %from, %target, "Fast-forwarded checked-out branch");
            Ok((UpdateDecision::FastForwarded, Some(range(from, target))))
        }
    }
}

fn short_refname(refname: &str) -> String {
    refname
        .strip_prefix("refs/remotes/")
        .or_else(|| refname.strip_prefix("refs/heads/"))
        .unwrap_or(refname)
        .to_string()
}

fn range(from: Oid, to: Oid) -> String {
    let short = |oid: Oid| oid.to_string()[..7].to_string();
    format!("{}..{}", short(from), short(to))
}
