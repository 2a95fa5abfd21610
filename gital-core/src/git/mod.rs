//! Git operations for gital
//!
//! This module provides repository access, fetching with progress
//! classification, fast-forward-only branch updates and cloning.

mod branch;
mod clone;
mod credentials;
mod fetch;
mod refs;
mod repo;

#[cfg(test)]
pub(crate) mod testutil;

pub use branch::{apply_plan, plan_update, History, UpdateDecision, UpdatePlan};
pub use clone::{clone_repo, staging_path, CloneOptions};
pub use credentials::GitAuth;
pub use fetch::{
    classify, classify_fetch_error, fetch_all, fetch_remote, normalize_failure_message,
    FetchOutcome, FetchReport, FetchSummary, SkipReason, TipUpdate,
};
pub use refs::{GitRef, LocalBranch, RefSnapshot, RemoteBranch, Tag, UpstreamState};
pub use repo::{GitRepo, HeadState, RemoteInfo};
