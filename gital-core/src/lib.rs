//! gital core - clone and update every project of a GitLab group
//!
//! The [`Orchestrator`] decides per project whether to clone or to hand the
//! checkout to the [`Synchronizer`], which fetches every remote and
//! fast-forwards local branches. Progress is reported as [`Event`]s through
//! an injected [`Reporter`].

pub mod config;
pub mod error;
pub mod git;
pub mod orchestrator;
pub mod project;
pub mod report;
pub mod secrets;
pub mod sync;

pub use config::{CloneProtocol, Config, Endpoint};
pub use error::{Error, Result};
pub use git::{FetchOutcome, FetchSummary, GitAuth, SkipReason, UpdateDecision};
pub use orchestrator::{CancelFlag, Orchestrator, OrchestratorOptions, ProjectStatus, Tally};
pub use project::{Group, Project};
pub use report::{Event, EventBuffer, NullReporter, Reporter};
pub use secrets::Secrets;
pub use sync::{BranchResult, SyncReport, Synchronizer};
