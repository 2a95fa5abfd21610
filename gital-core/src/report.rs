//! Progress reporting
//!
//! The engine never prints. Every step is described by an [`Event`] handed to
//! an injected [`Reporter`]; the CLI renders them, tests record them.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::git::{FetchOutcome, UpdateDecision};
use crate::orchestrator::Tally;

/// Something worth telling the user about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The group directory was created or reused
    GroupDirectory {
        group: String,
        path: PathBuf,
        created: bool,
    },
    /// A clone is starting
    CloneStarted { project: String },
    /// A clone finished successfully
    CloneCompleted { project: String },
    /// A clone failed; the batch continues
    CloneFailed { project: String, reason: String },
    /// Project exists locally and updating is disabled
    AlreadyPresent { project: String },
    /// Project record unusable (e.g. unsafe path)
    InvalidProject { project: String, reason: String },
    /// Synchronizer started on an existing checkout
    UpdateStarted { project: String },
    /// The checked-out branch, `None` for a detached HEAD
    ActiveBranch { branch: Option<String> },
    /// Fetch of one remote is starting
    Fetching { remote: String },
    /// Fetch of one remote finished (or was skipped / failed)
    Fetched { remote: String, outcome: FetchOutcome },
    /// Branch update stage for one branch is starting
    BranchUpdate { branch: String },
    /// Outcome of the branch update algorithm
    BranchUpdated {
        branch: String,
        decision: UpdateDecision,
        detail: Option<String>,
    },
    /// A git error stopped the update of one branch; the others continue
    BranchFailed { branch: String, reason: String },
    /// Synchronizer could not process the repository
    UpdateFailed { project: String, reason: String },
    /// Synchronizer finished with the repository
    Done { project: String },
    /// Counts for the whole batch
    Summary(Tally),
    /// The batch was interrupted
    Interrupted,
}

/// Sink for [`Event`]s
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// Reporter that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: Event) {}
}

/// In-memory event list
///
/// Used to record events in tests and to hold one project's events while
/// projects run concurrently, so they can be replayed as a single block.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Mutex<Vec<Event>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Forward all buffered events to `target`, in order
    pub fn replay(self, target: &dyn Reporter) {
        let events = self
            .events
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for event in events {
            target.report(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Reporter for EventBuffer {
    fn report(&self, event: Event) {
        self.lock().push(event);
    }
}
