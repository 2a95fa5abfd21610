//! Terminal rendering of orchestrator events

use std::io::Write;

use gital_core::{Event, FetchOutcome, Reporter, SkipReason, Tally};

/// Where a rendered line goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Prints every event as one line
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: Event) {
        let (stream, line) = render(&event);
        // A closed pipe is not worth aborting a clone over
        let _ = match stream {
            Stream::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
            Stream::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
        };
    }
}

fn render(event: &Event) -> (Stream, String) {
    use Stream::{Stderr, Stdout};

    match event {
        Event::GroupDirectory {
            group,
            created: true,
            ..
        } => (Stdout, format!("{group} directory created.")),
        Event::GroupDirectory {
            group,
            created: false,
            ..
        } => (Stdout, format!("{group} directory already exists.")),
        Event::CloneStarted { project } => (Stdout, format!("{project} is cloning.")),
        Event::CloneCompleted { project } => {
            (Stdout, format!("{project} clone process is completed."))
        }
        Event::CloneFailed { project, reason } => {
            (Stderr, format!("{project} could not be cloned: {reason}"))
        }
        Event::AlreadyPresent { project } => (
            Stdout,
            format!("{project} already exists. Skipping this repository."),
        ),
        Event::InvalidProject { project, reason } => {
            (Stderr, format!("{project} skipped: {reason}"))
        }
        Event::UpdateStarted { project } => (Stdout, format!("{project} is updating.")),
        Event::ActiveBranch { branch: Some(branch) } => {
            (Stdout, format!("Active branch: {branch}"))
        }
        Event::ActiveBranch { branch: None } => {
            (Stdout, "No active branch (detached HEAD).".to_string())
        }
        Event::Fetching { remote } => (Stdout, format!("Fetching {remote}")),
        Event::Fetched { remote, outcome } => render_fetch(remote, outcome),
        Event::BranchUpdate { branch } => (Stdout, format!("branch update ({branch})")),
        Event::BranchUpdated {
            decision, detail, ..
        } => {
            let line = match detail {
                Some(detail) => format!("  {decision} ({detail})"),
                None => format!("  {decision}"),
            };
            (Stdout, line)
        }
        Event::BranchFailed { branch, reason } => {
            (Stderr, format!("  {branch} could not be updated: {reason}"))
        }
        Event::UpdateFailed { project, reason } => {
            (Stderr, format!("{project} could not be updated: {reason}"))
        }
        Event::Done { .. } => (Stdout, "Done".to_string()),
        Event::Summary(tally) => (Stdout, render_tally(tally)),
        Event::Interrupted => (Stderr, "Interrupted.".to_string()),
    }
}

fn render_fetch(remote: &str, outcome: &FetchOutcome) -> (Stream, String) {
    use Stream::{Stderr, Stdout};

    match outcome {
        FetchOutcome::Updated(summary) => (Stdout, format!("  {summary}")),
        FetchOutcome::Skipped(SkipReason::NoRefspec) => (
            Stdout,
            format!("Skipping {remote}: no fetch refspec configured."),
        ),
        FetchOutcome::Failed(message) => {
            (Stderr, format!("Fetching {remote} failed: {message}"))
        }
        FetchOutcome::MaintenanceConflict(message) => (
            Stderr,
            format!(
                "Fetching {remote} collided with repository maintenance, \
                 the fetch may still have succeeded: {message}"
            ),
        ),
    }
}

fn render_tally(tally: &Tally) -> String {
    format!(
        "{} cloned, {} skipped, {} updated, {} failed.",
        tally.cloned, tally.present, tally.updated, tally.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gital_core::{FetchSummary, UpdateDecision};
    use std::path::PathBuf;

    #[test]
    fn test_clone_lines() {
        let started = render(&Event::CloneStarted {
            project: "billing".to_string(),
        });
        let completed = render(&Event::CloneCompleted {
            project: "billing".to_string(),
        });

        assert_eq!(started, (Stream::Stdout, "billing is cloning.".to_string()));
        assert_eq!(
            completed,
            (
                Stream::Stdout,
                "billing clone process is completed.".to_string()
            )
        );
    }

    #[test]
    fn test_group_directory_line() {
        let (_, line) = render(&Event::GroupDirectory {
            group: "payments".to_string(),
            path: PathBuf::from("/work/payments"),
            created: true,
        });
        assert_eq!(line, "payments directory created.");
    }

    #[test]
    fn test_update_lines() {
        assert_eq!(
            render(&Event::Fetching {
                remote: "origin".to_string()
            })
            .1,
            "Fetching origin"
        );
        assert_eq!(
            render(&Event::BranchUpdate {
                branch: "main".to_string()
            })
            .1,
            "branch update (main)"
        );
        assert_eq!(
            render(&Event::BranchUpdated {
                branch: "main".to_string(),
                decision: UpdateDecision::SkippedDivergedOrDirty,
                detail: Some("not possible to fast-forward".to_string()),
            })
            .1,
            "  skipped (not possible to fast-forward)"
        );
        assert_eq!(
            render(&Event::Done {
                project: "billing".to_string()
            })
            .1,
            "Done"
        );
    }

    #[test]
    fn test_fetch_lines() {
        let mut summary = FetchSummary::default();
        summary.new_tags.insert("v1.0".to_string());

        assert_eq!(
            render_fetch("origin", &FetchOutcome::Updated(summary)),
            (Stream::Stdout, "  new tags: v1.0".to_string())
        );

        let (stream, line) = render_fetch(
            "origin",
            &FetchOutcome::Failed("Could not resolve host.".to_string()),
        );
        assert_eq!(stream, Stream::Stderr);
        assert_eq!(line, "Fetching origin failed: Could not resolve host.");
    }

    #[test]
    fn test_failures_go_to_stderr() {
        let (stream, _) = render(&Event::UpdateFailed {
            project: "billing".to_string(),
            reason: "no remote".to_string(),
        });
        assert_eq!(stream, Stream::Stderr);
        assert_eq!(render(&Event::Interrupted).1, "Interrupted.");
    }

    #[test]
    fn test_summary_line() {
        let tally = Tally {
            cloned: 2,
            present: 1,
            updated: 0,
            failed: 1,
        };
        assert_eq!(
            render(&Event::Summary(tally)).1,
            "2 cloned, 1 skipped, 0 updated, 1 failed."
        );
    }
}
