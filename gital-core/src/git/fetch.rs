//! Fetching remotes and classifying what the fetch changed

use std::collections::BTreeSet;
use std::fmt;

use git2::{AutotagOption, ErrorClass, ErrorCode, FetchOptions, FetchPrune, Oid, Repository};
use tracing::{debug, info, warn};

use super::credentials::GitAuth;
use super::repo::RemoteInfo;
use crate::report::{Event, Reporter};

/// Why a remote was not fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote has no fetch refspec (typically push-only)
    NoRefspec,
}

/// Refs touched by one fetch, by category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub new_branches: BTreeSet<String>,
    pub new_tags: BTreeSet<String>,
    pub fast_forwards: BTreeSet<String>,
}

impl FetchSummary {
    /// Nothing worth listing happened
    pub fn is_empty(&self) -> bool {
        self.new_branches.is_empty() && self.new_tags.is_empty() && self.fast_forwards.is_empty()
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("up to date");
        }

        let sections = [
            ("new branches", &self.new_branches),
            ("new tags", &self.new_tags),
            ("fast-forwarded", &self.fast_forwards),
        ];
        let parts: Vec<String> = sections
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(label, names)| {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                format!("{}: {}", label, names.join(", "))
            })
            .collect();

        f.write_str(&parts.join("; "))
    }
}

/// Result of fetching one remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fetch ran; what it changed
    Updated(FetchSummary),
    /// Fetch was not attempted
    Skipped(SkipReason),
    /// The transport or command failed; message is normalized
    Failed(String),
    /// libgit2 tripped over concurrent repository maintenance; the fetch may
    /// still have gone through
    MaintenanceConflict(String),
}

/// Outcomes for every remote of a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub outcomes: Vec<(String, FetchOutcome)>,
    /// Fetching stopped early because of a maintenance conflict
    pub aborted: bool,
}

/// One ref tip movement observed during fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipUpdate {
    pub refname: String,
    /// `None` when the ref did not exist before
    pub old: Option<Oid>,
    /// `None` when the ref was deleted
    pub new: Option<Oid>,
}

impl TipUpdate {
    pub fn new(refname: impl Into<String>, old: Oid, new: Oid) -> Self {
        Self {
            refname: refname.into(),
            old: (!old.is_zero()).then_some(old),
            new: (!new.is_zero()).then_some(new),
        }
    }
}

/// Sort tip updates into new branches, new tags and fast-forwards
///
/// `is_descendant(new, old)` decides whether an existing ref moved forward.
/// Forced updates, deletions and symbolic `HEAD` refs are not listed.
pub fn classify<F>(updates: &[TipUpdate], is_descendant: F) -> FetchSummary
where
    F: Fn(Oid, Oid) -> bool,
{
    let mut summary = FetchSummary::default();

    for update in updates {
        let Some(new) = update.new else {
            continue;
        };
        if update.refname.ends_with("/HEAD") {
            continue;
        }

        if let Some(tag) = update.refname.strip_prefix("refs/tags/") {
            if update.old.is_none() {
                summary.new_tags.insert(tag.to_string());
            }
            continue;
        }

        let Some(name) = update
            .refname
            .strip_prefix("refs/remotes/")
            .or_else(|| update.refname.strip_prefix("refs/heads/"))
        else {
            continue;
        };

        match update.old {
            None => {
                summary.new_branches.insert(name.to_string());
            }
            Some(old) if old != new && is_descendant(new, old) => {
                summary.fast_forwards.insert(name.to_string());
            }
            Some(_) => {}
        }
    }

    summary
}

/// Message libgit2 uses when a `.lock` file is already held
const LOCK_HELD_MESSAGE: &str = "failed to lock file";

/// Translate a fetch error into a failure or a maintenance conflict
///
/// Lock contention on refs or the object database, and objects vanishing
/// under a repack, are what concurrent `git gc --auto` looks like from
/// libgit2. A held ref lock surfaces as a generic OS error, so it is
/// recognised by its message. Everything else is a plain failure with a
/// normalized message.
pub fn classify_fetch_error(err: &git2::Error) -> FetchOutcome {
    let message = normalize_failure_message(err.message());

    let lock_held = err.code() == ErrorCode::Locked
        || (err.class() == ErrorClass::Os && err.message().contains(LOCK_HELD_MESSAGE));

    if lock_held || err.class() == ErrorClass::Odb {
        FetchOutcome::MaintenanceConflict(message)
    } else {
        FetchOutcome::Failed(message)
    }
}

/// Prefixes that repeat what the caller already says ("fetch failed: ...")
const REDUNDANT_PREFIXES: [&str; 4] = ["error:", "fatal:", "remote:", "stderr:"];

/// Strip redundant leading prefixes and make the message a sentence
pub fn normalize_failure_message(message: &str) -> String {
    let mut text = message.trim();

    loop {
        let stripped = REDUNDANT_PREFIXES.iter().find_map(|prefix| {
            text.get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| text[prefix.len()..].trim_start())
        });
        match stripped {
            Some(rest) => text = rest,
            None => break,
        }
    }

    let text = text.trim_end_matches(|c: char| c == ':' || c.is_whitespace());
    if text.is_empty() {
        return "Fetch failed.".to_string();
    }

    if text.ends_with(['.', '!', '?']) {
        text.to_string()
    } else {
        format!("{text}.")
    }
}

/// Fetch one remote with its configured refspecs
pub fn fetch_remote(repo: &Repository, remote: &RemoteInfo, auth: &GitAuth) -> FetchOutcome {
    if !remote.has_fetch_refspec() {
        debug!(remote = %remote.name, "No fetch refspec configured, skipping");
        return FetchOutcome::Skipped(SkipReason::NoRefspec);
    }

    let mut git_remote = match repo.find_remote(&remote.name) {
        Ok(r) => r,
        Err(e) => return classify_fetch_error(&e),
    };

    let mut updates = Vec::new();
    let result = {
        let mut callbacks = auth.callbacks();
        callbacks.update_tips(|refname, old, new| {
            updates.push(TipUpdate::new(refname, old, new));
            true
        });

        let mut options = FetchOptions::new();
        options
            .remote_callbacks(callbacks)
            .download_tags(AutotagOption::Auto)
            .prune(FetchPrune::Off);

        git_remote.fetch(&[] as &[&str], Some(&mut options), None)
    };

    match result {
        Ok(()) => {
            let summary = classify(&updates, |new, old| {
                repo.graph_descendant_of(new, old).unwrap_or(false)
            });
            info!(remote = %remote.name, %summary, "Fetched");
            FetchOutcome::Updated(summary)
        }
        Err(e) => {
            let outcome = classify_fetch_error(&e);
            warn!(remote = %remote.name, error = %e, "Fetch failed");
            outcome
        }
    }
}

/// Fetch every remote in order, reporting each
///
/// Stops after the first maintenance conflict, since ref state can no longer
/// be trusted for the remaining remotes.
pub fn fetch_all(
    repo: &Repository,
    remotes: &[RemoteInfo],
    auth: &GitAuth,
    reporter: &dyn Reporter,
) -> FetchReport {
    let mut report = FetchReport::default();

    for remote in remotes {
        if remote.has_fetch_refspec() {
            reporter.report(Event::Fetching {
                remote: remote.name.clone(),
            });
        }

        let outcome = fetch_remote(repo, remote, auth);
        let conflict = matches!(outcome, FetchOutcome::MaintenanceConflict(_));

        reporter.report(Event::Fetched {
            remote: remote.name.clone(),
            outcome: outcome.clone(),
        });
        report.outcomes.push((remote.name.clone(), outcome));

        if conflict {
            report.aborted = true;
            break;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testutil::{clone_local, commit_file, commit_n, hold_ref_lock, init_repo, tip};
    use crate::git::GitRepo;
    use crate::report::EventBuffer;
    use tempfile::TempDir;

    fn oid(n: u8) -> Oid {
        Oid::from_bytes(&[n; 20]).unwrap()
    }

    #[test]
    fn test_classify_categories() {
        let updates = vec![
            TipUpdate::new("refs/remotes/origin/feature", Oid::zero(), oid(1)),
            TipUpdate::new("refs/tags/v1.0", Oid::zero(), oid(2)),
            TipUpdate::new("refs/remotes/origin/main", oid(3), oid(4)),
            TipUpdate::new("refs/remotes/origin/forced", oid(5), oid(6)),
            TipUpdate::new("refs/remotes/origin/HEAD", Oid::zero(), oid(4)),
            TipUpdate::new("refs/remotes/origin/gone", oid(7), Oid::zero()),
            TipUpdate::new("refs/tags/moved", oid(8), oid(9)),
        ];

        let summary = classify(&updates, |new, old| new == oid(4) && old == oid(3));

        assert_eq!(
            summary.new_branches.iter().collect::<Vec<_>>(),
            vec!["origin/feature"]
        );
        assert_eq!(summary.new_tags.iter().collect::<Vec<_>>(), vec!["v1.0"]);
        assert_eq!(
            summary.fast_forwards.iter().collect::<Vec<_>>(),
            vec!["origin/main"]
        );
    }

    #[test]
    fn test_summary_display() {
        assert_eq!(FetchSummary::default().to_string(), "up to date");

        let mut summary = FetchSummary::default();
        summary.new_branches.insert("origin/b".to_string());
        summary.new_branches.insert("origin/a".to_string());
        summary.fast_forwards.insert("origin/main".to_string());
        assert_eq!(
            summary.to_string(),
            "new branches: origin/a, origin/b; fast-forwarded: origin/main"
        );
    }

    #[test]
    fn test_normalize_failure_message_fixtures() {
        let fixtures = [
            (
                "fatal: could not read from remote repository",
                "could not read from remote repository.",
            ),
            (
                "error: fatal: repository 'x' not found",
                "repository 'x' not found.",
            ),
            ("Remote: access denied!", "access denied!"),
            (
                "failed to resolve address for gitlab.example.com: Name or service not known",
                "failed to resolve address for gitlab.example.com: Name or service not known.",
            ),
            ("  unexpected EOF?\n", "unexpected EOF?"),
            (
                "failed to lock file '/work/.git/refs/remotes/origin/main.lock' for writing: ",
                "failed to lock file '/work/.git/refs/remotes/origin/main.lock' for writing.",
            ),
            ("fatal:", "Fetch failed."),
            ("", "Fetch failed."),
        ];

        for (input, expected) in fixtures {
            assert_eq!(normalize_failure_message(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_classify_fetch_error_fixtures() {
        // What libgit2 returns when `git gc` holds a ref lock
        let ref_lock = git2::Error::new(
            ErrorCode::GenericError,
            ErrorClass::Os,
            "failed to lock file '/work/.git/refs/remotes/origin/main.lock' for writing: ",
        );
        assert_eq!(
            classify_fetch_error(&ref_lock),
            FetchOutcome::MaintenanceConflict(
                "failed to lock file '/work/.git/refs/remotes/origin/main.lock' for writing."
                    .to_string()
            )
        );

        let locked = git2::Error::new(
            ErrorCode::Locked,
            ErrorClass::Index,
            "index is locked",
        );
        assert!(matches!(
            classify_fetch_error(&locked),
            FetchOutcome::MaintenanceConflict(_)
        ));

        let disk_full = git2::Error::new(
            ErrorCode::GenericError,
            ErrorClass::Os,
            "failed to write to file: No space left on device",
        );
        assert!(matches!(
            classify_fetch_error(&disk_full),
            FetchOutcome::Failed(_)
        ));

        let odb = git2::Error::new(
            ErrorCode::NotFound,
            ErrorClass::Odb,
            "object not found - no match for id (abc)",
        );
        assert!(matches!(
            classify_fetch_error(&odb),
            FetchOutcome::MaintenanceConflict(_)
        ));

        let network = git2::Error::new(
            ErrorCode::GenericError,
            ErrorClass::Net,
            "failed to connect to gitlab.example.com: Connection refused",
        );
        assert_eq!(
            classify_fetch_error(&network),
            FetchOutcome::Failed(
                "failed to connect to gitlab.example.com: Connection refused.".to_string()
            )
        );

        let auth = git2::Error::new(
            ErrorCode::Auth,
            ErrorClass::Ssh,
            "error: authentication required but no callback set",
        );
        assert_eq!(
            classify_fetch_error(&auth),
            FetchOutcome::Failed("authentication required but no callback set.".to_string())
        );
    }

    #[test]
    fn test_remote_without_refspec_is_skipped_not_attempted() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        repo.config()
            .unwrap()
            .set_str("remote.backup.url", "/nonexistent/path/to/repo")
            .unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        let remotes = git.list_remotes().unwrap();
        let events = EventBuffer::new();
        let report = fetch_all(git.inner(), &remotes, &GitAuth::default(), &events);

        assert_eq!(
            report.outcomes,
            vec![(
                "backup".to_string(),
                FetchOutcome::Skipped(SkipReason::NoRefspec)
            )]
        );
        assert!(!report.aborted);
        assert!(!events
            .events()
            .iter()
            .any(|e| matches!(e, Event::Fetching { .. })));
    }

    #[test]
    fn test_fetch_reports_new_branch_tag_and_fast_forward() {
        let dir = TempDir::new().unwrap();
        let upstream_path = dir.path().join("upstream");
        let upstream = init_repo(&upstream_path);
        commit_file(&upstream, "a.txt", "a\n", "first");
        let local = clone_local(&upstream_path, &dir.path().join("local"));

        let head = commit_n(&upstream, "a.txt", 2);
        let head_commit = upstream.find_commit(head).unwrap();
        upstream.branch("feature", &head_commit, false).unwrap();
        upstream
            .tag_lightweight("v2.0", head_commit.as_object(), false)
            .unwrap();

        let git = GitRepo::open(local.workdir().unwrap()).unwrap();
        let remotes = git.list_remotes().unwrap();
        let events = EventBuffer::new();
        let report = fetch_all(git.inner(), &remotes, &GitAuth::default(), &events);

        let (name, outcome) = &report.outcomes[0];
        assert_eq!(name, "origin");
        let FetchOutcome::Updated(summary) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(summary.new_branches.contains("origin/feature"));
        assert!(summary.new_tags.contains("v2.0"));
        assert!(summary.fast_forwards.contains("origin/main"));
        assert_eq!(tip(&local, "refs/remotes/origin/main"), head);

        assert_eq!(
            events.events()[0],
            Event::Fetching {
                remote: "origin".to_string()
            }
        );
    }

    #[test]
    fn test_fetch_failure_is_reported_and_contained() {
        let dir = TempDir::new().unwrap();
        let repo = init_repo(dir.path());
        repo.remote("origin", dir.path().join("missing").to_str().unwrap())
            .unwrap();
        repo.remote("second", dir.path().join("also-missing").to_str().unwrap())
            .unwrap();

        let git = GitRepo::open(dir.path()).unwrap();
        let remotes = git.list_remotes().unwrap();
        let report = fetch_all(git.inner(), &remotes, &GitAuth::default(), &EventBuffer::new());

        assert_eq!(report.outcomes.len(), 2);
        for (_, outcome) in &report.outcomes {
            match outcome {
                FetchOutcome::Failed(message) => assert!(message.ends_with('.')),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn test_held_ref_lock_stops_remaining_remotes() {
        let dir = TempDir::new().unwrap();
        let upstream_path = dir.path().join("upstream");
        let upstream = init_repo(&upstream_path);
        commit_file(&upstream, "a.txt", "a\n", "first");
        let local = clone_local(&upstream_path, &dir.path().join("local"));
        local
            .remote("zsecond", upstream_path.to_str().unwrap())
            .unwrap();

        commit_n(&upstream, "a.txt", 1);
        hold_ref_lock(&local, "refs/remotes/origin/main");

        let git = GitRepo::open(local.workdir().unwrap()).unwrap();
        let remotes = git.list_remotes().unwrap();
        let events = EventBuffer::new();
        let report = fetch_all(git.inner(), &remotes, &GitAuth::default(), &events);

        assert!(report.aborted);
        assert_eq!(report.outcomes.len(), 1);
        let (name, outcome) = &report.outcomes[0];
        assert_eq!(name, "origin");
        assert!(
            matches!(outcome, FetchOutcome::MaintenanceConflict(_)),
            "unexpected outcome {outcome:?}"
        );
        assert!(local.find_reference("refs/remotes/zsecond/main").is_err());
        assert!(!events
            .events()
            .iter()
            .any(|e| matches!(e, Event::Fetching { remote } if remote == "zsecond")));
    }
}
