//! Helpers for building throwaway repositories in tests

use std::path::Path;

use git2::{Oid, Repository, RepositoryInitOptions, Signature};

/// Initialise a non-bare repository whose HEAD points at `main`
pub fn init_repo(path: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &mut opts).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
    }
    repo
}

/// Write `contents` to `file` in the working tree and commit it on HEAD
pub fn commit_file(repo: &Repository, file: &str, contents: &str, message: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(file), contents).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Commit `count` changes to `file`, returning the last commit
pub fn commit_n(repo: &Repository, file: &str, count: usize) -> Oid {
    let mut last = None;
    for i in 0..count {
        last = Some(commit_file(repo, file, &format!("revision {i}\n"), &format!("change {i}")));
    }
    last.unwrap()
}

/// Clone `upstream` into `path` over the local transport
pub fn clone_local(upstream: &Path, path: &Path) -> Repository {
    let url = upstream.to_str().unwrap();
    let repo = Repository::clone(url, path).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
    }
    repo
}

/// Tip of a reference, by full name
pub fn tip(repo: &Repository, refname: &str) -> Oid {
    repo.find_reference(refname)
        .unwrap()
        .peel_to_commit()
        .unwrap()
        .id()
}

/// Leave `refname.lock` behind, as a concurrent `git gc` holding the ref would
pub fn hold_ref_lock(repo: &Repository, refname: &str) {
    let lock = repo.path().join(format!("{refname}.lock"));
    std::fs::create_dir_all(lock.parent().unwrap()).unwrap();
    std::fs::write(lock, "").unwrap();
}
