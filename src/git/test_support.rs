//! Throw-away repositories for git tests

use anyhow::Result;
use git2::{Oid, Repository, Signature, Time};
use std::path::Path;
use tempfile::TempDir;

/// Timestamp of the initial commit; later commits are offsets from it.
pub const BASE_TIME: i64 = 1_600_000_000;

/// A repository with one commit adding `test.txt`.
pub fn create_test_repo() -> Result<(TempDir, Repository)> {
    let dir = tempfile::tempdir()?;
    let repo = Repository::init(dir.path())?;

    let mut config = repo.config()?;
    config.set_str("user.name", "Test User")?;
    config.set_str("user.email", "test@example.com")?;

    commit_file(&repo, "test.txt", "hello", "Initial commit", 0)?;
    Ok((dir, repo))
}

/// Write `content` to `path`, stage it and commit on top of HEAD.
pub fn commit_file(
    repo: &Repository,
    path: &str,
    content: &str,
    message: &str,
    offset_secs: i64,
) -> Result<Oid> {
    commit_file_as(repo, "Test User", path, content, message, offset_secs)
}

/// Like [`commit_file`] with an explicit author name.
pub fn commit_file_as(
    repo: &Repository,
    author: &str,
    path: &str,
    content: &str,
    message: &str,
    offset_secs: i64,
) -> Result<Oid> {
    let workdir = repo.workdir().expect("test repo has a workdir");
    let full = workdir.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&full, content)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(path))?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let sig = Signature::new(author, "test@example.com", &Time::new(BASE_TIME + offset_secs, 0))?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    Ok(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
}
