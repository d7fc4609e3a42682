//! Git history extraction using libgit2
//!
//! Lists commits with author metadata, measures the time between commits
//! and answers the few repository-wide questions the statistics command
//! needs, using the git2 crate (Rust bindings to libgit2).

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use git2::{Repository, Sort};
use std::path::Path;
use tracing::debug;

use crate::git::diff::diff_between;
use crate::models::{Commit, DiffLine};

/// Read-only view of a subject repository's history.
pub struct GitHistory {
    repo: Repository,
}

impl GitHistory {
    /// Open a git repository.
    ///
    /// # Arguments
    /// * `path` - Path to the repository (or any subdirectory)
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to open git repository at {:?}", path))?;
        debug!("Opened git repository at {:?}", repo.path());
        Ok(Self { repo })
    }

    /// Check if a path is inside a git repository.
    pub fn is_git_repo(path: &Path) -> bool {
        Repository::discover(path).is_ok()
    }

    /// Get the repository root path.
    pub fn repo_root(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .context("Repository has no working directory (bare repo?)")
    }

    /// Every commit reachable from a branch or tag, newest first.
    ///
    /// An empty repository yields an empty list.
    pub fn all_commits(&self) -> Result<Vec<Commit>> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push_glob("refs/heads")?;
        revwalk.push_glob("refs/tags")?;

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result?;
            let commit = self.repo.find_commit(oid)?;
            commits.push(to_commit(&commit));
        }
        Ok(commits)
    }

    /// Look up a single commit by revision.
    pub fn commit(&self, rev: &str) -> Result<Commit> {
        let commit = self
            .repo
            .revparse_single(rev)
            .and_then(|o| o.peel_to_commit())
            .with_context(|| format!("Unknown revision {}", rev))?;
        Ok(to_commit(&commit))
    }

    /// Absolute time between two commits' author timestamps.
    pub fn time_between(&self, a: &str, b: &str) -> Result<Duration> {
        let first = self.commit(a)?;
        let second = self.commit(b)?;
        Ok((second.timestamp - first.timestamp).abs())
    }

    /// Number of commits reachable from HEAD.
    pub fn commit_count(&self) -> Result<usize> {
        let mut revwalk = self.repo.revwalk()?;
        if self.repo.head().is_err() {
            return Ok(0);
        }
        revwalk.push_head()?;
        Ok(revwalk.count())
    }

    /// Unified diff between two revisions, optionally restricted to a path.
    pub fn diff(&self, from: &str, to: &str, path: Option<&str>) -> Result<Vec<DiffLine>> {
        diff_between(&self.repo, from, to, path)
    }

    /// Get the list of all tracked files at HEAD.
    pub fn get_tracked_files(&self) -> Result<Vec<String>> {
        let Ok(head) = self.repo.head() else {
            return Ok(Vec::new());
        };
        let tree = head.peel_to_tree()?;

        let mut files = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                let path = if dir.is_empty() {
                    entry.name().unwrap_or("").to_string()
                } else {
                    format!("{}{}", dir, entry.name().unwrap_or(""))
                };
                files.push(path);
            }
            git2::TreeWalkResult::Ok
        })?;

        Ok(files)
    }
}

fn to_commit(commit: &git2::Commit) -> Commit {
    let author = commit.author();
    Commit {
        hash: commit.id().to_string(),
        author: author.name().unwrap_or("Unknown").to_string(),
        timestamp: git_time_to_utc(&author.when()),
        message: commit.message().unwrap_or("").to_string(),
    }
}

/// Convert a libgit2 timestamp to UTC.
fn git_time_to_utc(time: &git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_default()
}
