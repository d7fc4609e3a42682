//! Private working copies for chain replay
//!
//! Each chain is replayed in two clones of the subject repository: one held
//! at the anchor's parent (the baseline) and one that commits of the chain
//! are cherry-picked onto. A [`WorkingCopy`] lives in a temporary directory
//! that is removed when the copy is dropped, whether the chain succeeded
//! or not.

use anyhow::Result;
use git2::build::CheckoutBuilder;
use git2::{Oid, Repository};
use std::path::Path;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::git::diff::diff_between;
use crate::models::DiffLine;

/// Errors that abandon the replay of one chain.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("commit {commit} has no parent to diff against")]
    NoParent { commit: String },

    #[error("cherry-pick of {commit} conflicts in {paths:?}")]
    Conflict { commit: String, paths: Vec<String> },

    #[error("commit {commit} is a merge and cannot be replayed")]
    MergeCommit { commit: String },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A disposable clone of the subject repository.
pub struct WorkingCopy {
    // Dropped before `dir` so libgit2 releases its handles first.
    repo: Repository,
    dir: TempDir,
}

impl WorkingCopy {
    /// Clone `source` into a fresh temporary directory under `scratch`.
    pub fn create(source: &Path, scratch: &Path, name: &str) -> Result<Self, ReplayError> {
        std::fs::create_dir_all(scratch)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", name))
            .tempdir_in(scratch)?;
        let source = source.canonicalize()?;
        let repo = Repository::clone(&source.to_string_lossy(), dir.path())?;
        debug!("Cloned {} into {}", source.display(), dir.path().display());
        Ok(Self { repo, dir })
    }

    /// Root of the checked-out tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Force-checkout `rev` with a detached HEAD.
    pub fn checkout(&self, rev: &str) -> Result<Oid, ReplayError> {
        let commit = self.repo.revparse_single(rev)?.peel_to_commit()?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
        self.repo.set_head_detached(commit.id())?;
        Ok(commit.id())
    }

    /// First parent of `rev`.
    pub fn parent_of(&self, rev: &str) -> Result<Oid, ReplayError> {
        let commit = self.repo.revparse_single(rev)?.peel_to_commit()?;
        commit.parent_id(0).map_err(|_| ReplayError::NoParent {
            commit: rev.to_string(),
        })
    }

    /// Current HEAD commit.
    pub fn head(&self) -> Result<Oid, ReplayError> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    /// Apply `rev` on top of HEAD and move HEAD to the new commit.
    ///
    /// The replayed commit keeps the original author, committer and
    /// message. A conflicting pick leaves HEAD untouched.
    pub fn cherry_pick(&self, rev: &str) -> Result<Oid, ReplayError> {
        let commit = self.repo.revparse_single(rev)?.peel_to_commit()?;
        if commit.parent_count() > 1 {
            return Err(ReplayError::MergeCommit {
                commit: rev.to_string(),
            });
        }
        let head = self.repo.head()?.peel_to_commit()?;

        let mut index = self.repo.cherrypick_commit(&commit, &head, 0, None)?;
        if index.has_conflicts() {
            let paths = index
                .conflicts()?
                .filter_map(|c| c.ok())
                .filter_map(|c| c.our.or(c.their).or(c.ancestor))
                .map(|entry| String::from_utf8_lossy(&entry.path).to_string())
                .collect();
            return Err(ReplayError::Conflict {
                commit: rev.to_string(),
                paths,
            });
        }

        let tree = self.repo.find_tree(index.write_tree_to(&self.repo)?)?;
        let oid = self.repo.commit(
            None,
            &commit.author(),
            &commit.committer(),
            commit.message().unwrap_or(""),
            &tree,
            &[&head],
        )?;
        self.repo.set_head_detached(oid)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_head(Some(&mut checkout))?;
        Ok(oid)
    }

    /// Unified diff between two revisions of this copy.
    pub fn diff(&self, from: &str, to: &str, path: Option<&str>) -> Result<Vec<DiffLine>> {
        diff_between(&self.repo, from, to, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::{commit_file, create_test_repo};
    use git2::BranchType;

    #[test]
    fn test_working_copy_is_removed_on_drop() -> anyhow::Result<()> {
        let (dir, _repo) = create_test_repo()?;
        let scratch = tempfile::tempdir()?;
        let root = {
            let copy = WorkingCopy::create(dir.path(), scratch.path(), "v1")?;
            assert!(copy.root().join("test.txt").exists());
            copy.root().to_path_buf()
        };
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn test_root_commit_has_no_parent() -> anyhow::Result<()> {
        let (dir, repo) = create_test_repo()?;
        let root = repo.head()?.peel_to_commit()?.id().to_string();
        let scratch = tempfile::tempdir()?;
        let copy = WorkingCopy::create(dir.path(), scratch.path(), "v1")?;
        assert!(matches!(copy.parent_of(&root), Err(ReplayError::NoParent { .. })));
        Ok(())
    }

    #[test]
    fn test_checkout_rewinds_tree() -> anyhow::Result<()> {
        let (dir, repo) = create_test_repo()?;
        let first = repo.head()?.peel_to_commit()?.id();
        commit_file(&repo, "A.java", "class A {}\n", "Add A", 60)?;

        let scratch = tempfile::tempdir()?;
        let copy = WorkingCopy::create(dir.path(), scratch.path(), "v1")?;
        assert!(copy.root().join("A.java").exists());
        copy.checkout(&first.to_string())?;
        assert!(!copy.root().join("A.java").exists());
        assert_eq!(copy.head()?, first);
        Ok(())
    }

    #[test]
    fn test_cherry_pick_skips_intermediate_commits() -> anyhow::Result<()> {
        let (dir, repo) = create_test_repo()?;
        let base = commit_file(&repo, "A.java", "a\n", "Add A", 60)?;
        commit_file(&repo, "B.java", "b\n", "Add B", 120)?;
        let pick = commit_file(&repo, "C.java", "c\n", "Add C", 180)?;

        let scratch = tempfile::tempdir()?;
        let copy = WorkingCopy::create(dir.path(), scratch.path(), "v2")?;
        copy.checkout(&base.to_string())?;
        let tip = copy.cherry_pick(&pick.to_string())?;

        assert_eq!(copy.head()?, tip);
        assert_ne!(tip, pick);
        assert!(copy.root().join("C.java").exists());
        assert!(!copy.root().join("B.java").exists());

        let lines = copy.diff(&base.to_string(), &tip.to_string(), None)?;
        assert!(lines.iter().all(|l| l.file == "C.java"));
        Ok(())
    }

    #[test]
    fn test_conflicting_cherry_pick_is_reported() -> anyhow::Result<()> {
        let (dir, repo) = create_test_repo()?;
        let base = commit_file(&repo, "A.java", "one\n", "Add A", 60)?;
        commit_file(&repo, "A.java", "two\n", "Edit A", 120)?;
        let pick = commit_file(&repo, "A.java", "three\n", "Edit A again", 180)?;
        // Keep a ref on the original line so the clone sees it.
        repo.branch("picked", &repo.find_commit(pick)?, true)?;
        assert!(repo.find_branch("picked", BranchType::Local).is_ok());

        let scratch = tempfile::tempdir()?;
        let copy = WorkingCopy::create(dir.path(), scratch.path(), "v2")?;
        copy.checkout(&base.to_string())?;
        let result = copy.cherry_pick(&pick.to_string());
        assert!(matches!(result, Err(ReplayError::Conflict { .. })));
        assert_eq!(copy.head()?, base);
        Ok(())
    }
}
