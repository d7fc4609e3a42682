//! Git collaborator
//!
//! Everything the corpus pipeline needs from version control:
//!
//! - Commit listing with author, timestamp and message
//! - Unified diffs between revisions as [`DiffLine`](crate::models::DiffLine) records
//! - Private working copies that can be rewound and cherry-picked onto
//!
//! # Example
//!
//! ```no_run
//! use tangle_pdg::git::{GitHistory, WorkingCopy};
//! use std::path::Path;
//!
//! let history = GitHistory::open(Path::new("/path/to/repo")).unwrap();
//! let commits = history.all_commits().unwrap();
//!
//! let scratch = Path::new("/tmp");
//! let copy = WorkingCopy::create(Path::new("/path/to/repo"), scratch, "v2").unwrap();
//! copy.checkout(&commits[1].hash).unwrap();
//! copy.cherry_pick(&commits[0].hash).unwrap();
//! ```

pub mod diff;
pub mod history;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use diff::diff_between;
pub use history::GitHistory;
pub use workspace::{ReplayError, WorkingCopy};
