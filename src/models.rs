//! Core data models shared by selection, replay and attribution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A commit as read from the subject repository. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit hash
    pub hash: String,
    /// Author name
    pub author: String,
    /// Author timestamp
    pub timestamp: DateTime<Utc>,
    /// Full commit message
    pub message: String,
}

impl Commit {
    pub fn new(
        hash: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            author: author.into(),
            timestamp,
            message: message.into(),
        }
    }
}

/// Kind of a unified-diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Context,
}

impl ChangeKind {
    /// Map a libgit2 line origin marker to a change kind.
    pub fn from_origin(origin: char) -> Option<Self> {
        match origin {
            '+' => Some(ChangeKind::Added),
            '-' => Some(ChangeKind::Removed),
            ' ' => Some(ChangeKind::Context),
            _ => None,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, ChangeKind::Context)
    }
}

/// One line of a unified diff between two revisions.
///
/// Line numbers are 1-based; `None` is the sentinel for "no line on this side"
/// (e.g. the before-line of an added line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: ChangeKind,
    /// Repository-relative path of the file
    pub file: String,
    pub after_line: Option<u32>,
    pub before_line: Option<u32>,
    /// Raw line text without the trailing newline
    pub text: String,
}

impl DiffLine {
    pub fn added(file: &str, after_line: u32, text: &str) -> Self {
        Self {
            kind: ChangeKind::Added,
            file: file.to_string(),
            after_line: Some(after_line),
            before_line: None,
            text: text.to_string(),
        }
    }

    pub fn removed(file: &str, before_line: u32, text: &str) -> Self {
        Self {
            kind: ChangeKind::Removed,
            file: file.to_string(),
            after_line: None,
            before_line: Some(before_line),
            text: text.to_string(),
        }
    }

    pub fn context(file: &str, after_line: u32, before_line: u32, text: &str) -> Self {
        Self {
            kind: ChangeKind::Context,
            file: file.to_string(),
            after_line: Some(after_line),
            before_line: Some(before_line),
            text: text.to_string(),
        }
    }

    /// The line number on the side this line's change kind lives on:
    /// after-side for additions, before-side for removals.
    pub fn changed_line(&self) -> Option<u32> {
        match self.kind {
            ChangeKind::Added => self.after_line,
            ChangeKind::Removed => self.before_line,
            ChangeKind::Context => self.after_line,
        }
    }
}

/// An ordered, non-empty sequence of commit hashes replayed as one
/// synthetic composite commit. The first element is the anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chain(Vec<String>);

impl Chain {
    /// Build a chain; returns `None` for an empty sequence.
    pub fn new(commits: Vec<String>) -> Option<Self> {
        if commits.is_empty() {
            None
        } else {
            Some(Self(commits))
        }
    }

    pub fn anchor(&self) -> &str {
        &self.0[0]
    }

    pub fn tail(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    pub fn commits(&self) -> &[String] {
        &self.0
    }

    /// Commits replayed on top of the anchor, with their step index (1-based).
    pub fn steps(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().enumerate().skip(1).map(|(i, c)| (i, c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: Vec<&str> = self.0.iter().map(|h| short_hash(h)).collect();
        write!(f, "[{}]", short.join(" -> "))
    }
}

/// First 12 characters of a hash, cut on a char boundary
fn short_hash(hash: &str) -> &str {
    hash.char_indices().nth(12).map_or(hash, |(i, _)| &hash[..i])
}
