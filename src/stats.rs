//! Subject repository statistics
//!
//! Size figures reported alongside a corpus: commit count, tracked source
//! files of the chosen language and their non-blank, non-comment lines,
//! plus the shape of a chain list.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::config::Language;
use crate::git::GitHistory;
use crate::models::Chain;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectStats {
    /// HEAD commit, absent for an empty repository
    pub head: Option<String>,
    pub commits: usize,
    pub source_files: usize,
    pub code_lines: usize,
}

/// How many chains of each length a chain list holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    pub total: usize,
    pub by_length: BTreeMap<usize, usize>,
}

/// Gather statistics for the repository at `repo_path`.
///
/// Files that are tracked but missing or unreadable in the working tree are
/// skipped.
pub fn project_stats(repo_path: &Path, language: Language) -> Result<ProjectStats> {
    let history = GitHistory::open(repo_path)?;
    let root = history.repo_root()?.to_path_buf();

    let files: Vec<String> = history
        .get_tracked_files()?
        .into_iter()
        .filter(|f| language.matches(f))
        .collect();

    let mut code_lines = 0;
    for file in &files {
        match std::fs::read_to_string(root.join(file)) {
            Ok(content) => code_lines += count_code_lines(&content, language),
            Err(e) => debug!("Skipping {}: {}", file, e),
        }
    }

    Ok(ProjectStats {
        head: history.commit("HEAD").ok().map(|c| c.hash),
        commits: history.commit_count()?,
        source_files: files.len(),
        code_lines,
    })
}

/// Count lines that are neither blank nor comments.
///
/// A line counts as comment when it starts with the language's line-comment
/// marker, or (for C-family languages) opens a block comment or lies inside
/// one. A block comment ends on the line that ends with `*/`.
pub fn count_code_lines(content: &str, language: Language) -> usize {
    let mut in_block = false;
    let mut count = 0;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if in_block {
            if line.ends_with("*/") {
                in_block = false;
            }
            continue;
        }
        if line.starts_with(language.line_comment()) {
            continue;
        }
        if language.has_block_comments() && line.starts_with("/*") {
            in_block = !line[2..].ends_with("*/");
            continue;
        }
        count += 1;
    }
    count
}

pub fn chain_stats(chains: &[Chain]) -> ChainStats {
    let mut by_length = BTreeMap::new();
    for chain in chains {
        *by_length.entry(chain.len()).or_insert(0) += 1;
    }
    ChainStats {
        total: chains.len(),
        by_length,
    }
}
