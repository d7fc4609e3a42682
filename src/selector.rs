//! Commit chain selection
//!
//! Scans each author's history for runs of small, atomic-looking commits
//! that lie close together in time. Every run of two or more commits becomes
//! a [`Chain`] that the corpus pipeline later replays as one tangled commit.
//!
//! A commit looks atomic when its message names at most one change intent
//! ("fix", "add", "refactor", ...). Messages naming two or more distinct
//! intents are assumed to be tangled already and never seed or extend a chain.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::config::SelectionConfig;
use crate::git::GitHistory;
use crate::models::{Chain, Commit};
use crate::pipeline::artifact::write_atomic;

/// Change-intent verbs. Matching is case-insensitive and whole-word.
pub const KEYWORDS: &[&str] = &[
    "FIX", "FIXES", "FIXED",
    "IMPLEMENTS", "IMPLEMENTED", "IMPLEMENT",
    "BUG", "BUGS",
    "FEATURE", "FEATURES",
    "CHANGE", "CHANGES", "CHANGED",
    "ADDED", "ADDS", "ADD",
    "REMOVED", "REMOVES", "REMOVE",
    "REFACTOR", "REFACTORS", "REFACTORED",
    "UPDATE", "UPDATES", "UPDATED",
    "MODIFY", "MODIFIES", "MODIFIED",
    "CORRECT", "CORRECTS", "CORRECTED",
    "SOLVE", "SOLVES", "SOLVED",
    "RESOLVE", "RESOLVES", "RESOLVED",
    "REPAIR", "REPAIRS", "REPAIRED",
    "DELETE", "DELETES", "DELETED",
    "PATCH", "PATCHES", "PATCHED",
    "CLEAN", "CLEANS", "CLEANED",
    "RENAME", "RENAMES", "RENAMED",
    "REFORMAT", "REFORMATS", "REFORMATTED",
];

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[A-Za-z]+").expect("valid regex"))
}

/// Number of distinct change-intent keywords in a commit message.
pub fn keyword_hits(message: &str) -> usize {
    let hits: HashSet<String> = word_regex()
        .find_iter(message)
        .map(|m| m.as_str().to_ascii_uppercase())
        .filter(|w| KEYWORDS.contains(&w.as_str()))
        .collect();
    hits.len()
}

/// A commit is a chain candidate when its message names at most one intent.
pub fn looks_atomic(commit: &Commit) -> bool {
    keyword_hits(&commit.message) <= 1
}

/// Select chains from a full commit listing.
///
/// Commits are grouped by author and each author's commits are scanned in
/// timestamp order. Authors are visited in name order so the output is
/// deterministic; no ordering between authors is promised beyond that.
pub fn select_chains(commits: &[Commit], config: &SelectionConfig) -> Vec<Chain> {
    let mut by_author: BTreeMap<&str, Vec<&Commit>> = BTreeMap::new();
    for commit in commits {
        by_author.entry(commit.author.as_str()).or_default().push(commit);
    }

    by_author
        .into_values()
        .flat_map(|mut history| {
            history.sort_by_key(|c| c.timestamp);
            chains_for_author(&history, config)
        })
        .collect()
}

/// Greedy chain construction over one author's time-sorted history.
///
/// The seed must look atomic; extensions are taken from the commits that
/// immediately follow it, at most `max_extension` of them, stopping at the
/// first one that is outside the day window or not atomic. Consumed commits
/// are never revisited.
fn chains_for_author(history: &[&Commit], config: &SelectionConfig) -> Vec<Chain> {
    let window = config.window();
    let mut chains = Vec::new();
    let mut cursor = 0;

    while cursor < history.len() {
        let seed = history[cursor];
        cursor += 1;
        if !looks_atomic(seed) {
            debug!("Skipping tangled-looking seed {}", seed.hash);
            continue;
        }

        let extension: Vec<&Commit> = history[cursor..]
            .iter()
            .take(config.max_extension)
            .take_while(|c| c.timestamp - seed.timestamp <= window && looks_atomic(c))
            .copied()
            .collect();
        cursor += extension.len();

        if extension.is_empty() {
            continue;
        }
        let hashes = std::iter::once(seed)
            .chain(extension)
            .map(|c| c.hash.clone())
            .collect();
        if let Some(chain) = Chain::new(hashes) {
            chains.push(chain);
        }
    }

    chains
}

/// Read the repository history and select chains from it.
pub fn select_from_repository(repo_path: &Path, config: &SelectionConfig) -> Result<Vec<Chain>> {
    let history = GitHistory::open(repo_path)?;
    let commits = history
        .all_commits()
        .with_context(|| format!("Failed to read history of {}", repo_path.display()))?;
    let chains = select_chains(&commits, config);
    info!(
        "Selected {} chains from {} commits in {}",
        chains.len(),
        commits.len(),
        repo_path.display()
    );
    Ok(chains)
}

/// Load a chain list, or select and persist one when the file is absent.
pub fn load_or_select(
    chains_path: &Path,
    repo_path: &Path,
    config: &SelectionConfig,
) -> Result<Vec<Chain>> {
    if chains_path.exists() {
        let chains = load_chains(chains_path)?;
        info!("Loaded {} chains from {}", chains.len(), chains_path.display());
        return Ok(chains);
    }
    let chains = select_from_repository(repo_path, config)?;
    save_chains(chains_path, &chains)?;
    Ok(chains)
}

pub fn load_chains(path: &Path) -> Result<Vec<Chain>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chain list {}", path.display()))?;
    let raw: Vec<Vec<String>> = serde_json::from_str(&data)
        .with_context(|| format!("Malformed chain list {}", path.display()))?;
    raw.into_iter()
        .enumerate()
        .map(|(i, commits)| {
            Chain::new(commits).with_context(|| format!("Chain #{} in {} is empty", i, path.display()))
        })
        .collect()
}

pub fn save_chains(path: &Path, chains: &[Chain]) -> Result<()> {
    let data = serde_json::to_string(chains)?;
    write_atomic(path, data.as_bytes())
        .with_context(|| format!("Failed to write chain list {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn commit(hash: &str, author: &str, day: i64, message: &str) -> Commit {
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        Commit::new(hash, author, base + Duration::days(day), message)
    }

    fn hashes(chain: &Chain) -> Vec<&str> {
        chain.commits().iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_keyword_hits_distinct_and_case_insensitive() {
        assert_eq!(keyword_hits("Fix typo"), 1);
        assert_eq!(keyword_hits("fix: FIX again"), 1);
        assert_eq!(keyword_hits("Fix bug in parser"), 2);
        assert_eq!(keyword_hits("Add feature, remove dead code"), 3);
        assert_eq!(keyword_hits("prefix suffix fixture"), 0);
        assert_eq!(keyword_hits(""), 0);
    }

    #[test]
    fn test_empty_history() {
        assert!(select_chains(&[], &SelectionConfig::default()).is_empty());
    }

    #[test]
    fn test_single_commit_author_contributes_nothing() {
        let commits = vec![commit("a", "alice", 0, "Fix it")];
        assert!(select_chains(&commits, &SelectionConfig::default()).is_empty());
    }

    #[test]
    fn test_chain_same_author_within_window() {
        let commits = vec![
            commit("a1", "alice", 0, "Fix null check"),
            commit("b1", "bob", 1, "Add logging"),
            commit("a2", "alice", 2, "Rename variable"),
            commit("a3", "alice", 3, "tweak"),
        ];
        let chains = select_chains(&commits, &SelectionConfig::default());
        assert_eq!(chains.len(), 1);
        assert_eq!(hashes(&chains[0]), vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn test_history_is_sorted_by_timestamp() {
        let commits = vec![
            commit("late", "alice", 5, "tweak"),
            commit("early", "alice", 0, "tweak"),
        ];
        let chains = select_chains(&commits, &SelectionConfig::default());
        assert_eq!(hashes(&chains[0]), vec!["early", "late"]);
    }

    #[test]
    fn test_tangled_seed_is_skipped_but_cursor_advances() {
        let commits = vec![
            commit("t", "alice", 0, "Fix bug and add feature"),
            commit("a", "alice", 1, "tweak"),
            commit("b", "alice", 2, "tweak"),
        ];
        let chains = select_chains(&commits, &SelectionConfig::default());
        assert_eq!(chains.len(), 1);
        assert_eq!(hashes(&chains[0]), vec!["a", "b"]);
    }

    #[test]
    fn test_extension_stops_outside_window() {
        let commits = vec![
            commit("a", "alice", 0, "tweak"),
            commit("b", "alice", 10, "tweak"),
            commit("c", "alice", 20, "tweak"),
            commit("d", "alice", 21, "tweak"),
        ];
        let chains = select_chains(&commits, &SelectionConfig::default());
        assert_eq!(chains.len(), 2);
        assert_eq!(hashes(&chains[0]), vec!["a", "b"]);
        assert_eq!(hashes(&chains[1]), vec!["c", "d"]);
    }

    #[test]
    fn test_extension_stops_at_tangled_commit() {
        let commits = vec![
            commit("a", "alice", 0, "tweak"),
            commit("b", "alice", 1, "tweak"),
            commit("x", "alice", 2, "Update docs and fix build"),
            commit("c", "alice", 3, "tweak"),
        ];
        let chains = select_chains(&commits, &SelectionConfig::default());
        assert_eq!(chains.len(), 1);
        assert_eq!(hashes(&chains[0]), vec!["a", "b"]);
    }

    #[test]
    fn test_extension_is_bounded() {
        let commits: Vec<Commit> = (0..7)
            .map(|i| commit(&format!("c{}", i), "alice", i, "tweak"))
            .collect();
        let chains = select_chains(&commits, &SelectionConfig::default());
        assert_eq!(chains[0].len(), 5);
        assert_eq!(hashes(&chains[1]), vec!["c5", "c6"]);
    }

    #[test]
    fn test_no_commit_in_two_chains() {
        let commits: Vec<Commit> = (0..20)
            .map(|i| commit(&format!("c{}", i), "alice", i * 3, "tweak"))
            .collect();
        let chains = select_chains(&commits, &SelectionConfig::default());
        let mut seen = HashSet::new();
        for chain in &chains {
            for hash in chain.commits() {
                assert!(seen.insert(hash.clone()), "{} selected twice", hash);
            }
        }
    }

    #[test]
    fn test_chains_satisfy_selection_invariants() {
        let messages = ["tweak", "Fix bug", "Fix bug and add test", "cleanup", "Add api"];
        let authors = ["alice", "bob", "carol"];
        let commits: Vec<Commit> = (0..60)
            .map(|i| {
                commit(
                    &format!("c{}", i),
                    authors[i % 3],
                    (i as i64 * 7) % 45,
                    messages[(i * 7) % messages.len()],
                )
            })
            .collect();
        let by_hash: std::collections::HashMap<&str, &Commit> =
            commits.iter().map(|c| (c.hash.as_str(), c)).collect();
        let config = SelectionConfig::default();

        for chain in select_chains(&commits, &config) {
            assert!(chain.len() >= 2);
            let members: Vec<&Commit> = chain.commits().iter().map(|h| by_hash[h.as_str()]).collect();
            assert!(keyword_hits(&members[0].message) <= 1);
            for pair in members.windows(2) {
                assert_eq!(pair[0].author, pair[1].author);
                assert!(pair[1].timestamp >= pair[0].timestamp);
                assert!(pair[1].timestamp - pair[0].timestamp <= Duration::days(config.day_window));
            }
        }
    }

    #[test]
    fn test_chain_file_roundtrip_and_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chains.json");
        let chains = vec![Chain::new(vec!["a".into(), "b".into()]).unwrap()];
        save_chains(&path, &chains).unwrap();

        // The repository path is never touched when the file exists.
        let loaded = load_or_select(&path, Path::new("/nonexistent"), &SelectionConfig::default()).unwrap();
        assert_eq!(loaded, chains);
    }

    #[test]
    fn test_empty_chain_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chains.json");
        std::fs::write(&path, r#"[["a","b"],[]]"#).unwrap();
        assert!(load_chains(&path).is_err());
    }
}
