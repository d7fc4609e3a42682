//! Unified diffs as line records

use anyhow::{Context, Result};
use git2::{DiffOptions, Repository};

use crate::models::{ChangeKind, DiffLine};

/// Diff two revisions and flatten the patch into [`DiffLine`] records.
///
/// Uses three lines of context. When `path` is given the diff is restricted
/// to it. File headers and "no newline at end of file" markers are dropped.
pub fn diff_between(
    repo: &Repository,
    from: &str,
    to: &str,
    path: Option<&str>,
) -> Result<Vec<DiffLine>> {
    let old_tree = repo
        .revparse_single(from)
        .and_then(|o| o.peel_to_tree())
        .with_context(|| format!("Cannot resolve tree for {}", from))?;
    let new_tree = repo
        .revparse_single(to)
        .and_then(|o| o.peel_to_tree())
        .with_context(|| format!("Cannot resolve tree for {}", to))?;

    let mut diff_opts = DiffOptions::new();
    diff_opts.context_lines(3);
    if let Some(p) = path {
        diff_opts.pathspec(p);
    }

    let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))?;

    let mut lines = Vec::new();
    diff.foreach(
        &mut |_, _| true,
        None,
        None,
        Some(&mut |delta, _hunk, line| {
            let Some(kind) = ChangeKind::from_origin(line.origin()) else {
                return true;
            };
            let file = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            let text = String::from_utf8_lossy(line.content())
                .trim_end_matches(['\n', '\r'])
                .to_string();
            lines.push(DiffLine {
                kind,
                file,
                after_line: line.new_lineno(),
                before_line: line.old_lineno(),
                text,
            });
            true
        }),
    )?;

    Ok(lines)
}

/// Files touched by a diff, in first-seen order.
pub fn touched_files(lines: &[DiffLine]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for line in lines.iter().filter(|l| l.kind.is_change()) {
        if !files.contains(&line.file) {
            files.push(line.file.clone());
        }
    }
    files
}
