//! Stats command - repository size and chain-list shape

use anyhow::Result;
use console::style;
use serde_json::json;
use std::path::Path;

use crate::config::Language;
use crate::selector::load_chains;
use crate::stats::{chain_stats, project_stats};

pub fn run(repo: &Path, language: Language, chains: Option<&Path>, json: bool) -> Result<()> {
    let project = project_stats(repo, language)?;
    let shape = match chains {
        Some(path) => Some(chain_stats(&load_chains(path)?)),
        None => None,
    };

    if json {
        let out = json!({
            "repository": repo.display().to_string(),
            "language": language.extension(),
            "project": project,
            "chains": shape,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", style(repo.display()).bold());
    println!("  Commits:       {}", style(project.commits).cyan());
    println!(
        "  .{} files:    {}",
        language.extension(),
        style(project.source_files).cyan()
    );
    println!("  Code lines:    {}", style(project.code_lines).cyan());
    if let Some(head) = &project.head {
        println!("  HEAD:          {}", &head[..head.len().min(7)]);
    }
    if let Some(shape) = shape {
        println!("  Chains:        {}", style(shape.total).cyan());
        for (len, count) in &shape.by_length {
            println!("    {} commits:   {}", len, count);
        }
    }
    Ok(())
}
