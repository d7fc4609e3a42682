//! Select command - write the chain list for a repository

use anyhow::Result;
use console::style;
use std::path::Path;

use crate::config::CorpusConfig;
use crate::selector::{save_chains, select_from_repository};
use crate::stats::chain_stats;

pub fn run(repo: &Path, output: &Path, config: &CorpusConfig) -> Result<()> {
    let chains = select_from_repository(repo, &config.selection)?;
    save_chains(output, &chains)?;

    let shape = chain_stats(&chains);
    println!(
        "{}Selected {} chains from {}",
        style("✓ ").green(),
        style(shape.total).cyan(),
        repo.display()
    );
    for (len, count) in &shape.by_length {
        println!("  {} commits: {}", len, count);
    }
    println!("Written to {}", style(output.display()).bold());
    Ok(())
}
