//! Corpus command - replay chains and write delta-PDG artifacts

use anyhow::{bail, Result};
use console::style;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::create_bar_style;
use crate::config::{CorpusConfig, Language};
use crate::git::GitHistory;
use crate::pdg::JarExtractor;
use crate::pipeline::{CorpusPipeline, RunSummary};
use crate::selector::load_or_select;

pub(super) struct CorpusArgs {
    pub chains_path: PathBuf,
    pub repo: PathBuf,
    pub temp: PathBuf,
    pub extractor: PathBuf,
    pub worker_start: usize,
    pub workers: usize,
    pub language: Language,
    pub config: CorpusConfig,
}

pub(super) fn run(args: CorpusArgs) -> Result<()> {
    if !GitHistory::is_git_repo(&args.repo) {
        bail!("Not a git repository: {}", args.repo.display());
    }
    if !args.extractor.is_file() {
        bail!("Extractor not found: {}", args.extractor.display());
    }
    std::fs::create_dir_all(&args.temp)?;

    let chains = load_or_select(&args.chains_path, &args.repo, &args.config.selection)?;
    let start = Instant::now();

    let extractor = JarExtractor::new(args.config.extractor.java.clone(), args.extractor.clone())
        .with_timeout(args.config.extractor.timeout_secs);

    let bar = ProgressBar::new(chains.len() as u64);
    bar.set_style(create_bar_style());
    bar.set_message("Replaying chains...");

    let pipeline = CorpusPipeline::new(
        &args.repo,
        &args.temp,
        &args.config.output.corpus_dir,
        Arc::new(extractor),
    )
    .with_language(args.language)
    .with_merge(args.config.merge)
    .with_progress(bar.clone());

    info!(
        "Workers {}..{} writing to {}",
        args.worker_start,
        args.worker_start + args.workers,
        args.config.output.corpus_dir.display()
    );
    let summary = pipeline.run(&chains, args.worker_start, args.workers)?;
    bar.finish_with_message(format!(
        "{}Processed {} chains",
        style("✓ ").green(),
        style(summary.chains_seen()).cyan()
    ));

    print_summary(&summary, pipeline.repo_name(), start.elapsed().as_secs_f64());
    Ok(())
}

fn print_summary(summary: &RunSummary, repo_name: &str, secs: f64) {
    println!();
    println!("{} {}", style("Corpus").bold(), style(repo_name).bold());
    println!(
        "  Chains:    {} completed, {} abandoned",
        style(summary.chains_completed).green(),
        style(summary.chains_abandoned).yellow()
    );
    println!(
        "  Artifacts: {} written, {} already present",
        style(summary.files_written).green(),
        style(summary.files_cached).cyan()
    );
    println!(
        "  Skipped:   {} failed, {} with nothing to merge",
        style(summary.files_failed).yellow(),
        summary.files_empty
    );
    for entry in &summary.abandoned {
        println!("    {} {}", style("-").dim(), entry);
    }
    println!("  Time:      {:.1}s", secs);
}
