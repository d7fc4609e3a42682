//! CLI command definitions and handlers

mod corpus;
mod select;
mod stats;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::ProgressStyle;
use std::path::PathBuf;

use crate::config::{load_corpus_config, Language};

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// tangle-pdg - ground-truth corpora of tangled commits
#[derive(Parser, Debug)]
#[command(name = "tangle-pdg")]
#[command(
    version,
    about = "Build delta-PDG corpora of synthetic tangled commits with per-node provenance labels",
    after_help = "\
Examples:
  tangle-pdg select ./subjects/jfreechart -o chains.json
  tangle-pdg corpus chains.json ./subjects/jfreechart /tmp/tangle extractor.jar 0 8
  tangle-pdg stats ./subjects/jfreechart --chains chains.json"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Path to tangle.toml (default: ./tangle.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select chains of atomic-looking commits and write them as JSON
    Select {
        /// Subject repository
        repo: PathBuf,

        /// Chain list to write
        #[arg(long, short = 'o', default_value = "chains.json")]
        output: PathBuf,
    },

    /// Replay chains and write one delta-PDG per (chain, step, file)
    #[command(after_help = "\
The chain list is selected from the repository and written to CHAINS_JSON
when that file does not exist yet. Artifacts already present under the
output directory are skipped, so an interrupted run can simply be restarted.")]
    Corpus {
        /// Chain list (JSON array of arrays of commit hashes)
        chains: PathBuf,

        /// Subject repository
        repo: PathBuf,

        /// Scratch directory for working copies and intermediate graphs
        temp: PathBuf,

        /// PDG extractor jar
        extractor: PathBuf,

        /// Id of the first worker
        worker_start: usize,

        /// Number of parallel workers (1-64)
        #[arg(value_parser = parse_workers)]
        workers: usize,

        /// Language whose files are tracked
        #[arg(long, value_enum, default_value = "java")]
        language: Language,

        /// Corpus output directory (default from config: data/corpora_raw)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Allowed drift of a method signature; 0 requires exact signatures
        #[arg(long)]
        method_fuzziness: Option<u32>,

        /// Allowed drift of a statement span
        #[arg(long)]
        node_fuzziness: Option<u32>,
    },

    /// Show size statistics of a subject repository
    Stats {
        /// Subject repository
        repo: PathBuf,

        /// Language whose files are counted
        #[arg(long, value_enum, default_value = "java")]
        language: Language,

        /// Also summarize a chain list
        #[arg(long)]
        chains: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI command
pub fn run(cli: Cli) -> Result<()> {
    let config = load_corpus_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Select { repo, output } => select::run(&repo, &output, &config),

        Commands::Corpus {
            chains,
            repo,
            temp,
            extractor,
            worker_start,
            workers,
            language,
            output,
            method_fuzziness,
            node_fuzziness,
        } => {
            let mut config = config;
            if let Some(dir) = output {
                config.output.corpus_dir = dir;
            }
            if let Some(n) = method_fuzziness {
                config.merge.method_fuzziness = n;
            }
            if let Some(n) = node_fuzziness {
                config.merge.node_fuzziness = n;
            }
            corpus::run(corpus::CorpusArgs {
                chains_path: chains,
                repo,
                temp,
                extractor,
                worker_start,
                workers,
                language,
                config,
            })
        }

        Commands::Stats {
            repo,
            language,
            chains,
            json,
        } => stats::run(&repo, language, chains.as_deref(), json),
    }
}

/// Create bar progress style
pub(crate) fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}
