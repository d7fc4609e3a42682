//! Corpus generation pipeline
//!
//! Turns chains of atomic commits into delta-PDG artifacts:
//! 1. Clone the subject repository twice per chain (baseline `v1`, replay `v2`)
//! 2. Hold `v1` at the anchor's parent, start `v2` at the anchor
//! 3. Cherry-pick each further chain commit onto `v2`, recording the
//!    cumulative diff (anchor parent to tip) and the step's own diff
//! 4. For every touched source file: extract before/after PDGs, build the
//!    delta, attribute provenance and persist it
//!
//! Chains are split into contiguous shards, one per worker thread. Workers
//! share nothing but the output directory, whose artifact paths never
//! collide across chains.

pub mod artifact;
mod summary;

pub use artifact::{write_atomic, ArtifactKey};
pub use summary::RunSummary;

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Language, MergeConfig};
use crate::delta::DeltaBuilder;
use crate::git::diff::touched_files;
use crate::git::{ReplayError, WorkingCopy};
use crate::models::{Chain, DiffLine};
use crate::pdg::dot::{read_dot, to_dot};
use crate::pdg::{ExtractError, Pdg, PdgExtractor};
use crate::provenance;

/// Graph name written into every artifact
const ARTIFACT_GRAPH_NAME: &str = "deltaPDG";

/// Errors raised while processing one chain or one file of a chain
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("replay failed: {0}")]
    Replay(#[from] ReplayError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("no intermediate graph at {0}")]
    MissingIntermediate(PathBuf),

    #[error("diff failed: {0}")]
    Diff(anyhow::Error),

    #[error("unreadable graph: {0}")]
    Graph(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one (step, file) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Written,
    Cached,
}

/// Drives chains through replay, extraction, merge and attribution.
pub struct CorpusPipeline {
    repo_path: PathBuf,
    /// Basename of the subject repository, first component of artifact paths
    repo_name: String,
    temp_dir: PathBuf,
    corpus_dir: PathBuf,
    language: Language,
    merge: DeltaBuilder,
    extractor: Arc<dyn PdgExtractor>,
    progress: Option<ProgressBar>,
}

impl CorpusPipeline {
    pub fn new(
        repo_path: &Path,
        temp_dir: &Path,
        corpus_dir: &Path,
        extractor: Arc<dyn PdgExtractor>,
    ) -> Self {
        let repo_name = repo_path
            .canonicalize()
            .unwrap_or_else(|_| repo_path.to_path_buf())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string());
        Self {
            repo_path: repo_path.to_path_buf(),
            repo_name,
            temp_dir: temp_dir.to_path_buf(),
            corpus_dir: corpus_dir.to_path_buf(),
            language: Language::default(),
            merge: DeltaBuilder::from(MergeConfig::default()),
            extractor,
            progress: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = DeltaBuilder::from(merge);
        self
    }

    /// Advance `bar` once per finished chain.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// Process `chains` on `workers` threads, worker ids starting at
    /// `worker_start`. Only pool construction can fail; chain and file
    /// errors are logged and counted.
    pub fn run(&self, chains: &[Chain], worker_start: usize, workers: usize) -> anyhow::Result<RunSummary> {
        let shards = shard_chains(chains, workers);
        info!(
            "Processing {} chains of {} in {} shards",
            chains.len(),
            self.repo_name,
            shards.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()?;

        let summaries: Vec<RunSummary> = pool.install(|| {
            shards
                .par_iter()
                .enumerate()
                .map(|(i, shard)| self.run_worker(worker_start + i, shard))
                .collect()
        });

        let mut total = RunSummary::default();
        for summary in summaries {
            total.merge(summary);
        }
        Ok(total)
    }

    /// Process one shard sequentially in `<temp>/worker-<id>`.
    pub fn run_worker(&self, worker_id: usize, chains: &[Chain]) -> RunSummary {
        let scratch = self.temp_dir.join(format!("worker-{}", worker_id));
        let mut summary = RunSummary::default();

        for chain in chains {
            info!("Worker {} on chain {}", worker_id, chain);
            match self.process_chain(chain, &scratch) {
                Ok(chain_summary) => {
                    summary.merge(chain_summary);
                    summary.chains_completed += 1;
                }
                Err(e) => {
                    warn!("Abandoning chain {}: {}", chain, e);
                    summary.chains_abandoned += 1;
                    summary.abandoned.push(format!("{}: {}", chain, e));
                }
            }
            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
        }
        summary
    }

    /// Replay one chain and materialize its artifacts.
    ///
    /// Replay errors abort the chain. File-level errors are counted in the
    /// returned summary. Artifacts written before an abort stay valid.
    pub fn process_chain(&self, chain: &Chain, scratch: &Path) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        let v1 = WorkingCopy::create(&self.repo_path, scratch, "v1")?;
        let v2 = WorkingCopy::create(&self.repo_path, scratch, "v2")?;

        let parent = v1.parent_of(chain.anchor())?.to_string();
        v1.checkout(&parent)?;
        let anchor = v2.checkout(chain.anchor())?.to_string();

        let mut atomic: Vec<Vec<DiffLine>> = vec![v2.diff(&parent, &anchor, None).map_err(PipelineError::Diff)?];
        let mut previous = anchor;

        for (step, commit) in chain.steps() {
            let tip = v2.cherry_pick(commit)?.to_string();
            let cumulative = v2.diff(&parent, &tip, None).map_err(PipelineError::Diff)?;
            atomic.push(v2.diff(&previous, &tip, None).map_err(PipelineError::Diff)?);
            previous = tip;

            let files: Vec<String> = touched_files(&cumulative)
                .into_iter()
                .filter(|f| self.language.matches(f))
                .collect();
            debug!("Step {} of {} touches {} files", step, chain, files.len());

            for file in &files {
                let key = ArtifactKey::new(&self.repo_name, chain, step, file);
                match self.process_file(&v1, &v2, &key, &cumulative, &atomic, scratch) {
                    Ok(FileOutcome::Written) => summary.files_written += 1,
                    Ok(FileOutcome::Cached) => summary.files_cached += 1,
                    Err(PipelineError::MissingIntermediate(path)) => {
                        debug!("Nothing to merge for {}: {} missing", file, path.display());
                        summary.files_empty += 1;
                    }
                    Err(e) => {
                        warn!("Skipping {} at step {} of {}: {}", file, step, chain, e);
                        summary.files_failed += 1;
                    }
                }
            }
        }

        Ok(summary)
    }

    fn process_file(
        &self,
        v1: &WorkingCopy,
        v2: &WorkingCopy,
        key: &ArtifactKey,
        cumulative: &[DiffLine],
        atomic: &[Vec<DiffLine>],
        scratch: &Path,
    ) -> Result<FileOutcome, PipelineError> {
        if key.exists_in(&self.corpus_dir) {
            return Ok(FileOutcome::Cached);
        }

        let before_path = scratch.join("before_pdg.dot");
        let after_path = scratch.join("after_pdg.dot");
        self.extractor.extract(v1.root(), &key.file, &before_path)?;
        self.extractor.extract(v2.root(), &key.file, &after_path)?;
        let before = load_intermediate(&before_path)?;
        let after = load_intermediate(&after_path)?;

        let diff: Vec<DiffLine> = cumulative
            .iter()
            .filter(|l| l.file == key.file)
            .cloned()
            .collect();
        let mut delta = self.merge.build(&before, &after, &diff);
        provenance::label_provenance(&mut delta, &diff, atomic, &key.file);
        delta.set_filepath(&key.file);

        let target = key.path(&self.corpus_dir);
        write_atomic(&target, to_dot(&delta, ARTIFACT_GRAPH_NAME).as_bytes())?;
        debug!("Wrote {}", target.display());
        Ok(FileOutcome::Written)
    }
}

fn load_intermediate(path: &Path) -> Result<Pdg, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::MissingIntermediate(path.to_path_buf()));
    }
    read_dot(path).map_err(PipelineError::Graph)
}

/// Split `chains` into at most `workers` contiguous, disjoint shards of
/// near-equal size.
pub fn shard_chains(chains: &[Chain], workers: usize) -> Vec<&[Chain]> {
    if chains.is_empty() {
        return Vec::new();
    }
    let size = chains.len().div_ceil(workers.max(1));
    chains.chunks(size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chains(n: usize) -> Vec<Chain> {
        (0..n)
            .map(|i| Chain::new(vec![format!("a{}", i), format!("b{}", i)]).unwrap())
            .collect()
    }

    #[test]
    fn test_shards_cover_every_chain_once() {
        let all = chains(10);
        for workers in 1..=12 {
            let shards = shard_chains(&all, workers);
            assert!(shards.len() <= workers);
            let flat: Vec<&Chain> = shards.iter().flat_map(|s| s.iter()).collect();
            assert_eq!(flat.len(), all.len());
            for (a, b) in flat.iter().zip(all.iter()) {
                assert_eq!(*a, b);
            }
        }
    }

    #[test]
    fn test_shards_are_balanced() {
        let all = chains(10);
        let sizes: Vec<usize> = shard_chains(&all, 3).iter().map(|s| s.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_no_chains_no_shards() {
        assert!(shard_chains(&[], 4).is_empty());
    }

    #[test]
    fn test_missing_intermediate_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_intermediate(&dir.path().join("before_pdg.dot")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingIntermediate(_)));
    }
}
