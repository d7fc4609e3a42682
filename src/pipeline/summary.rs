use serde::Serialize;

/// Counters for one worker's run, mergeable into a total
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Chains whose replay finished
    pub chains_completed: usize,
    /// Chains abandoned on a replay error
    pub chains_abandoned: usize,
    /// Artifacts written
    pub files_written: usize,
    /// Artifacts already on disk
    pub files_cached: usize,
    /// Files with no intermediate graph to merge
    pub files_empty: usize,
    /// Files skipped after an extraction, graph or IO error
    pub files_failed: usize,
    /// Chains left out, as `[anchor..tail]: reason`
    pub abandoned: Vec<String>,
}

impl RunSummary {
    /// Fold another summary into this one.
    pub fn merge(&mut self, other: RunSummary) {
        self.chains_completed += other.chains_completed;
        self.chains_abandoned += other.chains_abandoned;
        self.files_written += other.files_written;
        self.files_cached += other.files_cached;
        self.files_empty += other.files_empty;
        self.files_failed += other.files_failed;
        self.abandoned.extend(other.abandoned);
    }

    pub fn chains_seen(&self) -> usize {
        self.chains_completed + self.chains_abandoned
    }
}
