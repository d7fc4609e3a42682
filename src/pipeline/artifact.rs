//! Corpus artifact layout
//!
//! ```text
//! <corpus_dir>/<repository>/<anchor>_<tail>/<step>/<file basename>.dot
//! ```
//!
//! An artifact's presence on disk is the only record that its
//! (chain, step, file) has been processed, so writes go through
//! [`write_atomic`] and a reader never sees a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::Chain;

/// Identity of one delta-PDG artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub repository: String,
    pub anchor: String,
    pub tail: String,
    pub step: usize,
    /// Repository-relative path of the source file
    pub file: String,
}

impl ArtifactKey {
    pub fn new(repository: &str, chain: &Chain, step: usize, file: &str) -> Self {
        Self {
            repository: repository.to_string(),
            anchor: chain.anchor().to_string(),
            tail: chain.tail().to_string(),
            step,
            file: file.to_string(),
        }
    }

    /// Final file name: the source basename with `.dot` appended
    pub fn file_name(&self) -> String {
        let basename = self.file.rsplit('/').next().unwrap_or(&self.file);
        format!("{}.dot", basename)
    }

    /// Location of the artifact under `corpus_dir`
    pub fn path(&self, corpus_dir: &Path) -> PathBuf {
        corpus_dir
            .join(&self.repository)
            .join(format!("{}_{}", self.anchor, self.tail))
            .join(self.step.to_string())
            .join(self.file_name())
    }

    /// Whether the artifact already exists under `corpus_dir`
    pub fn exists_in(&self, corpus_dir: &Path) -> bool {
        self.path(corpus_dir).is_file()
    }
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, then rename it into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
