//! PDG extractor wrapper
//!
//! The extractor is an opaque Java tool that turns one source file into a
//! DOT graph:
//!
//! ```text
//! java -jar <extractor.jar> -d <source file> -p <output .dot>
//! ```
//!
//! Failures are reported as [`ExtractError`]; the pipeline treats them as
//! "skip this file" and moves on.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use super::dot::EMPTY_GRAPH;

/// Errors from one extractor invocation
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to launch extractor: {0}")]
    Spawn(std::io::Error),

    #[error("extractor exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    #[error("extractor timed out after {0}s")]
    Timeout(u64),

    #[error("extractor produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces a graph-description file for one source file of a snapshot.
pub trait PdgExtractor: Send + Sync {
    /// Write the PDG of `file` (relative to `snapshot_root`) to `target`.
    ///
    /// When `file` does not exist in the snapshot an empty graph is written.
    fn extract(&self, snapshot_root: &Path, file: &str, target: &Path) -> Result<(), ExtractError>;
}

/// Runs the extractor jar with a Java launcher.
#[derive(Debug, Clone)]
pub struct JarExtractor {
    java: String,
    jar: PathBuf,
    /// Zero disables the timeout
    timeout_secs: u64,
}

impl JarExtractor {
    pub fn new(java: impl Into<String>, jar: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            jar: jar.into(),
            timeout_secs: 0,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn wait(&self, mut child: std::process::Child) -> Result<(std::process::ExitStatus, String), ExtractError> {
        if self.timeout_secs == 0 {
            let output = child.wait_with_output()?;
            return Ok((output.status, String::from_utf8_lossy(&output.stderr).to_string()));
        }

        // Drain stderr while polling so a chatty extractor cannot fill the pipe
        let reader = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() > Duration::from_secs(self.timeout_secs) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractError::Timeout(self.timeout_secs));
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        let stderr = reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Ok((status, stderr))
    }
}

impl PdgExtractor for JarExtractor {
    fn extract(&self, snapshot_root: &Path, file: &str, target: &Path) -> Result<(), ExtractError> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // A stale graph from an earlier file must never be mistaken for output.
        if target.exists() {
            std::fs::remove_file(target)?;
        }

        let source = snapshot_root.join(file.trim_start_matches('/'));
        if !source.exists() {
            debug!("{} absent in {}, writing empty graph", file, snapshot_root.display());
            std::fs::write(target, EMPTY_GRAPH)?;
            return Ok(());
        }

        debug!("Generating PDG for {}", source.display());
        let child = Command::new(&self.java)
            .arg("-jar")
            .arg(&self.jar)
            .arg("-d")
            .arg(&source)
            .arg("-p")
            .arg(target)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExtractError::Spawn)?;

        let (status, stderr) = self.wait(child)?;
        if !status.success() {
            return Err(ExtractError::NonZeroExit {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            warn!("Extractor stderr for {}: {}", file, stderr.trim());
        }
        if !target.exists() {
            return Err(ExtractError::MissingOutput(target.to_path_buf()));
        }
        Ok(())
    }
}
