//! Corpus configuration support
//!
//! Loads configuration from `tangle.toml`. Every key is optional; anything
//! left out falls back to the defaults shown below.
//!
//! # Configuration Format
//!
//! ```toml
//! # tangle.toml
//!
//! [selection]
//! day_window = 14      # max days between a chain seed and its extensions
//! max_extension = 4    # commits appended after the seed
//!
//! [merge]
//! method_fuzziness = 100
//! node_fuzziness = 100
//!
//! [extractor]
//! java = "java"
//! timeout_secs = 600  # 0 disables the timeout
//!
//! [output]
//! corpus_dir = "data/corpora_raw"
//! ```

use anyhow::Context;
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "tangle.toml";

/// Top-level corpus configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CorpusConfig {
    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Chain selection thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Max days between the chain seed and any extension
    pub day_window: i64,
    /// Max number of commits appended after the seed
    pub max_extension: usize,
}

/// Upper bound for `day_window` (about a century)
pub const MAX_DAY_WINDOW: i64 = 36_500;

impl SelectionConfig {
    /// The day window as a duration, clamped to `0..=MAX_DAY_WINDOW` days
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.day_window.clamp(0, MAX_DAY_WINDOW))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(0..=MAX_DAY_WINDOW).contains(&self.day_window) {
            anyhow::bail!(
                "selection.day_window must be between 0 and {}, got {}",
                MAX_DAY_WINDOW,
                self.day_window
            );
        }
        Ok(())
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            day_window: 14,
            max_extension: 4,
        }
    }
}

/// Delta-PDG alignment tolerances
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Allowed line drift of a method entry/exit before it counts as a different method.
    /// Zero requires byte-identical signatures.
    pub method_fuzziness: u32,
    /// Allowed line drift for statement-level correspondence
    pub node_fuzziness: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            method_fuzziness: 100,
            node_fuzziness: 100,
        }
    }
}

/// External PDG extractor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Launcher used to run the extractor jar
    pub java: String,
    /// Per-file extraction timeout in seconds (0 = none)
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Where corpus artifacts are written
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub corpus_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data/corpora_raw"),
        }
    }
}

/// Source language whose files are tracked through a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Java,
    Csharp,
    Python,
}

impl Language {
    /// File extension (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Csharp => "cs",
            Language::Python => "py",
        }
    }

    /// Whether a repository path belongs to this language
    pub fn matches(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension())
    }

    /// Line-comment marker used by project statistics
    pub fn line_comment(&self) -> &'static str {
        match self {
            Language::Java | Language::Csharp => "//",
            Language::Python => "#",
        }
    }

    /// Whether the language has C-style block comments
    pub fn has_block_comments(&self) -> bool {
        !matches!(self, Language::Python)
    }
}

/// Load corpus configuration.
///
/// An explicit path must exist. Without one, `tangle.toml` in the current
/// directory is used when present. A file that fails to parse is reported
/// and defaults are used instead; values out of range are an error.
pub fn load_corpus_config(explicit: Option<&Path>) -> anyhow::Result<CorpusConfig> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("Config file does not exist: {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let default = PathBuf::from(CONFIG_FILE_NAME);
            if !default.exists() {
                debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                return Ok(CorpusConfig::default());
            }
            default
        }
    };

    match load_toml_config(&path) {
        Ok(config) => {
            config
                .selection
                .validate()
                .with_context(|| format!("Invalid config {}", path.display()))?;
            debug!("Loaded corpus config from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            warn!("Failed to load {}: {}", path.display(), e);
            Ok(CorpusConfig::default())
        }
    }
}

fn load_toml_config(path: &Path) -> anyhow::Result<CorpusConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: CorpusConfig = toml::from_str(&content)?;
    Ok(config)
}
