//! Configuration module
//!
//! This module handles:
//! - Corpus configuration (`tangle.toml`)
//! - Selection window, merge fuzziness and extractor defaults
//! - Source-language selection

mod corpus_config;

pub use corpus_config::{
    load_corpus_config,
    CorpusConfig,
    ExtractorConfig,
    Language,
    MergeConfig,
    OutputConfig,
    SelectionConfig,
    CONFIG_FILE_NAME,
};
