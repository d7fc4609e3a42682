//! tangle-pdg - ground-truth corpora of tangled commits
//!
//! Selects chains of small same-author commits, replays each chain as one
//! composite change, and turns every touched file into a delta-PDG whose
//! changed nodes are labelled with the chain step that introduced them.

pub mod cli;
pub mod config;
pub mod delta;
pub mod git;
pub mod models;
pub mod pdg;
pub mod pipeline;
pub mod provenance;
pub mod selector;
pub mod stats;
