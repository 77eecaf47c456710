//! Resolved run configuration.
//!
//! Built once from the command line and passed by reference to every stage.

use crate::chimera::ChimeraParams;
use std::path::PathBuf;

/// Where the four reporting artifacts go.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    /// Per-file read tracking.
    pub stats: PathBuf,
    /// Absolute ASV counts.
    pub table: PathBuf,
    /// Relative ASV abundances.
    pub reltable: PathBuf,
    /// Representative sequences (FASTA).
    pub repseqs: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub dada_obj: PathBuf,
    pub manifest: PathBuf,
    pub chimera: ChimeraParams,
    pub threads: usize,
    pub outputs: OutputPaths,
}
