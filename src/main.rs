//! Main entry point for the asv_chimera application.
//!
//! One step of an amplicon-sequencing workflow:
//! 1. Load the denoised per-sample sequences and the sample manifest.
//! 2. Merge them into a sample x sequence table.
//! 3. Remove bimeras (pooled, consensus or per-sample).
//! 4. Write read-tracking stats, absolute and relative ASV tables and
//!    representative sequences.

// Modules defined within the project
mod chimera;
mod cli;
mod config;
mod count_table;
mod io;
mod manifest;
mod normalization;
mod pipeline;
mod utils;

use cli::Cli;

// External Crate Imports
use anyhow::Result;
use clap::Parser;
use log::{debug, info};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

/// Main function: parses arguments and runs the pipeline.
fn main() -> Result<()> {
    // --help and --version exit inside parse(), before any input is touched.
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("Arguments: {:?}", cli);

    let config = cli.into_config()?;
    let summary = pipeline::run(&config)?;

    info!(
        "Wrote {} ASVs for {} file(s); {} bimeras removed.",
        summary.asvs,
        summary.stats.len(),
        summary.chimeras.bimeras
    );
    Ok(())
}
