use crate::chimera::{ChimeraMethod, ChimeraParams};
use crate::config::{Config, OutputPaths};
use crate::pipeline::PipelineError;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Build an ASV table from denoised samples, remove bimeras and write
/// count tables, relative abundances and representative sequences.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Denoised samples: JSON (optionally .gz) or a directory of ';size=' annotated FASTA files
    #[arg(long = "dadaObj", value_name = "PATH", default_value = "dd.json")]
    pub dada_obj: PathBuf,

    /// Manifest CSV with 'sample.id' and 'absolute.filepath' columns
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Bimera detection mode
    #[arg(long, value_enum, default_value_t = ChimeraMethod::Pooled)]
    pub method: ChimeraMethod,

    /// Also flag sequences one mismatch away from an exact bimera
    #[arg(
        long = "allowOneOff",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub allow_one_off: bool,

    /// Minimum abundance of a parent sequence
    #[arg(long, default_value_t = 8)]
    pub minab: u64,

    /// Parents must be more than this many times as abundant as the query
    #[arg(long, default_value_t = 2)]
    pub overab: u64,

    /// Read-tracking stats output
    #[arg(long, value_name = "FILE", default_value = "denoise_stats.tsv")]
    pub stats: PathBuf,

    /// Absolute ASV count table output
    #[arg(long, value_name = "FILE", default_value = "feature-table.tsv")]
    pub table: PathBuf,

    /// Relative ASV abundance table output
    #[arg(long, value_name = "FILE", default_value = "rel-feature-table.tsv")]
    pub reltable: PathBuf,

    /// Representative sequences FASTA output
    #[arg(long, value_name = "FILE", default_value = "sequences.fasta")]
    pub repseqs: PathBuf,

    /// Number of threads for bimera detection (0 = all cores)
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Print timestamped progress to stderr
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Checks the inputs and freezes the arguments into a [`Config`].
    pub fn into_config(self) -> Result<Config, PipelineError> {
        if !self.dada_obj.exists() {
            return Err(PipelineError::MissingInput(self.dada_obj));
        }
        let manifest = self.manifest.ok_or(PipelineError::MissingManifest)?;

        let chimera = ChimeraParams {
            method: self.method,
            allow_one_off: self.allow_one_off,
            min_parent_abundance: self.minab,
            min_fold_parent_over_abundance: self.overab as f64,
            ..ChimeraParams::default()
        };
        chimera.validate()?;

        Ok(Config {
            dada_obj: self.dada_obj,
            manifest,
            chimera,
            threads: self.threads,
            outputs: OutputPaths {
                stats: self.stats,
                table: self.table,
                reltable: self.reltable,
                repseqs: self.repseqs,
            },
        })
    }
}
