use crate::chimera::{remove_bimeras, ChimeraSummary, DenovoDetector};
use crate::config::Config;
use crate::count_table::SequenceTable;
use crate::io::denoised::load_denoised;
use crate::io::{write_count_table, write_fasta, write_relative_table, write_stats};
use crate::manifest::load_manifest;
use crate::normalization::relative_abundance;
use crate::pipeline::report::{build_stats, fasta_lines, generate_report, StatsRow};
use crate::utils::{ParallelConfig, ParallelError, ParallelExecutor};
use anyhow::{Context, Result};
use log::info;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input denoised object not found: {}\nPass an existing file or directory with --dadaObj (see --help).", .0.display())]
    MissingInput(PathBuf),

    #[error("No manifest supplied; --manifest <FILE> is required to label samples (see --help).")]
    MissingManifest,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Denoised input error: {0}")]
    Denoised(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Needletail parsing error: {0}")]
    NeedletailError(#[from] needletail::errors::ParseError),

    #[error("Parallel execution error: {0}")]
    ParallelError(#[from] ParallelError),
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: Vec<StatsRow>,
    pub chimeras: ChimeraSummary,
    pub asvs: usize,
}

/// Runs the whole step: load, build the sequence table, remove bimeras and
/// write the four outputs. Outputs written before a failure are left in place.
pub fn run(config: &Config) -> Result<RunSummary> {
    let start_time = Instant::now();

    info!("Reading manifest {}", config.manifest.display());
    let manifest = load_manifest(&config.manifest)?;
    info!("Manifest lists {} file(s)", manifest.len());

    info!("Loading denoised object {}", config.dada_obj.display());
    let denoised = load_denoised(&config.dada_obj)
        .with_context(|| format!("Failed to load '{}'", config.dada_obj.display()))?;

    let seqtab = SequenceTable::from_denoised(&denoised)?;

    let executor = ParallelExecutor::new(Some(ParallelConfig {
        threads: config.threads,
    }))
    .map_err(PipelineError::from)?;
    info!("Using {} thread(s) for bimera detection", executor.threads());
    let detector = DenovoDetector::new(&config.chimera, &executor);
    let (nochim, chimeras) = remove_bimeras(&seqtab, &detector, &config.chimera)?;

    let stats = build_stats(&denoised, &nochim);
    info!("Writing read-tracking stats to {}", config.outputs.stats.display());
    write_stats(&stats, &config.outputs.stats)?;

    let mut table = nochim.transpose();
    let labels = manifest.resolve_labels(table.sample_names());
    table.relabel_samples(labels)?;

    info!("Writing feature table to {}", config.outputs.table.display());
    write_count_table(&table, &config.outputs.table)?;

    info!(
        "Writing representative sequences to {}",
        config.outputs.repseqs.display()
    );
    write_fasta(&fasta_lines(&table), &config.outputs.repseqs)?;

    info!(
        "Writing relative feature table to {}",
        config.outputs.reltable.display()
    );
    write_relative_table(&relative_abundance(&table), &config.outputs.reltable)?;

    info!("{}", generate_report(&stats, &chimeras));
    info!(
        "Finished in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(RunSummary {
        stats,
        chimeras,
        asvs: table.dimensions().0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chimera::ChimeraParams;
    use crate::config::OutputPaths;
    use std::fs;
    use tempfile::tempdir;

    fn write_inputs(dir: &std::path::Path, denoised_json: &str) -> (PathBuf, PathBuf) {
        let dd = dir.join("dd.json");
        fs::write(&dd, denoised_json).unwrap();
        let manifest = dir.join("manifest.csv");
        fs::write(
            &manifest,
            "sample.id,absolute.filepath\nS1,/reads/A.fastq\nS2,/reads/B.fastq\n",
        )
        .unwrap();
        (dd, manifest)
    }

    fn config(dir: &std::path::Path, dd: PathBuf, manifest: PathBuf) -> Config {
        Config {
            dada_obj: dd,
            manifest,
            chimera: ChimeraParams::default(),
            threads: 1,
            outputs: OutputPaths {
                stats: dir.join("stats.tsv"),
                table: dir.join("table.tsv"),
                reltable: dir.join("rel.tsv"),
                repseqs: dir.join("seqs.fasta"),
            },
        }
    }

    #[test]
    fn test_run_two_sample_scenario() {
        let dir = tempdir().unwrap();
        let (dd, manifest) = write_inputs(
            dir.path(),
            r#"{"A.fastq": {"uniques": {"AAAA": 100, "CCCC": 5}},
                "B.fastq": {"uniques": {"GGGG": 50}}}"#,
        );
        let config = config(dir.path(), dd, manifest);

        let summary = run(&config).unwrap();
        assert_eq!(summary.asvs, 3);
        assert_eq!(summary.chimeras.bimeras, 0);

        let table = fs::read_to_string(&config.outputs.table).unwrap();
        assert_eq!(
            table,
            "# Constructed from biom file\n\
             #ASV_ID\tsequence\tS1\tS2\n\
             ASV_1\tAAAA\t100\t0\n\
             ASV_2\tGGGG\t0\t50\n\
             ASV_3\tCCCC\t5\t0\n"
        );

        let fasta = fs::read_to_string(&config.outputs.repseqs).unwrap();
        assert_eq!(fasta, ">ASV_1\nAAAA\n>ASV_2\nGGGG\n>ASV_3\nCCCC\n");

        let stats = fs::read_to_string(&config.outputs.stats).unwrap();
        assert_eq!(
            stats,
            "file\tdenoised\tnonchim\nA.fastq\t105\t105\nB.fastq\t50\t50\n"
        );

        let rel = fs::read_to_string(&config.outputs.reltable).unwrap();
        let lines: Vec<&str> = rel.lines().collect();
        assert_eq!(lines[1], "#ASV_ID\tS1\tS2");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_run_removes_bimera_end_to_end() {
        let dir = tempdir().unwrap();
        let (dd, manifest) = write_inputs(
            dir.path(),
            r#"{"A.fastq": {"uniques": {
                    "AAAAAAAAAACCCCCCCCCC": 100,
                    "GGGGGGGGGGTTTTTTTTTT": 80,
                    "AAAAAAAAAATTTTTTTTTT": 5}}}"#,
        );
        let config = config(dir.path(), dd, manifest);

        let summary = run(&config).unwrap();
        assert_eq!(summary.chimeras.bimeras, 1);
        assert_eq!(summary.asvs, 2);
        assert_eq!(summary.stats[0].denoised, 185);
        assert_eq!(summary.stats[0].nonchim, 180);
    }

    #[test]
    fn test_run_missing_manifest_file_fails() {
        let dir = tempdir().unwrap();
        let (dd, _) = write_inputs(dir.path(), r#"{"A.fastq": {"uniques": {"AAAA": 1}}}"#);
        let config = config(dir.path(), dd, dir.path().join("absent.csv"));
        assert!(run(&config).is_err());
        assert!(!config.outputs.stats.exists());
    }
}
