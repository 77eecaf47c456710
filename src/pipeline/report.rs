use crate::chimera::ChimeraSummary;
use crate::count_table::{CountTable, SequenceTable};
use crate::io::denoised::DenoisedCollection;
use itertools::Itertools;
use log::warn;
use std::collections::HashMap;

/// Read tracking for one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub file: String,
    /// Reads surviving denoising.
    pub denoised: u64,
    /// Reads surviving bimera removal.
    pub nonchim: u64,
}

/// One stats row per denoised input file, joined to the filtered table by
/// file identifier.
pub fn build_stats(denoised: &DenoisedCollection, filtered: &SequenceTable) -> Vec<StatsRow> {
    let totals = filtered.sample_totals();
    let nonchim_by_file: HashMap<&str, u64> = filtered
        .sample_names
        .iter()
        .map(String::as_str)
        .zip(totals.iter().copied())
        .collect();

    denoised
        .iter()
        .map(|(file, sample)| {
            let nonchim = nonchim_by_file.get(file.as_str()).copied().unwrap_or_else(|| {
                warn!("File '{}' is missing from the filtered table.", file);
                0
            });
            StatsRow {
                file: file.clone(),
                denoised: sample.total_reads(),
                nonchim,
            }
        })
        .collect()
}

/// FASTA lines for every ASV: `>ASV_n` followed by its sequence.
pub fn fasta_lines(table: &CountTable) -> Vec<String> {
    let headers = table.feature_names().iter().map(|id| format!(">{}", id));
    let sequences = table.sequences.iter().cloned();
    headers.interleave(sequences).collect()
}

/// Human-readable summary of one run.
pub fn generate_report(stats: &[StatsRow], summary: &ChimeraSummary) -> String {
    let mut lines = vec![
        format!(
            "Bimeras removed: {} of {} sequences",
            summary.bimeras, summary.input_sequences
        ),
        format!(
            "Reads retained: {} of {}",
            summary.retained_reads, summary.input_reads
        ),
    ];
    lines.extend(stats.iter().map(|row| {
        format!(
            "  {}: {} denoised, {} non-chimeric",
            row.file, row.denoised, row.nonchim
        )
    }));
    lines.join("\n")
}
