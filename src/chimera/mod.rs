//! Bimera detection and removal on sequence tables.
//!
//! The per-sequence test lives in [`bimera`]; this module decides which
//! sequences are candidate parents, runs the test over a sequence table in
//! one of three modes and removes what is flagged.
//!
//! * `pooled` - all samples are summed and tested once.
//! * `consensus` - each sample is tested on its own; a sequence is removed
//!   when it is flagged in a sufficient fraction of the samples containing it.
//! * `per-sample` - each sample is tested on its own and flagged counts are
//!   zeroed in that sample only.

pub mod bimera;

use crate::count_table::SequenceTable;
use crate::pipeline::PipelineError;
use crate::utils::ParallelExecutor;
use clap::ValueEnum;
use log::{debug, info};
use std::fmt;

/// How samples are combined when looking for bimeras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChimeraMethod {
    Pooled,
    Consensus,
    PerSample,
}

impl fmt::Display for ChimeraMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChimeraMethod::Pooled => "pooled",
            ChimeraMethod::Consensus => "consensus",
            ChimeraMethod::PerSample => "per-sample",
        };
        f.write_str(name)
    }
}

/// Parameters for bimera detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChimeraParams {
    pub method: ChimeraMethod,
    /// Also flag sequences one mismatch away from an exact bimera.
    pub allow_one_off: bool,
    /// Parents need at least this many reads.
    pub min_parent_abundance: u64,
    /// Parents need more than this multiple of the query's reads.
    pub min_fold_parent_over_abundance: f64,
    /// Minimum distance between query and a parent used for one-off matches.
    pub min_one_off_parent_distance: usize,
    /// Consensus: fraction of containing samples that must flag a sequence.
    pub min_sample_fraction: f64,
    /// Consensus: unflagged samples ignored when applying the fraction.
    pub ignore_n_negatives: usize,
}

impl Default for ChimeraParams {
    fn default() -> Self {
        ChimeraParams {
            method: ChimeraMethod::Pooled,
            allow_one_off: true,
            min_parent_abundance: 8,
            min_fold_parent_over_abundance: 2.0,
            min_one_off_parent_distance: 4,
            min_sample_fraction: 0.9,
            ignore_n_negatives: 1,
        }
    }
}

impl ChimeraParams {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fold = self.min_fold_parent_over_abundance;
        if fold.is_nan() || fold < 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "parent over-abundance must be non-negative, got {}",
                fold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_sample_fraction) {
            return Err(PipelineError::InvalidParameter(format!(
                "minimum sample fraction must lie in [0, 1], got {}",
                self.min_sample_fraction
            )));
        }
        Ok(())
    }
}

/// A unique sequence and its abundance within the set being tested.
#[derive(Debug, Clone, Copy)]
pub struct Unique<'a> {
    pub sequence: &'a [u8],
    pub abundance: u64,
}

/// Flags bimeras within a set of unique sequences.
pub trait BimeraDetector: Sync {
    /// Returns one flag per entry of `uniques`; every other entry is a
    /// candidate parent.
    fn flag_bimeras(&self, uniques: &[Unique<'_>]) -> Vec<bool>;
}

/// De novo detector: parents are drawn from the tested set itself.
pub struct DenovoDetector<'a> {
    params: &'a ChimeraParams,
    executor: &'a ParallelExecutor,
}

impl<'a> DenovoDetector<'a> {
    pub fn new(params: &'a ChimeraParams, executor: &'a ParallelExecutor) -> Self {
        DenovoDetector { params, executor }
    }

    fn is_parent(&self, parent: &Unique<'_>, query: &Unique<'_>) -> bool {
        parent.abundance >= self.params.min_parent_abundance
            && parent.abundance as f64
                > self.params.min_fold_parent_over_abundance * query.abundance as f64
    }
}

impl BimeraDetector for DenovoDetector<'_> {
    fn flag_bimeras(&self, uniques: &[Unique<'_>]) -> Vec<bool> {
        self.executor.map(uniques, |i, query| {
            let parents: Vec<&[u8]> = uniques
                .iter()
                .enumerate()
                .filter(|&(j, parent)| j != i && self.is_parent(parent, query))
                .map(|(_, parent)| parent.sequence)
                .collect();
            bimera::is_bimera(
                query.sequence,
                &parents,
                self.params.allow_one_off,
                self.params.min_one_off_parent_distance,
            )
        })
    }
}

/// Statistics from bimera removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChimeraSummary {
    /// Sequence columns before removal.
    pub input_sequences: usize,
    /// Sequence columns removed.
    pub bimeras: usize,
    /// Reads before removal.
    pub input_reads: u64,
    /// Reads after removal.
    pub retained_reads: u64,
}

impl ChimeraSummary {
    /// Fraction of input reads kept, or `None` for an empty table.
    pub fn retained_fraction(&self) -> Option<f64> {
        (self.input_reads > 0).then(|| self.retained_reads as f64 / self.input_reads as f64)
    }
}

/// Removes bimeric sequences from `table` according to `params.method`.
pub fn remove_bimeras<D: BimeraDetector>(
    table: &SequenceTable,
    detector: &D,
    params: &ChimeraParams,
) -> Result<(SequenceTable, ChimeraSummary), PipelineError> {
    params.validate()?;
    info!("Removing bimeras ({} method)", params.method);

    let filtered = match params.method {
        ChimeraMethod::Pooled => {
            let flags = pooled_flags(table, detector);
            table.select_sequences(&flags.iter().map(|&f| !f).collect::<Vec<_>>())
        }
        ChimeraMethod::Consensus => {
            let flags = consensus_flags(table, detector, params);
            table.select_sequences(&flags.iter().map(|&f| !f).collect::<Vec<_>>())
        }
        ChimeraMethod::PerSample => {
            let mut zeroed = table.clone();
            for row in 0..table.sample_names.len() {
                for (col, flagged) in sample_flags(table, row, detector) {
                    if flagged {
                        zeroed.counts[[row, col]] = 0;
                    }
                }
            }
            zeroed.drop_empty_sequences()
        }
    };

    let summary = ChimeraSummary {
        input_sequences: table.sequences.len(),
        bimeras: table.sequences.len() - filtered.sequences.len(),
        input_reads: table.counts.sum(),
        retained_reads: filtered.counts.sum(),
    };
    info!(
        "Identified {} bimeras out of {} input sequences.",
        summary.bimeras, summary.input_sequences
    );
    if let Some(fraction) = summary.retained_fraction() {
        info!("{:.2}% of reads retained after bimera removal", fraction * 100.0);
    }

    Ok((filtered, summary))
}

fn pooled_flags<D: BimeraDetector>(table: &SequenceTable, detector: &D) -> Vec<bool> {
    let totals = table.sequence_totals();
    let uniques: Vec<Unique<'_>> = table
        .sequences
        .iter()
        .zip(totals.iter())
        .map(|(seq, &abundance)| Unique {
            sequence: seq.as_bytes(),
            abundance,
        })
        .collect();
    detector.flag_bimeras(&uniques)
}

/// Tests the sequences present in one sample; returns (column, flagged).
fn sample_flags<D: BimeraDetector>(
    table: &SequenceTable,
    row: usize,
    detector: &D,
) -> Vec<(usize, bool)> {
    let (columns, uniques): (Vec<usize>, Vec<Unique<'_>>) = table
        .counts
        .row(row)
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(col, &abundance)| {
            (
                col,
                Unique {
                    sequence: table.sequences[col].as_bytes(),
                    abundance,
                },
            )
        })
        .unzip();
    let flags = detector.flag_bimeras(&uniques);
    debug!(
        "Sample {}: {} of {} sequences flagged",
        table.sample_names[row],
        flags.iter().filter(|&&f| f).count(),
        flags.len()
    );
    columns.into_iter().zip(flags).collect()
}

fn consensus_flags<D: BimeraDetector>(
    table: &SequenceTable,
    detector: &D,
    params: &ChimeraParams,
) -> Vec<bool> {
    let n_sequences = table.sequences.len();
    let mut n_flagged = vec![0usize; n_sequences];
    let mut n_present = vec![0usize; n_sequences];

    for row in 0..table.sample_names.len() {
        for (col, flagged) in sample_flags(table, row, detector) {
            n_present[col] += 1;
            if flagged {
                n_flagged[col] += 1;
            }
        }
    }

    n_flagged
        .iter()
        .zip(&n_present)
        .map(|(&flagged, &present)| {
            let considered = present.saturating_sub(params.ignore_n_negatives);
            flagged > 0
                && (flagged >= present
                    || flagged as f64 >= considered as f64 * params.min_sample_fraction)
        })
        .collect()
}
