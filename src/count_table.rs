//! Sequence tables and ASV count tables.
//!
//! A [`SequenceTable`] is the sample x sequence abundance matrix built from
//! the denoised collection; chimera removal operates on it. A [`CountTable`]
//! is its transposed, reporting-oriented form: ASVs as rows, samples as
//! columns, with synthetic ASV identifiers and the underlying sequences.

use crate::io::denoised::DenoisedCollection;
use crate::pipeline::PipelineError;
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use std::collections::HashMap;

/// Sample x sequence abundance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTable {
    /// Abundances, one row per sample and one column per unique sequence.
    pub counts: Array2<u64>,
    /// Sample (input file) identifiers, row order.
    pub sample_names: Vec<String>,
    /// Unique sequences, column order.
    pub sequences: Vec<String>,
}

impl SequenceTable {
    /// Creates a table after checking that the matrix matches the labels.
    pub fn from_parts(
        sample_names: Vec<String>,
        sequences: Vec<String>,
        counts: Array2<u64>,
    ) -> Result<Self, PipelineError> {
        if counts.dim() != (sample_names.len(), sequences.len()) {
            return Err(PipelineError::InvalidParameter(format!(
                "count matrix is {:?} but there are {} samples and {} sequences",
                counts.dim(),
                sample_names.len(),
                sequences.len()
            )));
        }
        Ok(SequenceTable {
            counts,
            sample_names,
            sequences,
        })
    }

    /// Merges every sample's unique sequences into a shared column space.
    ///
    /// Columns are ordered by decreasing total abundance; ties keep the order
    /// in which sequences were first seen.
    pub fn from_denoised(denoised: &DenoisedCollection) -> Result<Self, PipelineError> {
        if denoised.is_empty() {
            return Err(PipelineError::Denoised(
                "cannot build a sequence table from zero samples".to_string(),
            ));
        }

        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<(&str, u64)> = Vec::new();
        for sample in denoised.values() {
            for (seq, &abundance) in &sample.uniques {
                match first_seen.get(seq.as_str()) {
                    Some(&idx) => order[idx].1 += abundance,
                    None => {
                        first_seen.insert(seq.as_str(), order.len());
                        order.push((seq.as_str(), abundance));
                    }
                }
            }
        }
        // Stable sort keeps first-appearance order for equal totals.
        order.sort_by(|a, b| b.1.cmp(&a.1));

        let column: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(col, (seq, _))| (*seq, col))
            .collect();

        let mut counts = Array2::<u64>::zeros((denoised.len(), order.len()));
        for (row, sample) in denoised.values().enumerate() {
            for (seq, &abundance) in &sample.uniques {
                counts[[row, column[seq.as_str()]]] += abundance;
            }
        }

        let lengths: Vec<usize> = order.iter().map(|(seq, _)| seq.len()).collect();
        if let (Some(min), Some(max)) = (lengths.iter().min(), lengths.iter().max()) {
            if min != max {
                debug!("Sequence lengths vary from {} to {} bp", min, max);
            }
        }

        info!(
            "Sequence table: {} samples x {} unique sequences",
            denoised.len(),
            order.len()
        );

        Self::from_parts(
            denoised.keys().cloned().collect(),
            order.into_iter().map(|(seq, _)| seq.to_string()).collect(),
            counts,
        )
    }

    /// Reads per sample (row sums).
    pub fn sample_totals(&self) -> Array1<u64> {
        self.counts.sum_axis(Axis(1))
    }

    /// Reads per sequence over all samples (column sums).
    pub fn sequence_totals(&self) -> Array1<u64> {
        self.counts.sum_axis(Axis(0))
    }

    /// Keeps only the sequence columns whose `keep` flag is set.
    pub fn select_sequences(&self, keep: &[bool]) -> Self {
        let columns: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(col, &k)| k.then_some(col))
            .collect();
        SequenceTable {
            counts: self.counts.select(Axis(1), &columns),
            sample_names: self.sample_names.clone(),
            sequences: columns.iter().map(|&c| self.sequences[c].clone()).collect(),
        }
    }

    /// Drops sequence columns with no reads in any sample.
    pub fn drop_empty_sequences(&self) -> Self {
        let keep: Vec<bool> = self.sequence_totals().iter().map(|&t| t > 0).collect();
        self.select_sequences(&keep)
    }

    /// Transposes into an ASV x sample table with `ASV_1..ASV_n` identifiers.
    ///
    /// Column labels are still the input file identifiers; relabel them
    /// through the manifest before reporting.
    pub fn transpose(&self) -> CountTable {
        let feature_names = (1..=self.sequences.len())
            .map(|i| format!("ASV_{}", i))
            .collect();
        CountTable {
            counts: self.counts.t().mapv(|c| c as f64),
            feature_names,
            sequences: self.sequences.clone(),
            sample_names: self.sample_names.clone(),
        }
    }
}

/// ASV x sample table used for reporting.
///
/// Stores counts as f64 so the same structure carries relative abundances.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    /// The core count data matrix (ASVs x samples).
    pub counts: Array2<f64>,

    /// ASV identifiers (row labels).
    pub feature_names: Vec<String>,

    /// Sequence for each ASV row.
    pub sequences: Vec<String>,

    /// Sample labels (column names).
    pub sample_names: Vec<String>,
}

impl CountTable {
    /// Returns the dimensions of the count table (features, samples).
    pub fn dimensions(&self) -> (usize, usize) {
        self.counts.dim()
    }

    /// Returns a reference to the underlying count matrix.
    pub fn counts_matrix(&self) -> &Array2<f64> {
        &self.counts
    }

    /// Returns a mutable reference to the underlying count matrix.
    pub fn counts_matrix_mut(&mut self) -> &mut Array2<f64> {
        &mut self.counts
    }

    /// Returns the list of ASV identifiers.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Returns the list of sample labels.
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    /// Replaces the sample labels, one per column in current column order.
    pub fn relabel_samples(&mut self, labels: Vec<String>) -> Result<(), PipelineError> {
        if labels.len() != self.sample_names.len() {
            return Err(PipelineError::InvalidParameter(format!(
                "{} labels supplied for {} sample columns",
                labels.len(),
                self.sample_names.len()
            )));
        }
        self.sample_names = labels;
        Ok(())
    }

    /// (ASV id, sequence) pairs in row order.
    pub fn asv_sequences(&self) -> impl Iterator<Item = (&str, &str)> {
        self.feature_names
            .iter()
            .zip(&self.sequences)
            .map(|(id, seq)| (id.as_str(), seq.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::denoised::DenoisedSample;
    use ndarray::arr2;

    fn sample(pairs: &[(&str, u64)]) -> DenoisedSample {
        let mut s = DenoisedSample::default();
        for (seq, n) in pairs {
            s.add(seq, *n);
        }
        s
    }

    fn two_sample_collection() -> DenoisedCollection {
        let mut dd = DenoisedCollection::new();
        dd.insert(
            "A.fastq".to_string(),
            sample(&[("AAAA", 100), ("CCCC", 5)]),
        );
        dd.insert("B.fastq".to_string(), sample(&[("GGGG", 50)]));
        dd
    }

    #[test]
    fn test_from_denoised_orders_by_abundance() {
        let table = SequenceTable::from_denoised(&two_sample_collection()).unwrap();
        assert_eq!(table.counts.dim(), (2, 3));
        assert_eq!(table.sample_names, vec!["A.fastq", "B.fastq"]);
        assert_eq!(table.sequences, vec!["AAAA", "GGGG", "CCCC"]);
        assert_eq!(table.counts, arr2(&[[100, 0, 5], [0, 50, 0]]));
        assert_eq!(table.sample_totals().to_vec(), vec![105, 50]);
        assert_eq!(table.sequence_totals().to_vec(), vec![100, 50, 5]);
    }

    #[test]
    fn test_shared_sequences_merge_into_one_column() {
        let mut dd = DenoisedCollection::new();
        dd.insert("A".to_string(), sample(&[("AAAA", 3), ("CCCC", 3)]));
        dd.insert("B".to_string(), sample(&[("CCCC", 4)]));
        let table = SequenceTable::from_denoised(&dd).unwrap();
        assert_eq!(table.sequences, vec!["CCCC", "AAAA"]);
        assert_eq!(table.counts, arr2(&[[3, 3], [4, 0]]));
    }

    #[test]
    fn test_empty_collection_rejected() {
        assert!(SequenceTable::from_denoised(&DenoisedCollection::new()).is_err());
    }

    #[test]
    fn test_from_parts_checks_shape() {
        let result = SequenceTable::from_parts(
            vec!["A".to_string()],
            vec!["AC".to_string(), "GT".to_string()],
            Array2::zeros((1, 3)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_select_and_drop_empty() {
        let table = SequenceTable::from_parts(
            vec!["A".to_string(), "B".to_string()],
            vec!["S1".to_string(), "S2".to_string(), "S3".to_string()],
            arr2(&[[1, 0, 2], [3, 0, 4]]),
        )
        .unwrap();

        let dropped = table.drop_empty_sequences();
        assert_eq!(dropped.sequences, vec!["S1", "S3"]);
        assert_eq!(dropped.counts, arr2(&[[1, 2], [3, 4]]));

        let selected = table.select_sequences(&[false, true, true]);
        assert_eq!(selected.sequences, vec!["S2", "S3"]);
        assert_eq!(selected.counts.row(1).to_vec(), vec![0, 4]);
    }

    #[test]
    fn test_transpose_assigns_sequential_ids() {
        let table = SequenceTable::from_denoised(&two_sample_collection()).unwrap();
        let counts = table.transpose();
        assert_eq!(counts.dimensions(), (3, 2));
        assert_eq!(counts.feature_names(), ["ASV_1", "ASV_2", "ASV_3"]);
        assert_eq!(counts.sample_names(), ["A.fastq", "B.fastq"]);
        assert_eq!(
            counts.counts_matrix(),
            &arr2(&[[100.0, 0.0], [0.0, 50.0], [5.0, 0.0]])
        );
        let pairs: Vec<(&str, &str)> = counts.asv_sequences().collect();
        assert_eq!(pairs[2], ("ASV_3", "CCCC"));
    }

    #[test]
    fn test_relabel_samples_checks_length() {
        let mut counts = SequenceTable::from_denoised(&two_sample_collection())
            .unwrap()
            .transpose();
        assert!(counts.relabel_samples(vec!["S1".to_string()]).is_err());
        counts
            .relabel_samples(vec!["S1".to_string(), "S2".to_string()])
            .unwrap();
        assert_eq!(counts.sample_names(), ["S1", "S2"]);
    }
}
