//! Input/Output operations module.
//!
//! Handles reading the denoised collection and writing the reporting
//! artifacts: read-tracking stats, absolute and relative ASV tables and the
//! representative-sequence FASTA. Tables are tab-separated and never quoted.

pub mod denoised; // Sub-module for the denoised sample collection

use crate::count_table::CountTable;
use crate::pipeline::report::StatsRow;
use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// First line of every ASV table, recognised by biom-format converters.
pub const TABLE_COMMENT: &str = "# Constructed from biom file";

/// Header of the ASV identifier column.
pub const ASV_ID_HEADER: &str = "#ASV_ID";

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
    Ok(BufWriter::new(file))
}

fn tsv_writer<W: Write>(out: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .has_headers(false)
        .from_writer(out)
}

/// Writes the read-tracking table (`file`, `denoised`, `nonchim`).
pub fn write_stats(rows: &[StatsRow], output_path: &Path) -> Result<()> {
    let mut writer = tsv_writer(create(output_path)?);
    writer.write_record(["file", "denoised", "nonchim"])?;
    for row in rows {
        writer.write_record(&[
            row.file.clone(),
            row.denoised.to_string(),
            row.nonchim.to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
    Ok(())
}

/// Writes absolute ASV counts: comment line, then
/// `#ASV_ID  sequence  <samples...>` and one row per ASV.
pub fn write_count_table(table: &CountTable, output_path: &Path) -> Result<()> {
    write_asv_table(table, output_path, true)
}

/// Writes relative abundances with the same layout as the absolute table,
/// minus the sequence column. Zero-total samples appear as `NaN`.
pub fn write_relative_table(table: &CountTable, output_path: &Path) -> Result<()> {
    write_asv_table(table, output_path, false)
}

fn write_asv_table(table: &CountTable, output_path: &Path, with_sequences: bool) -> Result<()> {
    let mut out = create(output_path)?;
    writeln!(out, "{}", TABLE_COMMENT)?;
    let mut writer = tsv_writer(out);

    // Prepare header: "#ASV_ID" (and "sequence") followed by sample labels
    let mut header = vec![ASV_ID_HEADER.to_string()];
    if with_sequences {
        header.push("sequence".to_string());
    }
    header.extend(table.sample_names().iter().cloned());
    writer.write_record(&header)?;

    let counts = table.counts_matrix();
    for (r, (asv_id, sequence)) in table.asv_sequences().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(asv_id.to_string());
        if with_sequences {
            record.push(sequence.to_string());
        }
        record.extend(counts.row(r).iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
    Ok(())
}

/// Writes pre-formatted FASTA lines, one per line.
pub fn write_fasta(lines: &[String], output_path: &Path) -> Result<()> {
    let mut out = create(output_path)?;
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
        .with_context(|| format!("Failed to write '{}'", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use std::fs;
    use tempfile::tempdir;

    // Helper to create a simple CountTable for testing
    fn create_test_count_table() -> CountTable {
        CountTable {
            counts: arr2(&[[100.0, 0.0], [5.0, 0.0]]),
            feature_names: vec!["ASV_1".to_string(), "ASV_2".to_string()],
            sequences: vec!["ACGT".to_string(), "ACGA".to_string()],
            sample_names: vec!["S1".to_string(), "NA".to_string()],
        }
    }

    #[test]
    fn test_write_count_table_tsv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("feature-table.tsv");

        write_count_table(&create_test_count_table(), &file_path).unwrap();

        let content = fs::read_to_string(file_path).unwrap();
        let expected_content = "\
# Constructed from biom file\n\
#ASV_ID\tsequence\tS1\tNA\n\
ASV_1\tACGT\t100\t0\n\
ASV_2\tACGA\t5\t0\n";
        assert_eq!(content, expected_content);
    }

    #[test]
    fn test_write_relative_table_writes_nan() {
        let mut table = create_test_count_table();
        table.counts = arr2(&[[0.5, f64::NAN], [0.5, f64::NAN]]);
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("rel.tsv");

        write_relative_table(&table, &file_path).unwrap();

        let content = fs::read_to_string(file_path).unwrap();
        let expected_content = "\
# Constructed from biom file\n\
#ASV_ID\tS1\tNA\n\
ASV_1\t0.5\tNaN\n\
ASV_2\t0.5\tNaN\n";
        assert_eq!(content, expected_content);
    }

    #[test]
    fn test_write_stats_tsv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("stats.tsv");
        let rows = vec![StatsRow {
            file: "A.fastq".to_string(),
            denoised: 105,
            nonchim: 100,
        }];

        write_stats(&rows, &file_path).unwrap();

        let content = fs::read_to_string(file_path).unwrap();
        assert_eq!(content, "file\tdenoised\tnonchim\nA.fastq\t105\t100\n");
    }

    #[test]
    fn test_write_fasta() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("seqs.fasta");
        let lines = vec![">ASV_1".to_string(), "ACGT".to_string()];

        write_fasta(&lines, &file_path).unwrap();

        assert_eq!(fs::read_to_string(file_path).unwrap(), ">ASV_1\nACGT\n");
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing_dir").join("stats.tsv");
        assert!(write_stats(&[], &file_path).is_err());
    }
}
