//! Loading of denoised per-sample sequence collections.
//!
//! Two layouts are understood:
//!
//! * a JSON document mapping each input file identifier to its unique
//!   sequences and abundances (optionally gzip-compressed, detected by a
//!   `.gz` suffix):
//!
//!   ```json
//!   { "A.fastq": { "uniques": { "ACGT...": 100, "ACGA...": 5 } } }
//!   ```
//!
//! * a directory of dereplicated FASTA files, one per sample, where each
//!   record header carries a `;size=<n>` abundance annotation. The sample's
//!   file identifier is the file name with its FASTA/gzip suffixes removed,
//!   so `A.fastq.fasta.gz` describes `A.fastq`.

use crate::pipeline::PipelineError;
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use log::{debug, info, warn};
use needletail::parse_fastx_file;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

const FASTA_EXTENSIONS: &[&str] = &["fasta", "fa", "fna"];

/// Unique sequences (and their abundances) that survived denoising for one input file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DenoisedSample {
    /// Unique sequence -> abundance, in input order.
    pub uniques: IndexMap<String, u64>,
}

impl DenoisedSample {
    /// Reads surviving denoising: the sum of all unique-sequence abundances.
    pub fn total_reads(&self) -> u64 {
        self.uniques.values().sum()
    }

    /// Adds `abundance` reads of `sequence`, merging case-insensitive duplicates.
    pub fn add(&mut self, sequence: &str, abundance: u64) {
        *self
            .uniques
            .entry(sequence.trim().to_ascii_uppercase())
            .or_insert(0) += abundance;
    }

    fn normalized(self) -> Self {
        let mut out = DenoisedSample::default();
        for (seq, abundance) in self.uniques {
            out.add(&seq, abundance);
        }
        out
    }
}

/// File identifier -> denoised sample, in input order.
pub type DenoisedCollection = IndexMap<String, DenoisedSample>;

/// Loads a denoised collection from a JSON file or a directory of FASTA files.
pub fn load_denoised(path: &Path) -> Result<DenoisedCollection, PipelineError> {
    let collection = if path.is_dir() {
        load_fasta_dir(path)?
    } else {
        load_json(path)?
    };

    if collection.is_empty() {
        return Err(PipelineError::Denoised(format!(
            "no samples found in '{}'",
            path.display()
        )));
    }

    info!(
        "Loaded {} denoised sample(s) from {}",
        collection.len(),
        path.display()
    );
    Ok(collection)
}

fn load_json(path: &Path) -> Result<DenoisedCollection, PipelineError> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |ext| ext == "gz") {
        debug!("Reading gzip-compressed JSON from {}", path.display());
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let raw: DenoisedCollection = serde_json::from_reader(BufReader::new(reader))?;
    Ok(raw
        .into_iter()
        .map(|(id, sample)| (id, sample.normalized()))
        .collect())
}

fn load_fasta_dir(dir: &Path) -> Result<DenoisedCollection, PipelineError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && fasta_file_id(path).is_some())
        .collect();
    // Directory order is unspecified; sort for a reproducible sample order.
    files.sort();

    let mut collection = DenoisedCollection::new();
    for path in files {
        let Some(file_id) = fasta_file_id(&path) else {
            continue;
        };
        let sample = read_size_annotated_fasta(&path)?;
        if collection.insert(file_id.clone(), sample).is_some() {
            return Err(PipelineError::Denoised(format!(
                "more than one FASTA file maps to sample file '{}'",
                file_id
            )));
        }
    }
    Ok(collection)
}

fn read_size_annotated_fasta(path: &Path) -> Result<DenoisedSample, PipelineError> {
    let mut reader = parse_fastx_file(path)?;
    let mut sample = DenoisedSample::default();
    let mut unsized_records = 0usize;

    while let Some(record) = reader.next() {
        let record = record?;
        let id = String::from_utf8_lossy(record.id()).into_owned();
        let abundance = match parse_size_annotation(&id) {
            Some(size) => size,
            None => {
                unsized_records += 1;
                1
            }
        };
        let seq = record.seq();
        let seq = std::str::from_utf8(&seq).map_err(|_| {
            PipelineError::Denoised(format!(
                "non-UTF-8 sequence in record '{}' of {}",
                id,
                path.display()
            ))
        })?;
        sample.add(seq, abundance);
    }

    if unsized_records > 0 {
        warn!(
            "{} record(s) in {} lack a ';size=' annotation; counted as abundance 1",
            unsized_records,
            path.display()
        );
    }
    Ok(sample)
}

/// Extracts the abundance from a `;size=<n>` header annotation.
pub fn parse_size_annotation(header: &str) -> Option<u64> {
    header
        .split(';')
        .find_map(|field| field.trim().strip_prefix("size="))
        .and_then(|value| value.trim().parse().ok())
}

/// File identifier for a FASTA path, or `None` when the path is not FASTA.
fn fasta_file_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(".gz").unwrap_or(name);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || !FASTA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return None;
    }
    Some(stem.to_string())
}
