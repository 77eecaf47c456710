//! Sample manifest handling.
//!
//! The manifest maps input read files to sample identifiers. Denoised data is
//! keyed by file, so every sample label in the output tables is resolved
//! through this file-basename -> sample-id join.

use anyhow::{anyhow, Context, Result};
use log::warn;
use std::collections::HashMap;
use std::path::Path;

/// Label used for a file that has no manifest entry.
pub const MISSING_SAMPLE_LABEL: &str = "NA";

const FILEPATH_COLUMNS: &[&str] = &["absolute.filepath", "absolute-filepath"];
const SAMPLE_ID_COLUMNS: &[&str] = &["sample.id", "sample-id"];

/// One manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub sample_id: String,
    pub file_path: String,
}

/// Ordered manifest rows plus the basename index used for joins.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    by_basename: HashMap<String, usize>,
}

impl Manifest {
    /// Creates a new, empty Manifest
    pub fn new() -> Self {
        Manifest::default()
    }

    /// Adds a row. The first row seen for a basename wins; later rows for the
    /// same basename are ignored with a warning.
    pub fn add_entry(&mut self, sample_id: &str, file_path: &str) {
        let key = basename(file_path);
        if let Some(&idx) = self.by_basename.get(&key) {
            let existing = &self.entries[idx];
            if existing.sample_id != sample_id {
                warn!(
                    "File '{}' is assigned to both sample '{}' and sample '{}'; keeping '{}'.",
                    key, existing.sample_id, sample_id, existing.sample_id
                );
            } else {
                warn!("Duplicate manifest row for file '{}' ignored.", key);
            }
            return;
        }
        self.by_basename.insert(key, self.entries.len());
        self.entries.push(ManifestEntry {
            sample_id: sample_id.to_string(),
            file_path: file_path.to_string(),
        });
    }

    /// Sample id for a file identifier (compared by basename).
    pub fn sample_for_file(&self, file_id: &str) -> Option<&str> {
        self.by_basename
            .get(&basename(file_id))
            .map(|&idx| self.entries[idx].sample_id.as_str())
    }

    /// Resolves file identifiers to sample labels, keeping their order.
    ///
    /// Files without a manifest entry get [`MISSING_SAMPLE_LABEL`].
    pub fn resolve_labels(&self, file_ids: &[String]) -> Vec<String> {
        file_ids
            .iter()
            .map(|file_id| match self.sample_for_file(file_id) {
                Some(sample_id) => sample_id.to_string(),
                None => {
                    warn!(
                        "File '{}' has no manifest entry; labelling it '{}'.",
                        file_id, MISSING_SAMPLE_LABEL
                    );
                    MISSING_SAMPLE_LABEL.to_string()
                }
            })
            .collect()
    }

    /// Returns the number of rows in the manifest
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Final path component, or the whole string when it has none.
pub fn basename(path: &str) -> String {
    Path::new(path.trim())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.trim().to_string())
}

/// Loads a manifest from a comma-separated file with a header row.
///
/// Requires `absolute.filepath` and `sample.id` columns (the hyphenated
/// spellings are accepted too); other columns are ignored.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let mut rdr = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open manifest '{}'", path.display()))?;

    let headers = rdr.headers()?.clone();
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let path_col = find(FILEPATH_COLUMNS)
        .ok_or_else(|| anyhow!("Manifest missing 'absolute.filepath' column"))?;
    let sample_col =
        find(SAMPLE_ID_COLUMNS).ok_or_else(|| anyhow!("Manifest missing 'sample.id' column"))?;

    let mut manifest = Manifest::new();
    for result in rdr.records() {
        let record = result?;
        let sample_id = record.get(sample_col).unwrap_or_default();
        let file_path = record.get(path_col).unwrap_or_default();

        if sample_id.is_empty() || file_path.is_empty() {
            warn!("Skipping manifest row with empty sample id or file path.");
            continue;
        }
        manifest.add_entry(sample_id, file_path);
    }

    if manifest.is_empty() {
        warn!(
            "No valid rows found in manifest file '{}'; every sample will be labelled '{}'.",
            path.display(),
            MISSING_SAMPLE_LABEL
        );
    }

    Ok(manifest)
}
