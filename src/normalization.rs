//! Provides functions for normalizing count data.
//!
//! Relative abundance scales every sample column of an ASV table so it sums
//! to one, making ASV proportions comparable across samples with different
//! sequencing depth.

use crate::count_table::CountTable;
use log::warn;
use ndarray::Axis;

/// Divides each sample column by its total so it sums to 1.0.
///
/// A sample with no reads has nothing to divide by; its column becomes NaN
/// rather than zeros, so an empty sample cannot be mistaken for one in which
/// every ASV was absent.
pub fn normalize_relative(table: &mut CountTable) {
    let library_sizes = table.counts_matrix().sum_axis(Axis(0)); // Sum counts per sample (column)

    for (name, &total) in table.sample_names().iter().zip(library_sizes.iter()) {
        if total <= 0.0 {
            warn!(
                "Sample '{}' has zero total counts; its relative abundances are NaN.",
                name
            );
        }
    }

    table
        .counts_matrix_mut()
        .axis_iter_mut(Axis(1)) // Iterate over columns (samples)
        .zip(library_sizes.iter())
        .for_each(|(mut col, &total_counts)| {
            if total_counts > 0.0 {
                col /= total_counts;
            } else {
                col.fill(f64::NAN);
            }
        });
}

/// Returns a relative-abundance copy of `table`, leaving the input untouched.
pub fn relative_abundance(table: &CountTable) -> CountTable {
    let mut relative = table.clone();
    normalize_relative(&mut relative);
    relative
}
