//! Reference-free bimera test for a single sequence.
//!
//! A query is a bimera when its prefix is matched exactly by one more
//! abundant "parent" and its suffix by another, together spanning the whole
//! query. Comparisons are ungapped: prefixes are aligned on the left end and
//! suffixes on the right end, so length differences between query and
//! parent are tolerated but internal indels are not.
//!
//! With one-off tolerance enabled, one mismatch may be absorbed by either
//! the left or the right segment, provided the parent contributing that
//! segment differs from the query in at least `min_one_off_parent_distance`
//! positions.

/// How far a parent explains the query from each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParentOverlap {
    /// Length of the exactly matching prefix.
    pub left: usize,
    /// Length of the exactly matching suffix.
    pub right: usize,
    /// Prefix length allowing one mismatch.
    pub left_one_off: usize,
    /// Suffix length allowing one mismatch.
    pub right_one_off: usize,
    /// Mismatches over the left-anchored overlap plus the length difference.
    pub distance: usize,
}

/// Length of the matching run from the start of `pairs`, tolerating
/// `allowed` mismatches.
fn matching_run<I>(pairs: I, allowed: usize) -> usize
where
    I: Iterator<Item = (u8, u8)>,
{
    let mut mismatches = 0;
    let mut run = 0;
    for (a, b) in pairs {
        if a != b {
            mismatches += 1;
            if mismatches > allowed {
                break;
            }
        }
        run += 1;
    }
    run
}

/// Compares `query` against one candidate parent.
pub fn compare_to_parent(query: &[u8], parent: &[u8]) -> ParentOverlap {
    let forward = || query.iter().copied().zip(parent.iter().copied());
    let backward = || {
        query
            .iter()
            .rev()
            .copied()
            .zip(parent.iter().rev().copied())
    };

    let overlap = query.len().min(parent.len());
    let mismatches = forward().filter(|(a, b)| a != b).count();

    ParentOverlap {
        left: matching_run(forward(), 0),
        right: matching_run(backward(), 0),
        left_one_off: matching_run(forward(), 1),
        right_one_off: matching_run(backward(), 1),
        distance: mismatches + query.len().max(parent.len()) - overlap,
    }
}

/// Tests whether `query` can be built from two of `parents`.
///
/// Returns `false` as soon as any single parent explains the whole query,
/// since a sequence identical to (or contained in) a parent is not a bimera.
pub fn is_bimera(
    query: &[u8],
    parents: &[&[u8]],
    allow_one_off: bool,
    min_one_off_parent_distance: usize,
) -> bool {
    let len = query.len();
    if len == 0 || parents.len() < 2 {
        return false;
    }

    let mut max_left = 0;
    let mut max_right = 0;
    let mut max_left_one_off = 0;
    let mut max_right_one_off = 0;

    for parent in parents {
        let overlap = compare_to_parent(query, parent);
        if overlap.left + overlap.right >= len {
            return false;
        }
        max_left = max_left.max(overlap.left);
        max_right = max_right.max(overlap.right);
        if allow_one_off && overlap.distance >= min_one_off_parent_distance {
            max_left_one_off = max_left_one_off.max(overlap.left_one_off);
            max_right_one_off = max_right_one_off.max(overlap.right_one_off);
        }
    }

    if max_left + max_right >= len {
        return true;
    }
    allow_one_off
        && (max_left_one_off + max_right >= len || max_left + max_right_one_off >= len)
}
