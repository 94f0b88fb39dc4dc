//! Detection dimensions
//!
//! Each submodule is one independent signal over a batch of bid documents.
//! Detectors only read the records they are given and never depend on each
//! other; the runner collects their [`bid_types::DimensionResult`]s.

pub mod entity_cross;
pub mod error_pattern;
pub mod format;
pub mod metadata;
pub mod price;
pub mod similarity;
pub mod timestamp;

/// Every unordered index pair `(i, j)` with `i < j < n`, in row-major order
pub fn unordered_pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
}

/// Every ordered index pair `(i, j)` with `i != j`
pub fn ordered_pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unordered_pairs() {
        let pairs: Vec<_> = unordered_pairs(4).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(unordered_pairs(0).count(), 0);
        assert_eq!(unordered_pairs(1).count(), 0);
    }

    #[test]
    fn test_ordered_pairs() {
        let pairs: Vec<_> = ordered_pairs(3).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: n documents yield n(n-1)/2 distinct pairs, never a self-pair
        #[test]
        fn unordered_pair_count(n in 0usize..40) {
            let pairs: Vec<_> = unordered_pairs(n).collect();
            prop_assert_eq!(pairs.len(), n * n.saturating_sub(1) / 2);
            let unique: std::collections::HashSet<_> = pairs.iter().collect();
            prop_assert_eq!(unique.len(), pairs.len());
            prop_assert!(pairs.iter().all(|(i, j)| i < j && *j < n));
        }
    }
}
