//! Seeded train/test partitioning.

use crate::errors::ToolkitError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Training row indices, in shuffled order.
    pub train: Vec<usize>,
    /// Test row indices, in shuffled order.
    pub test: Vec<usize>,
}

/// Shuffles `0..n_rows` with a seeded generator and holds out
/// `ceil(test_fraction * n_rows)` rows for testing.
///
/// The same `(n_rows, test_fraction, seed)` always yields the same split.
///
/// # Errors
///
/// Returns `ToolkitError::InvalidParameter` if the fraction is outside
/// `(0, 1)` and `ToolkitError::EmptyInput` if either partition would be empty.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<Split, ToolkitError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ToolkitError::InvalidParameter(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_test = (test_fraction * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(ToolkitError::EmptyInput(format!(
            "cannot split {n_rows} rows into non-empty partitions with test fraction {test_fraction}"
        )));
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok(Split { train, test: order })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_round_test_up() {
        let split = train_test_split(569, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 114);
        assert_eq!(split.train.len(), 455);

        let split = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
    }

    #[test]
    fn test_partitions_cover_all_rows_once() {
        let split = train_test_split(50, 0.3, 7).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        assert_eq!(
            train_test_split(100, 0.2, 42).unwrap(),
            train_test_split(100, 0.2, 42).unwrap()
        );
        assert_ne!(
            train_test_split(100, 0.2, 42).unwrap(),
            train_test_split(100, 0.2, 43).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_fraction_and_tiny_input() {
        assert!(matches!(
            train_test_split(10, 1.0, 0),
            Err(ToolkitError::InvalidParameter(_))
        ));
        assert!(matches!(
            train_test_split(1, 0.2, 0),
            Err(ToolkitError::EmptyInput(_))
        ));
    }
}
