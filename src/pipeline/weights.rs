//! Census population weights
//!
//! Turns census cell counts into a population-weight vector aligned
//! index-for-index with the cells, `w[i] = count[i] / sum(count)`.

use polars::prelude::*;

use super::error::{PostStratError, Result};
use super::tables::CensusTable;

/// Normalise cell counts into weights that sum to 1.
///
/// # Errors
/// - any count is NaN or infinite
/// - any count is negative
/// - the total count is zero (the weights would be NaN)
pub fn population_weights(counts: &[f64]) -> Result<Vec<f64>> {
    for (index, &value) in counts.iter().enumerate() {
        if !value.is_finite() {
            return Err(PostStratError::InvalidCount { index, value });
        }
        if value < 0.0 {
            return Err(PostStratError::NegativeCount { index, value });
        }
    }

    let total = total_count(counts);
    if total <= 0.0 {
        return Err(PostStratError::DegenerateAggregate(format!(
            "total census count is zero across {} cell(s); population weights are undefined",
            counts.len()
        )));
    }

    Ok(counts.iter().map(|c| c / total).collect())
}

/// Sum of counts, independent of their order
#[inline]
pub fn total_count(counts: &[f64]) -> f64 {
    stable_sum(counts.iter().copied())
}

/// Sum that does not depend on the order of its terms.
///
/// Terms are sorted before accumulation, so any permutation of the same
/// values produces a bitwise-identical result.
pub fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut terms: Vec<f64> = values.into_iter().collect();
    terms.sort_by(|a, b| a.total_cmp(b));
    terms.into_iter().sum()
}

/// Derives population weights from a census tabulation
#[derive(Debug, Clone, Copy, Default)]
pub struct CensusWeighter;

impl CensusWeighter {
    pub fn new() -> Self {
        Self
    }

    /// One weight per census cell, in cell order
    pub fn weights(&self, census: &CensusTable) -> Result<Vec<f64>> {
        let weights = population_weights(&census.counts())?;
        let zero_cells = census.cells.iter().filter(|c| c.count == 0.0).count();
        if zero_cells > 0 {
            log::debug!("{} census cell(s) have zero population", zero_cells);
        }
        Ok(weights)
    }
}

/// Extract the count column of a census DataFrame as f64.
///
/// A null count is an [`PostStratError::InvalidCount`] for that cell.
/// Non-null values are validated later by [`population_weights`].
pub fn get_counts(df: &DataFrame, count_column: &str) -> Result<Vec<f64>> {
    let column = df
        .column(count_column)
        .map_err(|_| PostStratError::MissingColumn(count_column.to_string()))?;

    let float_col = column.cast(&DataType::Float64).map_err(|_| {
        PostStratError::Config(format!(
            "Count column '{}' must be numeric (cannot cast to Float64)",
            count_column
        ))
    })?;
    let ca = float_col.f64()?;

    let mut counts = Vec::with_capacity(df.height());
    for (index, opt_val) in ca.iter().enumerate() {
        match opt_val {
            Some(c) => counts.push(c),
            None => {
                return Err(PostStratError::InvalidCount {
                    index,
                    value: f64::NAN,
                })
            }
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_cell_weights_exact() {
        let weights = population_weights(&[30.0, 70.0]).unwrap();
        assert_eq!(weights, vec![0.3, 0.7]);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let weights = population_weights(&[3.0, 11.0, 0.0, 1234.0, 7.0]).unwrap();
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(weights.iter().all(|w| *w >= 0.0));
    }

    #[test]
    fn test_all_zero_counts_errors() {
        let err = population_weights(&[0.0, 0.0, 0.0]).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_empty_counts_errors() {
        assert!(population_weights(&[]).is_err());
    }

    #[test]
    fn test_negative_count_errors() {
        let err = population_weights(&[1.0, -2.0]).unwrap_err();
        assert!(matches!(err, PostStratError::NegativeCount { index: 1, .. }));
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_nan_and_infinite_counts_error() {
        assert!(matches!(
            population_weights(&[1.0, f64::NAN]),
            Err(PostStratError::InvalidCount { index: 1, .. })
        ));
        assert!(matches!(
            population_weights(&[f64::INFINITY]),
            Err(PostStratError::InvalidCount { index: 0, .. })
        ));
    }

    #[test]
    fn test_stable_sum_is_permutation_invariant() {
        let a = [0.1, 1e16, -1e16, 0.2, 0.3];
        let b = [0.3, -1e16, 0.2, 1e16, 0.1];
        assert_eq!(stable_sum(a).to_bits(), stable_sum(b).to_bits());
    }

    #[test]
    fn test_get_counts_from_integer_column() {
        let df = df! {
            "Gender" => ["Male", "Female"],
            "Count" => [30i64, 70],
        }
        .unwrap();
        assert_eq!(get_counts(&df, "Count").unwrap(), vec![30.0, 70.0]);
    }

    #[test]
    fn test_get_counts_null_is_invalid_count() {
        let count_series = Series::new("Count".into(), &[Some(5.0), None, Some(2.0)]);
        let mut df = df! { "Gender" => ["Male", "Female", "Male"] }.unwrap();
        let _ = df.with_column(count_series).unwrap();
        assert!(matches!(
            get_counts(&df, "Count"),
            Err(PostStratError::InvalidCount { index: 1, .. })
        ));
    }

    #[test]
    fn test_get_counts_missing_column_errors() {
        let df = df! { "Gender" => ["Male"] }.unwrap();
        assert!(matches!(
            get_counts(&df, "Count"),
            Err(PostStratError::MissingColumn(_))
        ));
    }
}
