//! Error types for the post-stratification pipeline.
//!
//! Every failure that could otherwise surface as a silent NaN in an estimate
//! has its own variant here, so callers can tell a vocabulary mismatch apart
//! from an empty census or an unalignable label list.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised while encoding, fitting, weighting or aggregating.
#[derive(Error, Debug)]
pub enum PostStratError {
    /// A category value outside the fitted or fixed vocabulary of a field.
    #[error("Category '{value}' is not valid for field '{field}': {reason}")]
    CategoryDomain {
        field: String,
        value: String,
        reason: String,
    },

    /// An aggregate that cannot be computed without producing NaN or garbage.
    #[error("Degenerate aggregate: {0}")]
    DegenerateAggregate(String),

    /// A census cell with a negative population count.
    #[error("Census cell {index} has negative count {value}. All counts must be non-negative.")]
    NegativeCount { index: usize, value: f64 },

    /// A census cell whose count is NaN or infinite.
    #[error("Census cell {index} has invalid count {value}. All counts must be finite numbers.")]
    InvalidCount { index: usize, value: f64 },

    /// Not enough usable rows to fit an encoder or a model.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A feature row still carrying the missing-value sentinel at scoring time.
    #[error("Row {row} has a non-finite value for feature '{feature}'")]
    NonFiniteFeature { row: usize, feature: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PostStratError {
    pub(crate) fn category(field: impl Into<String>, value: impl Into<String>, reason: &str) -> Self {
        PostStratError::CategoryDomain {
            field: field.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error signals a fit/score vocabulary mismatch.
    pub fn is_category_domain(&self) -> bool {
        matches!(self, PostStratError::CategoryDomain { .. })
    }

    /// Whether this error signals an aggregate that could not be formed.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, PostStratError::DegenerateAggregate(_))
    }
}

pub type Result<T> = std::result::Result<T, PostStratError>;
