//! Tests for census population weights

use poststrat::pipeline::{CensusCell, CensusTable, CensusWeighter, PostStratError};

#[path = "common/mod.rs"]
mod common;

use common::{respondent_a, respondent_b, shuffled, synthetic_census};

#[test]
fn test_two_cells_weight_exactly() {
    let census = CensusTable::new(vec![
        CensusCell::new(respondent_a(), 30.0),
        CensusCell::new(respondent_b(), 70.0),
    ]);
    let weights = CensusWeighter::new().weights(&census).unwrap();
    assert_eq!(weights, vec![0.3, 0.7]);
}

#[test]
fn test_weights_follow_cell_order() {
    let census = synthetic_census(60, 1);
    let weights = CensusWeighter::new().weights(&census).unwrap();

    assert_eq!(weights.len(), census.len());
    let total: f64 = weights.iter().sum();
    assert!((total - 1.0).abs() < 1e-12);
    for (w, cell) in weights.iter().zip(&census.cells) {
        assert!((w - cell.count / census.total_population()).abs() < 1e-15);
    }
}

#[test]
fn test_weights_are_order_independent_per_cell() {
    let census = synthetic_census(80, 2);
    let reordered = shuffled(&census, 99);

    let weighter = CensusWeighter::new();
    let original = weighter.weights(&census).unwrap();
    let permuted = weighter.weights(&reordered).unwrap();

    for (cell, w) in reordered.cells.iter().zip(&permuted) {
        let pos = census.cells.iter().position(|c| c == cell).unwrap();
        assert_eq!(original[pos].to_bits(), w.to_bits());
    }
}

#[test]
fn test_zero_population_is_degenerate() {
    let census = CensusTable::new(vec![
        CensusCell::new(respondent_a(), 0.0),
        CensusCell::new(respondent_b(), 0.0),
    ]);
    let err = CensusWeighter::new().weights(&census).unwrap_err();
    assert!(matches!(err, PostStratError::DegenerateAggregate(_)));
}

#[test]
fn test_negative_count_is_rejected() {
    let census = CensusTable::new(vec![
        CensusCell::new(respondent_a(), 10.0),
        CensusCell::new(respondent_b(), -1.0),
    ]);
    assert!(matches!(
        CensusWeighter::new().weights(&census),
        Err(PostStratError::NegativeCount { index: 1, .. })
    ));
}
