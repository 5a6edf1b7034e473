//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;
use std::path::PathBuf;
use tempfile::TempDir;

use poststrat::pipeline::{
    AgeBracket, CensusCell, CensusRegion, CensusTable, DemographicCategory, DemographicRecord,
    EducationLevel, Gender, IncomeBracket, Respondent, SurveyTable,
};

pub const CARE_QUESTION: &str = "How much do you care about the use of an Oxford comma?";
pub const GRAMMAR_QUESTION: &str = "In your opinion, which sentence is more gramatically correct?";

pub fn record(gender: &str, age: &str, income: &str, education: &str, region: &str) -> DemographicRecord {
    DemographicRecord::new(gender, age, income, education, region)
}

/// Respondent A of the separable toy case
pub fn respondent_a() -> DemographicRecord {
    record("Male", "18-29", "$0 - $24,999", "Bachelor degree", "Pacific")
}

/// Respondent B of the separable toy case
pub fn respondent_b() -> DemographicRecord {
    record("Female", "> 60", "$150,000+", "Graduate degree", "New England")
}

/// Two respondents with opposite demographics and opposite answers
pub fn toy_survey() -> SurveyTable {
    SurveyTable::new(
        vec!["Q".to_string()],
        vec![
            Respondent::new(respondent_a()).with_answer("Q", "Yes"),
            Respondent::new(respondent_b()).with_answer("Q", "No"),
        ],
    )
}

/// Demographics cycling through every category of every field
pub fn cycled_record(i: usize) -> DemographicRecord {
    DemographicRecord::new(
        Gender::ALL[i % 2].label(),
        AgeBracket::ALL[i % 4].label(),
        IncomeBracket::ALL[(i / 2) % 5].label(),
        EducationLevel::ALL[(i / 3) % 5].label(),
        CensusRegion::ALL[(i / 5) % 9].label(),
    )
}

/// A synthetic survey where young respondents care more about the comma.
///
/// Every category of every field occurs, so any census built from the same
/// vocabularies can be scored. The grammar question is left unanswered by
/// roughly one in ten respondents.
pub fn synthetic_survey(n: usize, seed: u64) -> SurveyTable {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let care_options = ["Not at all", "Not much", "Some", "A lot"];

    let respondents = (0..n)
        .map(|i| {
            let demographics = cycled_record(i);
            let age_rank = i % 4;
            // Younger brackets lean towards higher care
            let shift = 3 - age_rank;
            let care = care_options[((rng.gen_range(0..4) + shift) / 2).min(3)];
            let grammar = if rng.gen_bool(0.1) {
                ""
            } else if rng.gen_bool(0.6) {
                "It's important for a person to be honest, kind and loyal."
            } else {
                "It's important for a person to be honest, kind, and loyal."
            };
            Respondent::new(demographics)
                .with_answer(CARE_QUESTION, care)
                .with_answer(GRAMMAR_QUESTION, grammar)
        })
        .collect();

    SurveyTable::new(
        vec![CARE_QUESTION.to_string(), GRAMMAR_QUESTION.to_string()],
        respondents,
    )
}

/// One census cell per cycled record with a random positive count
pub fn synthetic_census(cells: usize, seed: u64) -> CensusTable {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    CensusTable::new(
        (0..cells)
            .map(|i| CensusCell::new(cycled_record(i), rng.gen_range(1..5000) as f64))
            .collect(),
    )
}

/// The same census with its cells in a shuffled order
pub fn shuffled(census: &CensusTable, seed: u64) -> CensusTable {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut cells = census.cells.clone();
    cells.shuffle(&mut rng);
    CensusTable::new(cells)
}

/// Survey frame with the layout of the original comma survey
pub fn create_survey_dataframe() -> DataFrame {
    df! {
        "RespondentID" => [1i64, 2, 3, 4],
        CARE_QUESTION => [Some("Some"), Some("A lot"), None, Some("Not much")],
        "Gender" => [Some("Male"), Some("Female"), Some("Female"), Some("Male")],
        "Age" => [Some("18-29"), Some("> 60"), Some("30-44"), Some("45-60")],
        "Household Income" => [Some("$0 - $24,999"), Some("$150,000+"), Some("$50,000 - $99,999"), None],
        "Education" => [Some("Bachelor degree"), Some("Graduate degree"), Some("High school degree"), Some("Bachelor degree")],
        "Location (Census Region)" => [Some("Pacific"), Some("New England"), Some("Pacific"), Some("Mountain")],
    }
    .unwrap()
}

/// Census frame coded with ACS variables
pub fn create_acs_census_dataframe() -> DataFrame {
    df! {
        "SEX" => [1i64, 2, 2],
        "AGEP_RC1" => [1i64, 4, 2],
        "HINCP_RC1" => [1i64, 5, 3],
        "SCHL_RC1" => [4i64, 5, 2],
        "ucgid" => ["0300000US9", "0300000US1", "0300000US9"],
        "Count" => [300i64, 500, 200],
    }
    .unwrap()
}

/// Create a temporary directory with a CSV file
pub fn create_temp_csv(df: &mut DataFrame, name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join(name);
    write_csv(df, &csv_path);
    (temp_dir, csv_path)
}

pub fn write_csv(df: &mut DataFrame, path: &std::path::Path) {
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

/// Create a temporary directory with a Parquet file
pub fn create_temp_parquet(df: &mut DataFrame, name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join(name);

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert two distributions are equal within tolerance
pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "entry {}: expected {}, got {} (tol {})",
            i,
            e,
            a,
            tol
        );
    }
}
