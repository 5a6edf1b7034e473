//! Tests for CLI argument parsing and the end-to-end binary

use assert_cmd::Command;
use clap::Parser;
use polars::prelude::*;
use poststrat::cli::Cli;
use poststrat::pipeline::{CensusTable, DemographicField, RawBasis, SurveyTable};
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::{synthetic_census, synthetic_survey, write_csv, CARE_QUESTION, GRAMMAR_QUESTION};

#[test]
fn test_cli_default_values() {
    let cli = Cli::parse_from(["poststrat", "-s", "survey.csv", "-c", "census.csv"]);

    assert_eq!(cli.count_column, "Count");
    assert_eq!(cli.regularization, 1.0, "Default C should be 1.0");
    assert_eq!(cli.max_iterations, 100);
    assert_eq!(cli.raw_basis, RawBasis::CompleteCase);
    assert_eq!(cli.extra_skip_columns, vec!["Timestamp"]);
    assert!(cli.extra_survey.is_empty());
    assert!(!cli.acs_codes);
    assert!(!cli.no_export);
    assert_eq!(cli.infer_schema_length, 10000);
    assert_eq!(cli.log_level(), log::LevelFilter::Warn);
}

#[test]
fn test_cli_custom_values() {
    let cli = Cli::parse_from([
        "poststrat",
        "-s",
        "survey.csv",
        "-c",
        "census.csv",
        "--extra-survey",
        "a.csv",
        "--extra-survey",
        "b.csv",
        "--raw-basis",
        "all-responses",
        "--regularization",
        "0.5",
        "--acs-codes",
        "-vv",
    ]);

    assert_eq!(cli.extra_survey, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
    assert_eq!(cli.raw_basis, RawBasis::AllResponses);
    let config = cli.estimator_config();
    assert_eq!(config.model.regularization, 0.5);
    assert_eq!(config.raw_basis, RawBasis::AllResponses);
    assert!(cli.acs_codes);
    assert_eq!(cli.log_level(), log::LevelFilter::Debug);
}

#[test]
fn test_cli_output_path_derivation() {
    let cli = Cli::parse_from(["poststrat", "-s", "/path/to/comma.csv", "-c", "census.csv"]);
    assert_eq!(cli.output_path(), PathBuf::from("/path/to/comma_poststrat.json"));
}

#[test]
fn test_cli_explicit_output_path() {
    let cli = Cli::parse_from([
        "poststrat",
        "-s",
        "survey.csv",
        "-c",
        "census.csv",
        "-o",
        "results.json",
    ]);
    assert_eq!(cli.output_path(), PathBuf::from("results.json"));
}

#[test]
fn test_cli_rejects_non_positive_regularization() {
    let result = Cli::try_parse_from([
        "poststrat",
        "-s",
        "survey.csv",
        "-c",
        "census.csv",
        "--regularization",
        "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_cli_rejects_unknown_raw_basis() {
    let result = Cli::try_parse_from([
        "poststrat",
        "-s",
        "survey.csv",
        "-c",
        "census.csv",
        "--raw-basis",
        "weighted",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_cli_requires_survey_and_census() {
    assert!(Cli::try_parse_from(["poststrat", "-s", "survey.csv"]).is_err());
}

fn survey_frame(survey: &SurveyTable) -> DataFrame {
    let mut columns = vec![Column::new(
        "RespondentID".into(),
        (1..=survey.len() as i64).collect::<Vec<i64>>(),
    )];
    for question in &survey.questions {
        let values: Vec<Option<String>> = survey
            .respondents
            .iter()
            .map(|r| r.answer(question).map(String::from))
            .collect();
        columns.push(Column::new(question.as_str().into(), values));
    }
    for field in DemographicField::ALL {
        let values: Vec<Option<String>> = survey
            .respondents
            .iter()
            .map(|r| r.demographics.get(field).map(String::from))
            .collect();
        columns.push(Column::new(field.column_name().into(), values));
    }
    DataFrame::new(columns).unwrap()
}

fn census_frame(census: &CensusTable) -> DataFrame {
    let mut columns = Vec::new();
    for field in DemographicField::ALL {
        let values: Vec<Option<String>> = census
            .cells
            .iter()
            .map(|c| c.demographics.get(field).map(String::from))
            .collect();
        columns.push(Column::new(field.column_name().into(), values));
    }
    columns.push(Column::new("Count".into(), census.counts()));
    DataFrame::new(columns).unwrap()
}

fn write_inputs(dir: &TempDir) -> (PathBuf, PathBuf) {
    let survey_path = dir.path().join("comma.csv");
    let census_path = dir.path().join("census.csv");
    write_csv(&mut survey_frame(&synthetic_survey(150, 42)), &survey_path);
    write_csv(&mut census_frame(&synthetic_census(60, 43)), &census_path);
    (survey_path, census_path)
}

#[test]
fn test_end_to_end_run_writes_json() {
    let dir = TempDir::new().unwrap();
    let (survey_path, census_path) = write_inputs(&dir);

    let questions_path = dir.path().join("study.toml");
    std::fs::write(
        &questions_path,
        format!(
            "[[question]]\ncolumn = \"{}\"\noptions = [\"Not at all\", \"Not much\", \"Some\", \"A lot\"]\n\n[[question]]\ncolumn = \"{}\"\nmissing_is_option = true\n",
            CARE_QUESTION, GRAMMAR_QUESTION
        ),
    )
    .unwrap();

    Command::cargo_bin("poststrat")
        .unwrap()
        .arg("-s")
        .arg(&survey_path)
        .arg("-c")
        .arg(&census_path)
        .arg("-q")
        .arg(&questions_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Post-stratification complete!"));

    let output = dir.path().join("comma_poststrat.json");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();

    assert_eq!(json["totals"]["survey_respondents"], 150);
    assert_eq!(json["totals"]["census_cells"], 60);
    assert_eq!(json["totals"]["questions_failed"], 0);
    let questions = json["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["question"], CARE_QUESTION);
    assert_eq!(
        questions[0]["comparison"]["options"],
        serde_json::json!(["Not at all", "Not much", "Some", "A lot"])
    );
    assert_eq!(json["marginals"].as_array().unwrap().len(), 5);
}

#[test]
fn test_no_export_skips_json() {
    let dir = TempDir::new().unwrap();
    let (survey_path, census_path) = write_inputs(&dir);

    Command::cargo_bin("poststrat")
        .unwrap()
        .arg("-s")
        .arg(&survey_path)
        .arg("-c")
        .arg(&census_path)
        .arg("--no-export")
        .assert()
        .success();

    assert!(!dir.path().join("comma_poststrat.json").exists());
}

#[test]
fn test_missing_census_file_fails() {
    let dir = TempDir::new().unwrap();
    let (survey_path, _) = write_inputs(&dir);

    Command::cargo_bin("poststrat")
        .unwrap()
        .arg("-s")
        .arg(&survey_path)
        .arg("-c")
        .arg(dir.path().join("missing.csv"))
        .arg("--no-export")
        .assert()
        .failure();
}
