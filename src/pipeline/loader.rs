//! Dataset loader for CSV and Parquet files
//!
//! Reads the survey and census files into polars frames and converts them
//! into [`SurveyTable`] / [`CensusTable`]. Census files are accepted either
//! already labelled with the survey vocabulary or as raw ACS codes.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use polars::prelude::*;

use super::config::StudyConfig;
use super::demographics::DemographicField;
use super::error::PostStratError;
use super::tables::{normalize_missing, CensusCell, CensusTable, DemographicRecord, Respondent, SurveyTable};
use super::weights::get_counts;

/// Load a dataset lazily (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<LazyFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(infer_schema_length))
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    Ok(lf)
}

/// Load and collect a dataset, returning (frame, rows, columns, memory in MB)
pub fn load_dataset_with_progress(
    path: &Path,
    infer_schema_length: usize,
) -> Result<(DataFrame, usize, usize, f64)> {
    let start = Instant::now();
    let df = load_dataset(path, infer_schema_length)?
        .collect()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    debug!(
        "Loaded {} ({} rows x {} columns, {:.2} MB) in {:.2?}",
        path.display(),
        rows,
        cols,
        memory_mb,
        start.elapsed()
    );
    Ok((df, rows, cols, memory_mb))
}

/// Column names of a dataset without reading its rows
pub fn get_column_names(path: &Path) -> Result<Vec<String>> {
    let schema = load_dataset(path, 100)?
        .collect_schema()
        .with_context(|| format!("Failed to read schema of {}", path.display()))?;
    Ok(schema.iter_names().map(|n| n.to_string()).collect())
}

/// Column values as optional strings, with blanks and `nan` mapped to None
fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PostStratError::MissingColumn(name.to_string()))?;
    let as_str = column
        .cast(&DataType::String)
        .with_context(|| format!("Column '{}' cannot be read as text", name))?;
    Ok(as_str
        .str()?
        .iter()
        .map(normalize_missing)
        .collect())
}

fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        if !present.iter().any(|p| p == name) {
            return Err(PostStratError::MissingColumn(name.to_string()).into());
        }
    }
    Ok(())
}

/// Build a survey table from a frame holding the five demographic columns
/// plus one column per question
pub fn survey_from_dataframe(df: &DataFrame, config: &StudyConfig) -> Result<SurveyTable> {
    let demographic_columns: Vec<&str> =
        DemographicField::ALL.iter().map(|f| f.column_name()).collect();
    require_columns(df, &demographic_columns)?;

    let questions: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|c| config.is_question_column(c))
        .collect();

    let mut respondents = vec![Respondent::default(); df.height()];
    for field in DemographicField::ALL {
        for (respondent, value) in respondents
            .iter_mut()
            .zip(string_values(df, field.column_name())?)
        {
            respondent.demographics.set(field, value);
        }
    }
    for question in &questions {
        for (respondent, value) in respondents.iter_mut().zip(string_values(df, question)?) {
            respondent.answers.insert(question.clone(), value);
        }
    }

    info!(
        "Survey: {} respondents, {} question column(s)",
        respondents.len(),
        questions.len()
    );
    Ok(SurveyTable::new(questions, respondents))
}

/// Rename an extra survey's columns onto the main survey's layout.
///
/// After dropping `skip_columns`, the extra file's columns line up
/// positionally with the main survey's non-ignored columns (the extra file
/// carries no respondent ID).
pub fn align_extra_survey(
    extra: DataFrame,
    main_columns: &[String],
    skip_columns: &[String],
    config: &StudyConfig,
) -> Result<DataFrame> {
    let kept: Vec<String> = extra
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|c| !skip_columns.contains(c))
        .collect();
    let targets: Vec<&String> = main_columns
        .iter()
        .filter(|c| !config.ignore_columns.contains(c))
        .collect();

    if kept.len() != targets.len() {
        return Err(PostStratError::ShapeMismatch(format!(
            "extra survey has {} column(s) after skipping {:?}, main survey expects {}",
            kept.len(),
            skip_columns,
            targets.len()
        ))
        .into());
    }

    let mut aligned = extra.select(kept.iter().map(|s| s.as_str()))?;
    aligned.set_column_names(targets.iter().map(|s| s.as_str()))?;
    Ok(aligned)
}

/// Load the main survey and append any extra survey files
pub fn load_survey(
    path: &Path,
    extra_paths: &[std::path::PathBuf],
    skip_columns: &[String],
    config: &StudyConfig,
    infer_schema_length: usize,
) -> Result<SurveyTable> {
    let (df, _, _, _) = load_dataset_with_progress(path, infer_schema_length)?;
    let main_columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut survey = survey_from_dataframe(&df, config)?;

    for extra_path in extra_paths {
        let (extra_df, rows, _, _) = load_dataset_with_progress(extra_path, infer_schema_length)?;
        let aligned = align_extra_survey(extra_df, &main_columns, skip_columns, config)
            .with_context(|| format!("Cannot align {}", extra_path.display()))?;
        let extra = survey_from_dataframe(&aligned, config)?;
        survey.append(extra)?;
        info!("Appended {} respondents from {}", rows, extra_path.display());
    }

    Ok(survey)
}

/// Build a census table from a frame of demographic cells and counts.
///
/// With `acs_codes`, the demographic columns are the ACS variables
/// (`SEX`, `AGEP_RC1`, ...) and are relabelled into the survey vocabulary.
/// Otherwise the frame uses the survey's own column names and labels.
pub fn census_from_dataframe(df: &DataFrame, count_column: &str, acs_codes: bool) -> Result<CensusTable> {
    let column_for = |field: DemographicField| {
        if acs_codes {
            field.acs_variable()
        } else {
            field.column_name()
        }
    };
    let mut required: Vec<&str> = DemographicField::ALL.iter().map(|f| column_for(*f)).collect();
    required.push(count_column);
    require_columns(df, &required)?;

    let counts = get_counts(df, count_column)?;
    let mut records = vec![DemographicRecord::default(); df.height()];
    for field in DemographicField::ALL {
        let values = string_values(df, column_for(field))?;
        for (record, value) in records.iter_mut().zip(values) {
            let label = match value {
                Some(code) if acs_codes => Some(field.label_for_acs_code(&code)?.to_string()),
                other => other,
            };
            record.set(field, label);
        }
    }

    let cells: Vec<CensusCell> = records
        .into_iter()
        .zip(counts)
        .map(|(demographics, count)| CensusCell::new(demographics, count))
        .collect();
    info!("Census: {} demographic cells", cells.len());
    Ok(CensusTable::new(cells))
}

/// Load a census tabulation file
pub fn load_census(
    path: &Path,
    count_column: &str,
    acs_codes: bool,
    infer_schema_length: usize,
) -> Result<CensusTable> {
    let (df, _, _, _) = load_dataset_with_progress(path, infer_schema_length)?;
    census_from_dataframe(&df, count_column, acs_codes)
        .with_context(|| format!("Invalid census file: {}", path.display()))
}
