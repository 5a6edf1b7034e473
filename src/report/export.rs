//! JSON export of post-stratification results

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::{
    ClassCoefficients, EstimatorConfig, Estimation, ExclusionReport, FittedEncoder,
    MarginalComparison, PostStratificationEstimator, QuestionComparison,
};

/// Metadata about the run
#[derive(Serialize)]
pub struct RunMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub poststrat_version: String,
    pub survey_file: String,
    pub census_file: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_survey_files: Vec<String>,
    pub config: EstimatorConfig,
}

/// Population and sample sizes behind the estimates
#[derive(Serialize)]
pub struct RunTotals {
    pub survey_respondents: usize,
    pub training_respondents: usize,
    pub census_cells: usize,
    pub census_population: f64,
    pub questions_estimated: usize,
    pub questions_failed: usize,
}

/// Model details of one question
#[derive(Serialize)]
pub struct ModelExport {
    pub classes: Vec<String>,
    pub training_rows: usize,
    pub iterations: usize,
    pub converged: bool,
    pub coefficients: Vec<ClassCoefficients>,
}

/// One question's entry; either a comparison or the reason it failed
#[derive(Serialize)]
pub struct QuestionExport {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<QuestionComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelExport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<ExclusionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete export with metadata
#[derive(Serialize)]
pub struct PostStratExport {
    pub metadata: RunMetadata,
    pub totals: RunTotals,
    pub feature_names: Vec<String>,
    /// Frozen vocabularies and scaling moments used for every question
    pub encoder: FittedEncoder,
    pub marginals: Vec<MarginalComparison>,
    pub questions: Vec<QuestionExport>,
}

/// Parameters for the export metadata
pub struct ExportParams<'a> {
    pub survey_file: &'a str,
    pub census_file: &'a str,
    pub extra_survey_files: Vec<String>,
    pub survey_respondents: usize,
}

/// Assemble the export structure from a finished run
pub fn build_export(
    estimator: &PostStratificationEstimator,
    estimation: &Estimation,
    marginals: &[MarginalComparison],
    params: &ExportParams,
) -> PostStratExport {
    let questions = estimation
        .outcomes
        .iter()
        .map(|outcome| {
            let model = estimator.model(&outcome.question).map(|m| ModelExport {
                classes: m.classes().to_vec(),
                training_rows: m.training_rows(),
                iterations: m.iterations(),
                converged: m.converged(),
                coefficients: m.coefficients(),
            });
            QuestionExport {
                question: outcome.question.clone(),
                comparison: outcome.result.as_ref().ok().cloned(),
                model,
                exclusions: estimator.exclusion_report(&outcome.question).copied(),
                error: outcome.result.as_ref().err().map(|e| e.to_string()),
            }
        })
        .collect();

    let failed = estimation.failures().count();
    PostStratExport {
        metadata: RunMetadata {
            timestamp: Utc::now().to_rfc3339(),
            poststrat_version: env!("CARGO_PKG_VERSION").to_string(),
            survey_file: params.survey_file.to_string(),
            census_file: params.census_file.to_string(),
            extra_survey_files: params.extra_survey_files.clone(),
            config: *estimator.config(),
        },
        totals: RunTotals {
            survey_respondents: params.survey_respondents,
            training_respondents: estimator.encoder().training_rows(),
            census_cells: estimation.census_cells,
            census_population: estimation.total_population,
            questions_estimated: estimation.outcomes.len() - failed,
            questions_failed: failed,
        },
        feature_names: estimator.encoder().feature_names(),
        encoder: estimator.encoder().clone(),
        marginals: marginals.to_vec(),
        questions,
    }
}

/// Write the export as pretty-printed JSON
pub fn export_results(export: &PostStratExport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(export)
        .context("Failed to serialize post-stratification results to JSON")?;

    std::fs::write(output_path, json).with_context(|| {
        format!(
            "Failed to write post-stratification results to {}",
            output_path.display()
        )
    })?;

    Ok(())
}
