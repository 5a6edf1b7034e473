//! Missing value handling
//!
//! Rows with any missing demographic field are excluded from model fitting,
//! and rows without an answer are excluded from that question's training set.
//! Exclusions are counted and returned, never applied silently.

use log::warn;
use serde::Serialize;

use super::demographics::DemographicField;
use super::tables::{SurveyTable, MISSING_LABEL};

/// How many survey rows a question lost, and why
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionReport {
    pub total_rows: usize,
    /// Rows dropped for a missing demographic field
    pub missing_demographics: usize,
    /// Complete-demographic rows dropped for a missing answer
    pub missing_answer: usize,
    /// Rows left for training
    pub used_rows: usize,
}

impl ExclusionReport {
    pub fn dropped(&self) -> usize {
        self.missing_demographics + self.missing_answer
    }
}

/// Training rows for one question: indices into the survey and their labels
#[derive(Debug, Clone)]
pub struct LabelledRows {
    pub indices: Vec<usize>,
    pub labels: Vec<String>,
    pub report: ExclusionReport,
}

/// Select the complete-case rows of a question.
///
/// With `missing_is_option`, an unanswered question counts as the explicit
/// answer `nan` instead of excluding the row.
pub fn labelled_complete_cases(
    survey: &SurveyTable,
    question: &str,
    missing_is_option: bool,
) -> LabelledRows {
    let mut indices = Vec::new();
    let mut labels = Vec::new();
    let mut report = ExclusionReport {
        total_rows: survey.len(),
        ..Default::default()
    };

    for (i, respondent) in survey.respondents.iter().enumerate() {
        if !respondent.demographics.is_complete() {
            report.missing_demographics += 1;
            continue;
        }
        match respondent.answer(question) {
            Some(answer) => {
                indices.push(i);
                labels.push(answer.to_string());
            }
            None if missing_is_option => {
                indices.push(i);
                labels.push(MISSING_LABEL.to_string());
            }
            None => report.missing_answer += 1,
        }
    }
    report.used_rows = indices.len();

    if report.dropped() > 0 {
        warn!(
            "Question '{}': excluded {} of {} rows ({} missing demographics, {} missing answer)",
            question,
            report.dropped(),
            report.total_rows,
            report.missing_demographics,
            report.missing_answer
        );
    }

    LabelledRows {
        indices,
        labels,
        report,
    }
}

/// Share of respondents missing each demographic field, sorted descending
pub fn analyze_missing_demographics(survey: &SurveyTable) -> Vec<(DemographicField, f64)> {
    if survey.is_empty() {
        return Vec::new();
    }
    let total = survey.len() as f64;

    let mut ratios: Vec<(DemographicField, f64)> = DemographicField::ALL
        .iter()
        .map(|&field| {
            let missing = survey
                .respondents
                .iter()
                .filter(|r| r.demographics.get(field).is_none())
                .count();
            (field, missing as f64 / total)
        })
        .collect();

    ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ratios
}

/// Number of respondents with at least one missing demographic field
pub fn count_incomplete_rows(survey: &SurveyTable) -> usize {
    survey
        .respondents
        .iter()
        .filter(|r| !r.demographics.is_complete())
        .count()
}
