//! Study configuration
//!
//! Which survey columns are questions, which answer options each comparison
//! shows (and in what order), and whether a question treats a missing answer
//! as a response in its own right.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::demographics::DemographicField;
use super::error::{PostStratError, Result};
use super::model::ModelConfig;

/// Denominator used for the raw (unweighted) survey distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawBasis {
    /// Only respondents with every demographic field present
    #[default]
    CompleteCase,
    /// Every respondent who answered the question
    AllResponses,
}

impl std::fmt::Display for RawBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawBasis::CompleteCase => write!(f, "complete-case"),
            RawBasis::AllResponses => write!(f, "all-responses"),
        }
    }
}

impl std::str::FromStr for RawBasis {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "complete-case" | "complete_case" => Ok(RawBasis::CompleteCase),
            "all-responses" | "all_responses" | "all" => Ok(RawBasis::AllResponses),
            _ => Err(format!(
                "Unknown raw basis: '{}'. Use 'complete-case' or 'all-responses'.",
                s
            )),
        }
    }
}

/// Per-question comparison settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionSpec {
    /// Survey column holding the answers
    pub column: String,
    /// Ordered answer options to compare; defaults to the sorted observed answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Treat an unanswered question as the explicit option `nan`
    #[serde(default)]
    pub missing_is_option: bool,
}

impl QuestionSpec {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            options: None,
            missing_is_option: false,
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_missing_as_option(mut self, missing_is_option: bool) -> Self {
        self.missing_is_option = missing_is_option;
        self
    }
}

fn default_ignore_columns() -> Vec<String> {
    vec!["RespondentID".to_string()]
}

/// A study's question list, as read from TOML
///
/// ```toml
/// ignore_columns = ["RespondentID"]
///
/// [[question]]
/// column = "How much do you care about the Oxford comma?"
/// options = ["Not at all", "Not much", "Some", "A lot"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    #[serde(default = "default_ignore_columns")]
    pub ignore_columns: Vec<String>,
    #[serde(default, rename = "question")]
    pub questions: Vec<QuestionSpec>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            ignore_columns: default_ignore_columns(),
            questions: Vec::new(),
        }
    }
}

impl StudyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: StudyConfig =
            toml::from_str(text).map_err(|e| PostStratError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        for (i, q) in self.questions.iter().enumerate() {
            if DemographicField::from_column_name(&q.column).is_some() {
                return Err(PostStratError::Config(format!(
                    "'{}' is a demographic field, not a question",
                    q.column
                )));
            }
            if self.questions[..i].iter().any(|p| p.column == q.column) {
                return Err(PostStratError::Config(format!(
                    "question '{}' is configured twice",
                    q.column
                )));
            }
            if let Some(options) = &q.options {
                if options.is_empty() {
                    return Err(PostStratError::Config(format!(
                        "question '{}' lists no options",
                        q.column
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether a survey column is a question under this config
    pub fn is_question_column(&self, column: &str) -> bool {
        DemographicField::from_column_name(column).is_none()
            && !self.ignore_columns.iter().any(|c| c == column)
    }

    /// Resolve the question list against the survey's columns.
    ///
    /// Configured questions come first, in config order; every other
    /// question column follows with default settings.
    pub fn resolve(&self, survey_questions: &[String]) -> Result<Vec<QuestionSpec>> {
        for q in &self.questions {
            if !survey_questions.contains(&q.column) {
                return Err(PostStratError::MissingColumn(q.column.clone()));
            }
        }

        let mut specs = self.questions.clone();
        for column in survey_questions {
            if self.is_question_column(column) && !specs.iter().any(|s| &s.column == column) {
                specs.push(QuestionSpec::new(column.clone()));
            }
        }
        Ok(specs)
    }
}

/// Settings of a post-stratification run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub model: ModelConfig,
    pub raw_basis: RawBasis,
}
