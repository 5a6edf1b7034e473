//! Model-based post-stratification
//!
//! The estimator fits the demographic encoder once on the survey, fits one
//! [`QuestionModel`] per question (in parallel, sharing the frozen encoder),
//! and then scores every census cell with every model. A question's
//! population estimate is the census-weighted average of its per-cell
//! predicted distributions:
//!
//! ```text
//! P(answer = k) = sum_i  w_i * p_i(k),    w_i = count_i / sum(count)
//! ```
//!
//! Failures are contained per question: a question whose model could not be
//! fitted, or whose labels cannot be aligned with the requested options,
//! yields an error outcome while every other question still gets a result.

use std::collections::BTreeMap;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use super::config::{EstimatorConfig, QuestionSpec, RawBasis};
use super::encoder::{FeatureEncoder, FeatureMatrix, FittedEncoder};
use super::error::{PostStratError, Result};
use super::missing::{labelled_complete_cases, ExclusionReport};
use super::model::{ClassCoefficients, QuestionModel};
use super::tables::{CensusTable, SurveyTable, MISSING_LABEL};
use super::tally::OptionCounts;
use super::weights::{stable_sum, CensusWeighter};

/// Census cells encoded with the frozen encoder, plus their population weights
#[derive(Debug, Clone)]
pub struct CensusDesign {
    pub features: FeatureMatrix,
    pub weights: Vec<f64>,
    pub total_population: f64,
}

/// Census-adjusted and raw survey distributions for one question,
/// aligned over the same option order
#[derive(Debug, Clone, Serialize)]
pub struct QuestionComparison {
    pub question: String,
    pub options: Vec<String>,
    /// Post-stratified population estimate
    pub census_adjusted: Vec<f64>,
    /// Unweighted survey proportions
    pub survey: Vec<f64>,
    /// Respondents behind the survey proportions
    pub survey_respondents: usize,
    pub exclusions: ExclusionReport,
}

impl QuestionComparison {
    /// (option, census-adjusted, survey) triples
    pub fn rows(&self) -> impl Iterator<Item = (&str, f64, f64)> + '_ {
        self.options
            .iter()
            .zip(&self.census_adjusted)
            .zip(&self.survey)
            .map(|((o, a), s)| (o.as_str(), *a, *s))
    }

    /// Option with the largest absolute difference between the two vectors
    pub fn largest_shift(&self) -> Option<(&str, f64)> {
        self.rows()
            .map(|(o, a, s)| (o, a - s))
            .max_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
    }
}

/// Result of one question's estimation
#[derive(Debug)]
pub struct QuestionOutcome {
    pub question: String,
    pub result: Result<QuestionComparison>,
}

/// All per-question outcomes of a run
#[derive(Debug)]
pub struct Estimation {
    pub census_cells: usize,
    pub total_population: f64,
    pub outcomes: Vec<QuestionOutcome>,
}

impl Estimation {
    pub fn successes(&self) -> impl Iterator<Item = &QuestionComparison> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PostStratError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.question.as_str(), e)))
    }

    pub fn get(&self, question: &str) -> Option<&QuestionOutcome> {
        self.outcomes.iter().find(|o| o.question == question)
    }
}

/// Owns the frozen encoder and one fitted model per question
#[derive(Debug)]
pub struct PostStratificationEstimator {
    encoder: FittedEncoder,
    specs: Vec<QuestionSpec>,
    models: BTreeMap<String, QuestionModel>,
    exclusions: BTreeMap<String, ExclusionReport>,
    fit_failures: BTreeMap<String, PostStratError>,
    config: EstimatorConfig,
}

impl PostStratificationEstimator {
    /// Fit the encoder once, then every question's model independently.
    ///
    /// Fails only if the encoder cannot be fitted; a question whose model
    /// fails is recorded in [`fit_failures`](Self::fit_failures).
    pub fn fit(survey: &SurveyTable, specs: &[QuestionSpec], config: EstimatorConfig) -> Result<Self> {
        for spec in specs {
            if !survey.has_question(&spec.column) {
                return Err(PostStratError::MissingColumn(spec.column.clone()));
            }
        }

        let encoder = FeatureEncoder::fit(&survey.demographics())?;
        if encoder.excluded_rows() > 0 {
            warn!(
                "{} of {} respondents have missing demographics and are excluded from model fitting",
                encoder.excluded_rows(),
                survey.len()
            );
        }

        // Encode the complete rows once; questions select their rows from it
        let complete_indices: Vec<usize> = survey
            .respondents
            .iter()
            .enumerate()
            .filter(|(_, r)| r.demographics.is_complete())
            .map(|(i, _)| i)
            .collect();
        let complete_records: Vec<_> = complete_indices
            .iter()
            .map(|&i| survey.respondents[i].demographics.clone())
            .collect();
        let complete_features = encoder.transform(&complete_records)?;
        let mut feature_row = vec![None; survey.len()];
        for (row, &i) in complete_indices.iter().enumerate() {
            feature_row[i] = Some(row);
        }

        let fitted: Vec<(String, ExclusionReport, Result<QuestionModel>)> = specs
            .par_iter()
            .map(|spec| {
                let rows = labelled_complete_cases(survey, &spec.column, spec.missing_is_option);
                let selection: Vec<usize> = rows
                    .indices
                    .iter()
                    .filter_map(|&i| feature_row[i])
                    .collect();
                let features = complete_features.select_rows(&selection);
                let model =
                    QuestionModel::fit(&spec.column, &features, &rows.labels, &config.model);
                (spec.column.clone(), rows.report, model)
            })
            .collect();

        let mut models = BTreeMap::new();
        let mut exclusions = BTreeMap::new();
        let mut fit_failures = BTreeMap::new();
        for (question, report, model) in fitted {
            exclusions.insert(question.clone(), report);
            match model {
                Ok(m) => {
                    models.insert(question, m);
                }
                Err(e) => {
                    warn!("Could not fit a model for '{}': {}", question, e);
                    fit_failures.insert(question, e);
                }
            }
        }

        info!(
            "Fitted {} of {} question models on {} complete respondents",
            models.len(),
            specs.len(),
            encoder.training_rows()
        );

        Ok(Self {
            encoder,
            specs: specs.to_vec(),
            models,
            exclusions,
            fit_failures,
            config,
        })
    }

    pub fn encoder(&self) -> &FittedEncoder {
        &self.encoder
    }

    pub fn question_specs(&self) -> &[QuestionSpec] {
        &self.specs
    }

    pub fn models(&self) -> &BTreeMap<String, QuestionModel> {
        &self.models
    }

    pub fn model(&self, question: &str) -> Option<&QuestionModel> {
        self.models.get(question)
    }

    pub fn fit_failures(&self) -> &BTreeMap<String, PostStratError> {
        &self.fit_failures
    }

    pub fn exclusion_report(&self, question: &str) -> Option<&ExclusionReport> {
        self.exclusions.get(question)
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Per-class coefficients of a question's model, for reporting
    pub fn coefficients(&self, question: &str) -> Option<Vec<ClassCoefficients>> {
        self.models.get(question).map(|m| m.coefficients())
    }

    /// Encode the census cells and derive their population weights
    pub fn census_design(&self, census: &CensusTable) -> Result<CensusDesign> {
        let features = self.encoder.transform(&census.demographics())?;
        let weights = CensusWeighter::new().weights(census)?;
        Ok(CensusDesign {
            features,
            weights,
            total_population: census.total_population(),
        })
    }

    /// Estimate every question against the census.
    ///
    /// Census encoding and weighting are shared by all questions, so a failure
    /// there is returned directly. Anything question-specific lands in that
    /// question's outcome.
    pub fn estimate(&self, survey: &SurveyTable, census: &CensusTable) -> Result<Estimation> {
        let design = self.census_design(census)?;

        let outcomes: Vec<QuestionOutcome> = self
            .specs
            .par_iter()
            .map(|spec| QuestionOutcome {
                question: spec.column.clone(),
                result: self.estimate_question(spec, survey, &design),
            })
            .collect();

        Ok(Estimation {
            census_cells: census.len(),
            total_population: design.total_population,
            outcomes,
        })
    }

    /// Census-adjusted vs raw comparison for a single question
    pub fn estimate_question(
        &self,
        spec: &QuestionSpec,
        survey: &SurveyTable,
        design: &CensusDesign,
    ) -> Result<QuestionComparison> {
        let model = match self.models.get(&spec.column) {
            Some(m) => m,
            None => {
                let reason = self
                    .fit_failures
                    .get(&spec.column)
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "question was not part of the fit".to_string());
                return Err(PostStratError::InsufficientData(format!(
                    "no fitted model for '{}': {}",
                    spec.column, reason
                )));
            }
        };

        let raw_tally = raw_tally(survey, spec, self.config.raw_basis)?;
        let options = comparison_options(spec, &raw_tally);
        if options.is_empty() {
            return Err(PostStratError::DegenerateAggregate(format!(
                "question '{}' has no answer options to compare",
                spec.column
            )));
        }

        let class_distribution = weighted_distribution(model, design)?;
        let census_adjusted = align_to_options(&spec.column, model.classes(), &class_distribution, &options)?;

        let counts: Vec<usize> = options.iter().map(|o| raw_tally.count(o)).collect();
        let respondents: usize = counts.iter().sum();
        if respondents == 0 {
            return Err(PostStratError::DegenerateAggregate(format!(
                "question '{}' has no survey responses among the requested options",
                spec.column
            )));
        }
        let survey_shares: Vec<f64> = counts
            .iter()
            .map(|&c| c as f64 / respondents as f64)
            .collect();

        Ok(QuestionComparison {
            question: spec.column.clone(),
            options,
            census_adjusted,
            survey: survey_shares,
            survey_respondents: respondents,
            exclusions: self
                .exclusions
                .get(&spec.column)
                .copied()
                .unwrap_or_default(),
        })
    }
}

/// Population-level probability of each model class.
///
/// Per-cell contributions are summed with [`stable_sum`], so the result does
/// not depend on the order of the census cells.
pub fn weighted_distribution(model: &QuestionModel, design: &CensusDesign) -> Result<Vec<f64>> {
    if design.weights.len() != design.features.nrows() {
        return Err(PostStratError::ShapeMismatch(format!(
            "{} census weights for {} encoded cells",
            design.weights.len(),
            design.features.nrows()
        )));
    }

    let proba = model.predict_proba(&design.features)?;
    let distribution: Vec<f64> = (0..proba.ncols())
        .map(|k| stable_sum((0..proba.nrows()).map(|i| design.weights[i] * proba[(i, k)])))
        .collect();

    if distribution.iter().any(|p| !p.is_finite()) {
        return Err(PostStratError::DegenerateAggregate(format!(
            "weighted distribution for '{}' is not finite",
            model.question()
        )));
    }
    Ok(distribution)
}

/// Select the requested options from a class distribution and renormalise.
///
/// Every option must be one of the model's classes; classes not requested
/// are left out of the normalisation.
pub fn align_to_options(
    question: &str,
    classes: &[String],
    distribution: &[f64],
    options: &[String],
) -> Result<Vec<f64>> {
    let selected: Vec<f64> = options
        .iter()
        .map(|option| {
            classes
                .iter()
                .position(|c| c == option)
                .map(|k| distribution[k])
                .ok_or_else(|| {
                    PostStratError::DegenerateAggregate(format!(
                        "option '{}' of question '{}' is not among the model's labels {:?}",
                        option, question, classes
                    ))
                })
        })
        .collect::<Result<_>>()?;

    let mass: f64 = selected.iter().sum();
    if !(mass > 0.0 && mass.is_finite()) {
        return Err(PostStratError::DegenerateAggregate(format!(
            "requested options of question '{}' carry no probability mass",
            question
        )));
    }
    Ok(selected.into_iter().map(|p| p / mass).collect())
}

/// Raw answer tally over the chosen denominator
fn raw_tally(survey: &SurveyTable, spec: &QuestionSpec, basis: RawBasis) -> Result<OptionCounts> {
    if !survey.has_question(&spec.column) {
        return Err(PostStratError::MissingColumn(spec.column.clone()));
    }
    let respondents = survey.respondents.iter().filter(|r| match basis {
        RawBasis::CompleteCase => r.demographics.is_complete(),
        RawBasis::AllResponses => true,
    });
    let tally = OptionCounts::from_values(respondents.map(|r| r.answer(&spec.column)));
    Ok(if spec.missing_is_option {
        tally
    } else {
        tally.without_missing()
    })
}

/// Requested options, or the observed ones in tally order
fn comparison_options(spec: &QuestionSpec, tally: &OptionCounts) -> Vec<String> {
    match &spec.options {
        Some(options) => options.clone(),
        None => tally
            .options()
            .into_iter()
            .filter(|o| spec.missing_is_option || *o != MISSING_LABEL)
            .map(String::from)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_renormalises_over_requested_options() {
        let classes: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let aligned = align_to_options(
            "q",
            &classes,
            &[0.2, 0.3, 0.5],
            &["c".to_string(), "a".to_string()],
        )
        .unwrap();
        assert!((aligned[0] - 0.5 / 0.7).abs() < 1e-12);
        assert!((aligned[1] - 0.2 / 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_align_unknown_option_is_degenerate() {
        let classes = vec!["a".to_string()];
        let err = align_to_options("q", &classes, &[1.0], &["z".to_string()]).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_align_zero_mass_is_degenerate() {
        let classes = vec!["a".to_string(), "b".to_string()];
        let err = align_to_options("q", &classes, &[0.0, 1.0], &["a".to_string()]).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_comparison_options_default_excludes_missing() {
        let tally = OptionCounts::from_values(vec![Some("b"), None, Some("a")]);
        let spec = QuestionSpec::new("q");
        assert_eq!(comparison_options(&spec, &tally), vec!["a", "b"]);

        let spec = QuestionSpec::new("q").with_missing_as_option(true);
        assert_eq!(comparison_options(&spec, &tally), vec!["a", "b", "nan"]);
    }
}
