//! In-memory survey and census tables
//!
//! Missing values are `None` throughout. Blank cells, nulls and the literal
//! `nan` all normalise to `None` on the way in, and render back as `nan`
//! wherever a missing category has to be shown as a label.

use std::collections::BTreeMap;

use serde::Serialize;

use super::demographics::DemographicField;
use super::error::{PostStratError, Result};

/// Label used for the missing category in tallies and comparisons
pub const MISSING_LABEL: &str = "nan";

/// Normalise a raw categorical value, mapping blanks and `nan` to `None`
pub fn normalize_missing(raw: Option<&str>) -> Option<String> {
    match raw {
        None => None,
        Some(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(MISSING_LABEL) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

/// The five demographic attributes of a respondent or census cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemographicRecord {
    pub gender: Option<String>,
    pub age: Option<String>,
    pub household_income: Option<String>,
    pub education: Option<String>,
    pub region: Option<String>,
}

impl DemographicRecord {
    pub fn new(gender: &str, age: &str, household_income: &str, education: &str, region: &str) -> Self {
        Self {
            gender: normalize_missing(Some(gender)),
            age: normalize_missing(Some(age)),
            household_income: normalize_missing(Some(household_income)),
            education: normalize_missing(Some(education)),
            region: normalize_missing(Some(region)),
        }
    }

    pub fn get(&self, field: DemographicField) -> Option<&str> {
        match field {
            DemographicField::Gender => self.gender.as_deref(),
            DemographicField::Age => self.age.as_deref(),
            DemographicField::HouseholdIncome => self.household_income.as_deref(),
            DemographicField::Education => self.education.as_deref(),
            DemographicField::Region => self.region.as_deref(),
        }
    }

    pub fn set(&mut self, field: DemographicField, value: Option<String>) {
        let slot = match field {
            DemographicField::Gender => &mut self.gender,
            DemographicField::Age => &mut self.age,
            DemographicField::HouseholdIncome => &mut self.household_income,
            DemographicField::Education => &mut self.education,
            DemographicField::Region => &mut self.region,
        };
        *slot = value;
    }

    /// True when no demographic field is missing
    pub fn is_complete(&self) -> bool {
        DemographicField::ALL.iter().all(|f| self.get(*f).is_some())
    }
}

/// One survey participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Respondent {
    pub demographics: DemographicRecord,
    /// Question column -> answer (None when not answered)
    pub answers: BTreeMap<String, Option<String>>,
}

impl Respondent {
    pub fn new(demographics: DemographicRecord) -> Self {
        Self {
            demographics,
            answers: BTreeMap::new(),
        }
    }

    pub fn with_answer(mut self, question: &str, answer: &str) -> Self {
        self.answers
            .insert(question.to_string(), normalize_missing(Some(answer)));
        self
    }

    pub fn answer(&self, question: &str) -> Option<&str> {
        self.answers.get(question).and_then(|a| a.as_deref())
    }
}

/// Survey respondents plus the ordered list of question columns
#[derive(Debug, Clone, Default)]
pub struct SurveyTable {
    pub questions: Vec<String>,
    pub respondents: Vec<Respondent>,
}

impl SurveyTable {
    pub fn new(questions: Vec<String>, respondents: Vec<Respondent>) -> Self {
        Self {
            questions,
            respondents,
        }
    }

    pub fn len(&self) -> usize {
        self.respondents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.respondents.is_empty()
    }

    pub fn has_question(&self, question: &str) -> bool {
        self.questions.iter().any(|q| q == question)
    }

    /// Respondents with every demographic field present
    pub fn complete_cases(&self) -> impl Iterator<Item = &Respondent> {
        self.respondents
            .iter()
            .filter(|r| r.demographics.is_complete())
    }

    pub fn demographics(&self) -> Vec<DemographicRecord> {
        self.respondents
            .iter()
            .map(|r| r.demographics.clone())
            .collect()
    }

    /// Append respondents from a survey with the same question set
    pub fn append(&mut self, other: SurveyTable) -> Result<()> {
        if other.questions != self.questions {
            return Err(PostStratError::ShapeMismatch(format!(
                "cannot append survey with questions {:?} onto {:?}",
                other.questions, self.questions
            )));
        }
        self.respondents.extend(other.respondents);
        Ok(())
    }
}

/// One demographic cell of the census tabulation
#[derive(Debug, Clone, PartialEq)]
pub struct CensusCell {
    pub demographics: DemographicRecord,
    pub count: f64,
}

impl CensusCell {
    pub fn new(demographics: DemographicRecord, count: f64) -> Self {
        Self {
            demographics,
            count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CensusTable {
    pub cells: Vec<CensusCell>,
}

impl CensusTable {
    pub fn new(cells: Vec<CensusCell>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn counts(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.count).collect()
    }

    pub fn demographics(&self) -> Vec<DemographicRecord> {
        self.cells.iter().map(|c| c.demographics.clone()).collect()
    }

    /// Total population represented by the tabulation
    pub fn total_population(&self) -> f64 {
        self.cells.iter().map(|c| c.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_missing() {
        assert_eq!(normalize_missing(None), None);
        assert_eq!(normalize_missing(Some("")), None);
        assert_eq!(normalize_missing(Some("  ")), None);
        assert_eq!(normalize_missing(Some("nan")), None);
        assert_eq!(normalize_missing(Some("NaN")), None);
        assert_eq!(normalize_missing(Some(" Male ")), Some("Male".to_string()));
    }

    #[test]
    fn test_record_completeness() {
        let complete = DemographicRecord::new("Male", "18-29", "$0 - $24,999", "Bachelor degree", "Pacific");
        assert!(complete.is_complete());

        let mut partial = complete.clone();
        partial.set(DemographicField::Education, None);
        assert!(!partial.is_complete());
        assert_eq!(partial.get(DemographicField::Gender), Some("Male"));
    }

    #[test]
    fn test_append_requires_same_questions() {
        let mut a = SurveyTable::new(vec!["Q1".to_string()], Vec::new());
        let b = SurveyTable::new(vec!["Q2".to_string()], Vec::new());
        assert!(a.append(b).is_err());

        let c = SurveyTable::new(
            vec!["Q1".to_string()],
            vec![Respondent::new(DemographicRecord::default()).with_answer("Q1", "Yes")],
        );
        a.append(c).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.respondents[0].answer("Q1"), Some("Yes"));
    }
}
