//! Option tallies and demographic marginals
//!
//! A tally is one ordered list of `(option, count)` pairs, so options and
//! their counts can never drift apart when a column is reordered or filtered.

use serde::Serialize;

use super::demographics::DemographicField;
use super::error::{PostStratError, Result};
use super::tables::{CensusTable, SurveyTable, MISSING_LABEL};
use super::weights::stable_sum;

/// Ordered option -> count mapping for one column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionCounts {
    entries: Vec<(String, usize)>,
}

impl OptionCounts {
    /// Tally values; options sorted, with the missing category (`nan`) last
    pub fn from_values<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let mut present: std::collections::BTreeMap<String, usize> = Default::default();
        let mut missing = 0usize;
        for value in values {
            match value {
                Some(v) => *present.entry(v.to_string()).or_insert(0) += 1,
                None => missing += 1,
            }
        }

        let mut entries: Vec<(String, usize)> = present.into_iter().collect();
        if missing > 0 {
            entries.push((MISSING_LABEL.to_string(), missing));
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    pub fn options(&self) -> Vec<&str> {
        self.entries.iter().map(|(o, _)| o.as_str()).collect()
    }

    pub fn count(&self, option: &str) -> usize {
        self.entries
            .iter()
            .find(|(o, _)| o == option)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn missing(&self) -> usize {
        self.count(MISSING_LABEL)
    }

    /// Re-key the tally by a caller order.
    ///
    /// Options in `order` that were never observed get count 0. An observed
    /// option absent from `order` is an error, since dropping it would
    /// silently change the totals.
    pub fn reordered(&self, order: &[String]) -> Result<Self> {
        if let Some((unlisted, _)) = self
            .entries
            .iter()
            .find(|(o, _)| !order.iter().any(|x| x == o))
        {
            return Err(PostStratError::Config(format!(
                "observed option '{}' is not part of the requested order {:?}",
                unlisted, order
            )));
        }
        Ok(Self {
            entries: order
                .iter()
                .map(|o| (o.clone(), self.count(o)))
                .collect(),
        })
    }

    /// The same tally without the missing category
    pub fn without_missing(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(o, _)| o != MISSING_LABEL)
                .cloned()
                .collect(),
        }
    }

    /// Share of each option over the tally's total
    pub fn proportions(&self) -> Result<Vec<(String, f64)>> {
        let total = self.total();
        if total == 0 {
            return Err(PostStratError::DegenerateAggregate(
                "cannot compute proportions of an empty tally".to_string(),
            ));
        }
        Ok(self
            .entries
            .iter()
            .map(|(o, c)| (o.clone(), *c as f64 / total as f64))
            .collect())
    }
}

/// Tally a question column across all respondents
pub fn tally_question(survey: &SurveyTable, question: &str) -> Result<OptionCounts> {
    if !survey.has_question(question) {
        return Err(PostStratError::MissingColumn(question.to_string()));
    }
    Ok(OptionCounts::from_values(
        survey.respondents.iter().map(|r| r.answer(question)),
    ))
}

/// Tally a demographic field in its natural category order (missing last)
pub fn tally_demographic(survey: &SurveyTable, field: DemographicField) -> Result<OptionCounts> {
    let canonical: Vec<Option<&'static str>> = survey
        .respondents
        .iter()
        .map(|r| {
            r.demographics
                .get(field)
                .map(|raw| field.canonical_label(raw))
                .transpose()
        })
        .collect::<Result<_>>()?;

    let tally = OptionCounts::from_values(canonical);
    let mut order: Vec<String> = field
        .ordered_labels()
        .into_iter()
        .map(String::from)
        .collect();
    order.push(MISSING_LABEL.to_string());

    let ordered = tally.reordered(&order)?;
    // Keep the missing slot only when something was missing
    if ordered.missing() == 0 {
        Ok(ordered.without_missing())
    } else {
        Ok(ordered)
    }
}

/// Census vs survey share of one demographic category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginalShare {
    pub category: String,
    pub census_share: f64,
    pub survey_share: f64,
}

/// How far the survey sample's composition is from the population's
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginalComparison {
    pub field: DemographicField,
    pub shares: Vec<MarginalShare>,
}

impl MarginalComparison {
    /// Largest absolute gap between census and survey shares
    pub fn max_gap(&self) -> f64 {
        self.shares
            .iter()
            .map(|s| (s.census_share - s.survey_share).abs())
            .fold(0.0, f64::max)
    }
}

/// Compare census and survey marginals for one field.
///
/// Survey shares exclude missing responses; census shares are count-weighted.
pub fn compare_marginals(
    survey: &SurveyTable,
    census: &CensusTable,
    field: DemographicField,
) -> Result<MarginalComparison> {
    let survey_tally = tally_demographic(survey, field)?.without_missing();
    let survey_total = survey_tally.total();

    let mut census_by_label: Vec<(&'static str, f64)> = field
        .ordered_labels()
        .into_iter()
        .map(|label| (label, 0.0))
        .collect();
    let mut census_values: Vec<Vec<f64>> = vec![Vec::new(); census_by_label.len()];
    for cell in &census.cells {
        if let Some(raw) = cell.demographics.get(field) {
            let label = field.canonical_label(raw)?;
            if let Some(pos) = census_by_label.iter().position(|(l, _)| *l == label) {
                census_values[pos].push(cell.count);
            }
        }
    }
    for (slot, values) in census_by_label.iter_mut().zip(census_values) {
        slot.1 = stable_sum(values);
    }
    let census_total = stable_sum(census_by_label.iter().map(|(_, c)| *c));

    if census_total <= 0.0 {
        return Err(PostStratError::DegenerateAggregate(format!(
            "census has zero population for field '{}'",
            field
        )));
    }
    if survey_total == 0 {
        return Err(PostStratError::DegenerateAggregate(format!(
            "survey has no non-missing responses for field '{}'",
            field
        )));
    }

    let shares = census_by_label
        .into_iter()
        .filter(|(label, count)| *count > 0.0 || survey_tally.count(label) > 0)
        .map(|(label, count)| MarginalShare {
            category: label.to_string(),
            census_share: count / census_total,
            survey_share: survey_tally.count(label) as f64 / survey_total as f64,
        })
        .collect();

    Ok(MarginalComparison { field, shares })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sorted_last() {
        let tally = OptionCounts::from_values(vec![Some("b"), None, Some("a"), Some("b")]);
        assert_eq!(tally.options(), vec!["a", "b", "nan"]);
        assert_eq!(tally.count("b"), 2);
        assert_eq!(tally.missing(), 1);
        assert_eq!(tally.total(), 4);
    }

    #[test]
    fn test_reorder_keeps_counts_aligned() {
        let tally = OptionCounts::from_values(vec![Some("Some"), Some("A lot"), Some("Some"), None]);
        let order: Vec<String> = ["Not at all", "Not much", "Some", "A lot", "nan"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let ordered = tally.reordered(&order).unwrap();
        assert_eq!(
            ordered.entries(),
            &[
                ("Not at all".to_string(), 0),
                ("Not much".to_string(), 0),
                ("Some".to_string(), 2),
                ("A lot".to_string(), 1),
                ("nan".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_reorder_rejects_unlisted_option() {
        let tally = OptionCounts::from_values(vec![Some("x"), Some("y")]);
        assert!(tally.reordered(&["x".to_string()]).is_err());
    }

    #[test]
    fn test_proportions() {
        let tally = OptionCounts::from_values(vec![Some("a"), Some("b"), Some("b"), Some("b")]);
        let p = tally.proportions().unwrap();
        assert_eq!(p, vec![("a".to_string(), 0.25), ("b".to_string(), 0.75)]);
        assert!(OptionCounts::default().proportions().is_err());
    }
}
