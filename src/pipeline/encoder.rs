//! Demographic feature encoding
//!
//! Converts the five categorical demographic fields into a fixed-width numeric
//! feature matrix. The encoder is fitted once on complete survey rows and then
//! frozen: census cells go through exactly the same vocabularies and the same
//! standardisation moments, so coordinate `j` means the same thing in both
//! domains.
//!
//! Feature layout:
//! - `Gender`: ordinal code over the genders seen at fit time (sorted by label)
//! - `Age`: bracket midpoint, standardised
//! - `Household Income`: bracket midpoint in dollars, standardised
//! - `Education`: ordinal code over the seen levels in natural order, standardised
//! - `location_<region>`: one-hot column per region seen at fit time

use faer::Mat;
use log::debug;
use serde::Serialize;

use super::demographics::{
    AgeBracket, CensusRegion, DemographicCategory, DemographicField, EducationLevel, Gender,
    IncomeBracket,
};
use super::error::{PostStratError, Result};
use super::tables::DemographicRecord;

/// Prefix of the one-hot region feature names
pub const REGION_FEATURE_PREFIX: &str = "location_";

/// Continuous columns rescaled with the fitted moments, in scaler order
pub const STANDARDIZED_FEATURES: [DemographicField; 3] = [
    DemographicField::HouseholdIncome,
    DemographicField::Age,
    DemographicField::Education,
];

const GENDER_COL: usize = 0;
const AGE_COL: usize = 1;
const INCOME_COL: usize = 2;
const EDUCATION_COL: usize = 3;
const FIRST_REGION_COL: usize = 4;

/// Dense numeric features with their column names
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    feature_names: Vec<String>,
    values: Mat<f64>,
}

impl FeatureMatrix {
    pub fn new(feature_names: Vec<String>, values: Mat<f64>) -> Result<Self> {
        if feature_names.len() != values.ncols() {
            return Err(PostStratError::ShapeMismatch(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                values.ncols()
            )));
        }
        Ok(Self {
            feature_names,
            values,
        })
    }

    /// Build from row-major data
    pub fn from_rows(feature_names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let ncols = feature_names.len();
        let mut values = Mat::<f64>::zeros(rows.len(), ncols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(PostStratError::ShapeMismatch(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    ncols
                )));
            }
            for (j, &v) in row.iter().enumerate() {
                values[(i, j)] = v;
            }
        }
        Self::new(feature_names, values)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn values(&self) -> &Mat<f64> {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[(row, col)]
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.ncols()).map(|j| self.values[(row, j)]).collect()
    }

    /// Values of a named feature, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.feature_names.iter().position(|n| n == name)?;
        Some((0..self.nrows()).map(|i| self.values[(i, j)]).collect())
    }

    /// A new matrix with only the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> FeatureMatrix {
        let mut values = Mat::<f64>::zeros(rows.len(), self.ncols());
        for (dst, &src) in rows.iter().enumerate() {
            for j in 0..self.ncols() {
                values[(dst, j)] = self.values[(src, j)];
            }
        }
        FeatureMatrix {
            feature_names: self.feature_names.clone(),
            values,
        }
    }

    /// First (row, feature) holding NaN or an infinity
    pub fn first_non_finite(&self) -> Option<(usize, &str)> {
        for i in 0..self.nrows() {
            for j in 0..self.ncols() {
                if !self.values[(i, j)].is_finite() {
                    return Some((i, self.feature_names[j].as_str()));
                }
            }
        }
        None
    }
}

/// Zero-mean, unit-variance rescaling with moments frozen at fit time
#[derive(Debug, Clone, Serialize)]
pub struct StandardScaler {
    pub features: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit population moments per column; a constant column keeps scale 1
    pub fn fit(features: Vec<String>, columns: &[Vec<f64>]) -> Result<Self> {
        if features.len() != columns.len() {
            return Err(PostStratError::ShapeMismatch(format!(
                "{} scaler feature names for {} columns",
                features.len(),
                columns.len()
            )));
        }

        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());

        for (name, column) in features.iter().zip(columns) {
            if column.is_empty() {
                return Err(PostStratError::InsufficientData(format!(
                    "cannot fit scaling moments for '{}' on zero rows",
                    name
                )));
            }
            let n = column.len() as f64;
            let mean = column.iter().sum::<f64>() / n;
            let variance = column.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
            let std = variance.sqrt();

            means.push(mean);
            scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }

        Ok(Self {
            features,
            means,
            scales,
        })
    }

    /// Rescale a value of the `idx`-th scaled column; NaN stays NaN
    #[inline]
    pub fn apply(&self, idx: usize, value: f64) -> f64 {
        (value - self.means[idx]) / self.scales[idx]
    }
}

/// Entry point for fitting; holds no state itself
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Fit vocabularies and standardisation moments on complete rows only.
    ///
    /// Rows with any missing demographic field are skipped (and counted in
    /// [`FittedEncoder::excluded_rows`]). A present value outside a field's
    /// domain is a category-domain error.
    pub fn fit(records: &[DemographicRecord]) -> Result<FittedEncoder> {
        let mut parsed = Vec::with_capacity(records.len());
        let mut excluded_rows = 0usize;

        for record in records {
            if !record.is_complete() {
                excluded_rows += 1;
                continue;
            }
            parsed.push(ParsedRecord::from_complete(record)?);
        }

        if parsed.is_empty() {
            return Err(PostStratError::InsufficientData(format!(
                "no complete demographic rows to fit the encoder ({} rows had missing fields)",
                excluded_rows
            )));
        }

        let mut gender_vocabulary: Vec<Gender> = Vec::new();
        let mut education_vocabulary: Vec<EducationLevel> = Vec::new();
        let mut region_vocabulary: Vec<CensusRegion> = Vec::new();
        for p in &parsed {
            if !gender_vocabulary.contains(&p.gender) {
                gender_vocabulary.push(p.gender);
            }
            if !education_vocabulary.contains(&p.education) {
                education_vocabulary.push(p.education);
            }
            if !region_vocabulary.contains(&p.region) {
                region_vocabulary.push(p.region);
            }
        }
        gender_vocabulary.sort_by_key(|g| g.label());
        education_vocabulary.sort_by_key(|e| e.rank());
        region_vocabulary.sort_by_key(|r| r.rank());

        let income: Vec<f64> = parsed.iter().map(|p| p.income.midpoint()).collect();
        let age: Vec<f64> = parsed.iter().map(|p| p.age.midpoint()).collect();
        let education: Vec<f64> = parsed
            .iter()
            .map(|p| ordinal(&education_vocabulary, &p.education) as f64)
            .collect();

        let scaler = StandardScaler::fit(
            STANDARDIZED_FEATURES
                .iter()
                .map(|f| f.column_name().to_string())
                .collect(),
            &[income, age, education],
        )?;

        debug!(
            "Encoder fitted on {} rows ({} excluded): {} genders, {} education levels, {} regions",
            parsed.len(),
            excluded_rows,
            gender_vocabulary.len(),
            education_vocabulary.len(),
            region_vocabulary.len()
        );

        Ok(FittedEncoder {
            gender_vocabulary,
            education_vocabulary,
            region_vocabulary,
            scaler,
            training_rows: parsed.len(),
            excluded_rows,
        })
    }

    /// Fit on the records and transform their complete subset
    pub fn fit_transform(records: &[DemographicRecord]) -> Result<(FittedEncoder, FeatureMatrix)> {
        let encoder = Self::fit(records)?;
        let complete: Vec<DemographicRecord> = records
            .iter()
            .filter(|r| r.is_complete())
            .cloned()
            .collect();
        let matrix = encoder.transform(&complete)?;
        Ok((encoder, matrix))
    }
}

/// Frozen encoder parameters shared by training and scoring
#[derive(Debug, Clone, Serialize)]
pub struct FittedEncoder {
    gender_vocabulary: Vec<Gender>,
    education_vocabulary: Vec<EducationLevel>,
    region_vocabulary: Vec<CensusRegion>,
    scaler: StandardScaler,
    training_rows: usize,
    excluded_rows: usize,
}

impl FittedEncoder {
    pub fn n_features(&self) -> usize {
        FIRST_REGION_COL + self.region_vocabulary.len()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            DemographicField::Gender,
            DemographicField::Age,
            DemographicField::HouseholdIncome,
            DemographicField::Education,
        ]
        .iter()
        .map(|f| f.column_name().to_string())
        .collect();
        names.extend(
            self.region_vocabulary
                .iter()
                .map(|r| format!("{}{}", REGION_FEATURE_PREFIX, r.label())),
        );
        names
    }

    pub fn gender_vocabulary(&self) -> &[Gender] {
        &self.gender_vocabulary
    }

    pub fn education_vocabulary(&self) -> &[EducationLevel] {
        &self.education_vocabulary
    }

    pub fn region_vocabulary(&self) -> &[CensusRegion] {
        &self.region_vocabulary
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Number of complete rows the encoder was fitted on
    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Number of rows skipped at fit time for missing demographics
    pub fn excluded_rows(&self) -> usize {
        self.excluded_rows
    }

    /// Encode records with the frozen parameters.
    ///
    /// Missing fields encode as NaN in their coordinates (all region columns
    /// for a missing region). Any present value that is outside the field's
    /// domain, or was not seen at fit time, is a category-domain error.
    pub fn transform(&self, records: &[DemographicRecord]) -> Result<FeatureMatrix> {
        let mut values = Mat::<f64>::zeros(records.len(), self.n_features());

        for (i, record) in records.iter().enumerate() {
            let row = self.encode_record(record)?;
            for (j, v) in row.into_iter().enumerate() {
                values[(i, j)] = v;
            }
        }

        FeatureMatrix::new(self.feature_names(), values)
    }

    /// Encode a single record into a feature vector
    pub fn encode_record(&self, record: &DemographicRecord) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.n_features()];

        row[GENDER_COL] = match record.gender.as_deref() {
            None => f64::NAN,
            Some(raw) => {
                let gender = Gender::parse(raw)?;
                self.seen_ordinal(&self.gender_vocabulary, &gender, raw)? as f64
            }
        };

        row[AGE_COL] = match record.age.as_deref() {
            None => f64::NAN,
            Some(raw) => self.scaler.apply(1, AgeBracket::parse(raw)?.midpoint()),
        };

        row[INCOME_COL] = match record.household_income.as_deref() {
            None => f64::NAN,
            Some(raw) => self.scaler.apply(0, IncomeBracket::parse(raw)?.midpoint()),
        };

        row[EDUCATION_COL] = match record.education.as_deref() {
            None => f64::NAN,
            Some(raw) => {
                let level = EducationLevel::parse(raw)?;
                let code = self.seen_ordinal(&self.education_vocabulary, &level, raw)?;
                self.scaler.apply(2, code as f64)
            }
        };

        match record.region.as_deref() {
            None => {
                for v in row.iter_mut().skip(FIRST_REGION_COL) {
                    *v = f64::NAN;
                }
            }
            Some(raw) => {
                let region = CensusRegion::parse(raw)?;
                let k = self.seen_ordinal(&self.region_vocabulary, &region, raw)?;
                row[FIRST_REGION_COL + k] = 1.0;
            }
        }

        Ok(row)
    }

    fn seen_ordinal<C: DemographicCategory>(
        &self,
        vocabulary: &[C],
        value: &C,
        raw: &str,
    ) -> Result<usize> {
        vocabulary.iter().position(|c| c == value).ok_or_else(|| {
            PostStratError::category(
                C::FIELD.column_name(),
                raw,
                "category was not present when the encoder was fitted",
            )
        })
    }
}

fn ordinal<C: PartialEq>(vocabulary: &[C], value: &C) -> usize {
    vocabulary.iter().position(|c| c == value).unwrap_or(0)
}

struct ParsedRecord {
    gender: Gender,
    age: AgeBracket,
    income: IncomeBracket,
    education: EducationLevel,
    region: CensusRegion,
}

impl ParsedRecord {
    fn from_complete(record: &DemographicRecord) -> Result<Self> {
        let field = |f: DemographicField| {
            record.get(f).ok_or_else(|| {
                PostStratError::category(f.column_name(), "nan", "missing value in a complete row")
            })
        };
        Ok(Self {
            gender: Gender::parse(field(DemographicField::Gender)?)?,
            age: AgeBracket::parse(field(DemographicField::Age)?)?,
            income: IncomeBracket::parse(field(DemographicField::HouseholdIncome)?)?,
            education: EducationLevel::parse(field(DemographicField::Education)?)?,
            region: CensusRegion::parse(field(DemographicField::Region)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(g: &str, a: &str, i: &str, e: &str, r: &str) -> DemographicRecord {
        DemographicRecord::new(g, a, i, e, r)
    }

    fn training() -> Vec<DemographicRecord> {
        vec![
            record("Male", "18-29", "$0 - $24,999", "Bachelor degree", "Pacific"),
            record("Female", "> 60", "$150,000+", "Graduate degree", "New England"),
            record("Female", "30-44", "$50,000 - $99,999", "High school degree", "Pacific"),
            record("Male", "45-60", "$25,000 - $49,999", "Bachelor degree", "Mountain"),
        ]
    }

    #[test]
    fn test_feature_layout() {
        let encoder = FeatureEncoder::fit(&training()).unwrap();
        assert_eq!(
            encoder.feature_names(),
            vec![
                "Gender",
                "Age",
                "Household Income",
                "Education",
                "location_New England",
                "location_Mountain",
                "location_Pacific",
            ]
        );
    }

    #[test]
    fn test_gender_codes_sorted_by_label() {
        let encoder = FeatureEncoder::fit(&training()).unwrap();
        assert_eq!(encoder.gender_vocabulary(), &[Gender::Female, Gender::Male]);
        let m = encoder.transform(&training()).unwrap();
        assert_eq!(m.column("Gender").unwrap(), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_education_codes_follow_natural_order() {
        let encoder = FeatureEncoder::fit(&training()).unwrap();
        assert_eq!(
            encoder.education_vocabulary(),
            &[
                EducationLevel::HighSchool,
                EducationLevel::Bachelor,
                EducationLevel::Graduate
            ]
        );
    }

    #[test]
    fn test_one_hot_region() {
        let encoder = FeatureEncoder::fit(&training()).unwrap();
        let row = encoder.encode_record(&training()[0]).unwrap();
        assert_eq!(&row[4..], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_missing_fields_encode_as_nan() {
        let encoder = FeatureEncoder::fit(&training()).unwrap();
        let partial = DemographicRecord::new("Male", "nan", "", "Bachelor degree", "nan");
        let row = encoder.encode_record(&partial).unwrap();
        assert_eq!(row[0], 1.0);
        assert!(row[1].is_nan());
        assert!(row[2].is_nan());
        assert!(row[3].is_finite());
        assert!(row[4..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_incomplete_rows_excluded_from_fit() {
        let mut rows = training();
        rows.push(record("Male", "18-29", "", "Graduate degree", "South Atlantic"));
        let encoder = FeatureEncoder::fit(&rows).unwrap();
        assert_eq!(encoder.training_rows(), 4);
        assert_eq!(encoder.excluded_rows(), 1);
        assert!(!encoder.region_vocabulary().contains(&CensusRegion::SouthAtlantic));
    }

    #[test]
    fn test_unseen_region_is_category_error() {
        let encoder = FeatureEncoder::fit(&training()).unwrap();
        let unseen = record("Male", "18-29", "$0 - $24,999", "Bachelor degree", "South Atlantic");
        let err = encoder.transform(&[unseen]).unwrap_err();
        assert!(err.is_category_domain());
    }

    #[test]
    fn test_fit_requires_complete_rows() {
        let rows = vec![record("Male", "", "$0 - $24,999", "Bachelor degree", "Pacific")];
        let err = FeatureEncoder::fit(&rows).unwrap_err();
        assert!(matches!(err, PostStratError::InsufficientData(_)));
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        let scaler = StandardScaler::fit(vec!["x".to_string()], &[vec![3.0, 3.0, 3.0]]).unwrap();
        assert_eq!(scaler.scales, vec![1.0]);
        assert_eq!(scaler.apply(0, 3.0), 0.0);
    }

    #[test]
    fn test_select_rows() {
        let m = FeatureMatrix::from_rows(
            vec!["a".to_string(), "b".to_string()],
            &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
        )
        .unwrap();
        let s = m.select_rows(&[2, 0]);
        assert_eq!(s.row(0), vec![5.0, 6.0]);
        assert_eq!(s.row(1), vec![1.0, 2.0]);
    }
}
