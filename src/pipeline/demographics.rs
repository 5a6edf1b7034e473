//! Demographic category domains
//!
//! Each demographic field has a small, fixed vocabulary. Rather than looking
//! labels up in ad-hoc dictionaries, every field is an enum whose lookups
//! (label, census code, bracket midpoint) are exhaustive `match`es, so adding
//! a category without a midpoint or code is a compile error.

use serde::{Deserialize, Serialize};

use super::error::{PostStratError, Result};

/// The five demographic fields shared by survey respondents and census cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DemographicField {
    Gender,
    Age,
    HouseholdIncome,
    Education,
    Region,
}

impl DemographicField {
    pub const ALL: [DemographicField; 5] = [
        DemographicField::Gender,
        DemographicField::Age,
        DemographicField::HouseholdIncome,
        DemographicField::Education,
        DemographicField::Region,
    ];

    /// Column name used by both the survey and the relabelled census table
    pub fn column_name(&self) -> &'static str {
        match self {
            DemographicField::Gender => "Gender",
            DemographicField::Age => "Age",
            DemographicField::HouseholdIncome => "Household Income",
            DemographicField::Education => "Education",
            DemographicField::Region => "Location (Census Region)",
        }
    }

    /// ACS PUMS variable carrying this field in a coded census tabulation
    pub fn acs_variable(&self) -> &'static str {
        match self {
            DemographicField::Gender => "SEX",
            DemographicField::Age => "AGEP_RC1",
            DemographicField::HouseholdIncome => "HINCP_RC1",
            DemographicField::Education => "SCHL_RC1",
            DemographicField::Region => "ucgid",
        }
    }

    pub fn from_column_name(name: &str) -> Option<DemographicField> {
        Self::ALL.into_iter().find(|f| f.column_name() == name)
    }

    /// Natural display order of the field's categories
    pub fn ordered_labels(&self) -> Vec<&'static str> {
        match self {
            DemographicField::Gender => Gender::ALL.iter().map(|c| c.label()).collect(),
            DemographicField::Age => AgeBracket::ALL.iter().map(|c| c.label()).collect(),
            DemographicField::HouseholdIncome => {
                IncomeBracket::ALL.iter().map(|c| c.label()).collect()
            }
            DemographicField::Education => {
                EducationLevel::ALL.iter().map(|c| c.label()).collect()
            }
            DemographicField::Region => CensusRegion::ALL.iter().map(|c| c.label()).collect(),
        }
    }

    /// Canonical label for a raw value, or a category-domain error
    pub fn canonical_label(&self, raw: &str) -> Result<&'static str> {
        Ok(match self {
            DemographicField::Gender => Gender::parse(raw)?.label(),
            DemographicField::Age => AgeBracket::parse(raw)?.label(),
            DemographicField::HouseholdIncome => IncomeBracket::parse(raw)?.label(),
            DemographicField::Education => EducationLevel::parse(raw)?.label(),
            DemographicField::Region => CensusRegion::parse(raw)?.label(),
        })
    }

    /// Translate an ACS numeric code into the survey vocabulary
    pub fn label_for_acs_code(&self, code: &str) -> Result<&'static str> {
        Ok(match self {
            DemographicField::Gender => Gender::from_acs_code(code)?.label(),
            DemographicField::Age => AgeBracket::from_acs_code(code)?.label(),
            DemographicField::HouseholdIncome => IncomeBracket::from_acs_code(code)?.label(),
            DemographicField::Education => EducationLevel::from_acs_code(code)?.label(),
            DemographicField::Region => CensusRegion::from_acs_code(code)?.label(),
        })
    }
}

impl std::fmt::Display for DemographicField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

/// Shared behaviour of the enum-keyed category domains
pub trait DemographicCategory: Copy + Eq + Sized + 'static {
    const FIELD: DemographicField;

    /// Every category in natural order
    fn all() -> &'static [Self];

    fn label(&self) -> &'static str;

    /// Code used in the ACS PUMS tabulation for this category
    fn acs_code(&self) -> &'static str;

    /// Position in natural order
    fn rank(&self) -> usize {
        Self::all().iter().position(|c| c == self).unwrap_or(usize::MAX)
    }

    /// Parse a label, tolerating case, whitespace and en-dash variations
    fn parse(raw: &str) -> Result<Self> {
        let wanted = normalize_label(raw);
        Self::all()
            .iter()
            .copied()
            .find(|c| normalize_label(c.label()) == wanted)
            .ok_or_else(|| {
                PostStratError::category(
                    Self::FIELD.column_name(),
                    raw,
                    "value is outside the known category domain",
                )
            })
    }

    fn from_acs_code(code: &str) -> Result<Self> {
        let code = code.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.acs_code() == code)
            .ok_or_else(|| {
                PostStratError::category(
                    Self::FIELD.acs_variable(),
                    code,
                    "unknown census code",
                )
            })
    }
}

fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];
}

impl DemographicCategory for Gender {
    const FIELD: DemographicField = DemographicField::Gender;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }

    fn acs_code(&self) -> &'static str {
        match self {
            Gender::Male => "1",
            Gender::Female => "2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeBracket {
    From18To29,
    From30To44,
    From45To60,
    Over60,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 4] = [
        AgeBracket::From18To29,
        AgeBracket::From30To44,
        AgeBracket::From45To60,
        AgeBracket::Over60,
    ];

    /// Representative age for the bracket
    pub fn midpoint(&self) -> f64 {
        match self {
            AgeBracket::From18To29 => 23.5,
            AgeBracket::From30To44 => 37.0,
            AgeBracket::From45To60 => 52.0,
            AgeBracket::Over60 => 70.0,
        }
    }
}

impl DemographicCategory for AgeBracket {
    const FIELD: DemographicField = DemographicField::Age;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn label(&self) -> &'static str {
        match self {
            AgeBracket::From18To29 => "18-29",
            AgeBracket::From30To44 => "30-44",
            AgeBracket::From45To60 => "45-60",
            AgeBracket::Over60 => "> 60",
        }
    }

    fn acs_code(&self) -> &'static str {
        match self {
            AgeBracket::From18To29 => "1",
            AgeBracket::From30To44 => "2",
            AgeBracket::From45To60 => "3",
            AgeBracket::Over60 => "4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeBracket {
    Under25k,
    From25kTo50k,
    From50kTo100k,
    From100kTo150k,
    Over150k,
}

impl IncomeBracket {
    pub const ALL: [IncomeBracket; 5] = [
        IncomeBracket::Under25k,
        IncomeBracket::From25kTo50k,
        IncomeBracket::From50kTo100k,
        IncomeBracket::From100kTo150k,
        IncomeBracket::Over150k,
    ];

    /// Representative household income in dollars
    pub fn midpoint(&self) -> f64 {
        match self {
            IncomeBracket::Under25k => 12_500.0,
            IncomeBracket::From25kTo50k => 37_500.0,
            IncomeBracket::From50kTo100k => 75_000.0,
            IncomeBracket::From100kTo150k => 125_000.0,
            IncomeBracket::Over150k => 200_000.0,
        }
    }
}

impl DemographicCategory for IncomeBracket {
    const FIELD: DemographicField = DemographicField::HouseholdIncome;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn label(&self) -> &'static str {
        match self {
            IncomeBracket::Under25k => "$0 - $24,999",
            IncomeBracket::From25kTo50k => "$25,000 - $49,999",
            IncomeBracket::From50kTo100k => "$50,000 - $99,999",
            IncomeBracket::From100kTo150k => "$100,000 - $149,999",
            IncomeBracket::Over150k => "$150,000+",
        }
    }

    fn acs_code(&self) -> &'static str {
        match self {
            IncomeBracket::Under25k => "1",
            IncomeBracket::From25kTo50k => "2",
            IncomeBracket::From50kTo100k => "3",
            IncomeBracket::From100kTo150k => "4",
            IncomeBracket::Over150k => "5",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    LessThanHighSchool,
    HighSchool,
    SomeCollege,
    Bachelor,
    Graduate,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 5] = [
        EducationLevel::LessThanHighSchool,
        EducationLevel::HighSchool,
        EducationLevel::SomeCollege,
        EducationLevel::Bachelor,
        EducationLevel::Graduate,
    ];
}

impl DemographicCategory for EducationLevel {
    const FIELD: DemographicField = DemographicField::Education;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn label(&self) -> &'static str {
        match self {
            EducationLevel::LessThanHighSchool => "Less than high school degree",
            EducationLevel::HighSchool => "High school degree",
            EducationLevel::SomeCollege => "Some college or Associate degree",
            EducationLevel::Bachelor => "Bachelor degree",
            EducationLevel::Graduate => "Graduate degree",
        }
    }

    fn acs_code(&self) -> &'static str {
        match self {
            EducationLevel::LessThanHighSchool => "1",
            EducationLevel::HighSchool => "2",
            EducationLevel::SomeCollege => "3",
            EducationLevel::Bachelor => "4",
            EducationLevel::Graduate => "5",
        }
    }
}

/// The nine US census divisions, in census code order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CensusRegion {
    NewEngland,
    MiddleAtlantic,
    EastNorthCentral,
    WestNorthCentral,
    SouthAtlantic,
    EastSouthCentral,
    WestSouthCentral,
    Mountain,
    Pacific,
}

impl CensusRegion {
    pub const ALL: [CensusRegion; 9] = [
        CensusRegion::NewEngland,
        CensusRegion::MiddleAtlantic,
        CensusRegion::EastNorthCentral,
        CensusRegion::WestNorthCentral,
        CensusRegion::SouthAtlantic,
        CensusRegion::EastSouthCentral,
        CensusRegion::WestSouthCentral,
        CensusRegion::Mountain,
        CensusRegion::Pacific,
    ];
}

impl DemographicCategory for CensusRegion {
    const FIELD: DemographicField = DemographicField::Region;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn label(&self) -> &'static str {
        match self {
            CensusRegion::NewEngland => "New England",
            CensusRegion::MiddleAtlantic => "Middle Atlantic",
            CensusRegion::EastNorthCentral => "East North Central",
            CensusRegion::WestNorthCentral => "West North Central",
            CensusRegion::SouthAtlantic => "South Atlantic",
            CensusRegion::EastSouthCentral => "East South Central",
            CensusRegion::WestSouthCentral => "West South Central",
            CensusRegion::Mountain => "Mountain",
            CensusRegion::Pacific => "Pacific",
        }
    }

    fn acs_code(&self) -> &'static str {
        match self {
            CensusRegion::NewEngland => "0300000US1",
            CensusRegion::MiddleAtlantic => "0300000US2",
            CensusRegion::EastNorthCentral => "0300000US3",
            CensusRegion::WestNorthCentral => "0300000US4",
            CensusRegion::SouthAtlantic => "0300000US5",
            CensusRegion::EastSouthCentral => "0300000US6",
            CensusRegion::WestSouthCentral => "0300000US7",
            CensusRegion::Mountain => "0300000US8",
            CensusRegion::Pacific => "0300000US9",
        }
    }
}
