//! Read-only candidate and job records as seen by the matching core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::fold_key;

/// A place at up to three levels of detail. Any level may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Location {
    pub fn is_unknown(&self) -> bool {
        [&self.city, &self.region, &self.country]
            .iter()
            .all(|part| part.as_deref().map(str::trim).unwrap_or("").is_empty())
    }

    /// Folded city/region/country, with blank parts treated as unknown.
    pub fn folded(&self) -> (Option<String>, Option<String>, Option<String>) {
        let fold = |part: &Option<String>| {
            part.as_deref()
                .map(fold_key)
                .filter(|value| !value.is_empty())
        };
        (fold(&self.city), fold(&self.region), fold(&self.country))
    }
}

/// Inclusive experience band in years. Either edge may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceBand {
    #[serde(default)]
    pub min_years: Option<f64>,
    #[serde(default)]
    pub max_years: Option<f64>,
}

impl ExperienceBand {
    pub fn is_open(&self) -> bool {
        self.min_years.is_none() && self.max_years.is_none()
    }

    pub fn contains(&self, years: f64) -> bool {
        self.min_years.map_or(true, |min| years >= min)
            && self.max_years.map_or(true, |max| years <= max)
    }
}

/// Offered compensation range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl SalaryRange {
    pub fn contains(&self, amount: f64) -> bool {
        self.min.map_or(true, |min| amount >= min) && self.max.map_or(true, |max| amount <= max)
    }

    /// True when the two ranges share at least one value.
    pub fn overlaps(&self, other: &SalaryRange) -> bool {
        let low = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let high = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        match (low, high) {
            (Some(low), Some(high)) => low <= high,
            _ => true,
        }
    }
}

fn default_skill_weight() -> f64 {
    1.0
}

/// A skill a job requires, optionally weighted relative to the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredSkill {
    pub name: String,
    #[serde(default = "default_skill_weight")]
    pub weight: f64,
}

impl RequiredSkill {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: default_skill_weight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: Uuid,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub years_experience: Option<f64>,
    #[serde(default)]
    pub salary_expectation: Option<f64>,
    #[serde(default)]
    pub salary_currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProfile {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub skills: Vec<RequiredSkill>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub experience: Option<ExperienceBand>,
    #[serde(default)]
    pub salary: Option<SalaryRange>,
    #[serde(default)]
    pub job_type: Option<String>,
}
