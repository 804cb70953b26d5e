//! Non-skill criteria: location, experience, salary.
//!
//! Each scorer is a pure function returning a score in `[0, 1]`, a fit flag and
//! a short human-readable detail. Unknown data on either side scores a neutral
//! 0.5 and is never reported as a fit.

use serde::{Deserialize, Serialize};

use crate::models::fold_key;
use crate::models::profile::{ExperienceBand, Location, SalaryRange};

/// Score for criteria whose inputs are unknown.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Partial credit for same region, different city.
pub const SAME_REGION_SCORE: f64 = 0.5;

/// Score lost per year outside the experience band.
pub const EXPERIENCE_DECAY_PER_YEAR: f64 = 0.2;

/// Relative overshoot above the salary ceiling at which the score reaches 0.
pub const SALARY_ZERO_AT_OVERSHOOT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub score: f64,
    pub matched: bool,
    pub detail: String,
}

impl CriterionScore {
    fn new(score: f64, matched: bool, detail: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            matched,
            detail: detail.into(),
        }
    }

    fn unknown(detail: impl Into<String>) -> Self {
        Self::new(NEUTRAL_SCORE, false, detail)
    }
}

/// Finest level at which two locations must coincide to count as a fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationGranularity {
    #[default]
    City,
    Region,
    Country,
}

// ────────────────────────────────────────────────────────────────────────────
// Location
// ────────────────────────────────────────────────────────────────────────────

/// Remote jobs always fit. Otherwise the job's location sets the requirement
/// at the finest level it states, no finer than `granularity`.
pub fn score_location(
    candidate: Option<&Location>,
    job: Option<&Location>,
    remote: bool,
    granularity: LocationGranularity,
) -> CriterionScore {
    if remote {
        return CriterionScore::new(1.0, true, "Remote position");
    }

    let (candidate, job) = match (candidate, job) {
        (Some(c), Some(j)) if !c.is_unknown() && !j.is_unknown() => (c.folded(), j.folded()),
        _ => return CriterionScore::unknown("Location unknown"),
    };
    let (c_city, c_region, c_country) = candidate;
    let (j_city, j_region, j_country) = job;

    // Guard against same-named cities in different countries
    if let (Some(a), Some(b)) = (&c_country, &j_country) {
        if a != b {
            return CriterionScore::new(0.0, false, "Different country");
        }
    }

    let levels = [
        (LocationGranularity::City, c_city, j_city),
        (LocationGranularity::Region, c_region.clone(), j_region.clone()),
        (LocationGranularity::Country, c_country, j_country),
    ];

    let requirement = levels
        .iter()
        .filter(|(level, _, _)| *level as u8 >= granularity as u8)
        .find(|(_, _, job_value)| job_value.is_some());

    let Some((level, candidate_value, job_value)) = requirement else {
        return CriterionScore::unknown("Job location too coarse to compare");
    };

    match candidate_value {
        None => CriterionScore::unknown(format!("Candidate {} unknown", level_name(*level))),
        Some(value) if Some(value) == job_value.as_ref() => {
            CriterionScore::new(1.0, true, format!("Same {}", level_name(*level)))
        }
        Some(_) => {
            let same_region = matches!((&c_region, &j_region), (Some(a), Some(b)) if a == b);
            if *level == LocationGranularity::City && same_region {
                CriterionScore::new(SAME_REGION_SCORE, false, "Same region, different city")
            } else {
                CriterionScore::new(0.0, false, format!("Different {}", level_name(*level)))
            }
        }
    }
}

fn level_name(level: LocationGranularity) -> &'static str {
    match level {
        LocationGranularity::City => "city",
        LocationGranularity::Region => "region",
        LocationGranularity::Country => "country",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Experience
// ────────────────────────────────────────────────────────────────────────────

/// 1.0 inside the band, minus 0.2 per year from the nearest edge outside it.
pub fn score_experience(years: Option<f64>, band: Option<&ExperienceBand>) -> CriterionScore {
    let band = match band {
        Some(b) if !b.is_open() => b,
        _ => return CriterionScore::new(1.0, true, "No experience requirement"),
    };
    let years = match years.filter(|y| y.is_finite() && *y >= 0.0) {
        Some(y) => y,
        None => return CriterionScore::unknown("Candidate experience unknown"),
    };

    if band.contains(years) {
        return CriterionScore::new(1.0, true, format!("{years:.1} years within band"));
    }

    let (distance, direction) = match (band.min_years, band.max_years) {
        (Some(min), _) if years < min => (min - years, "below minimum"),
        (_, Some(max)) => (years - max, "above maximum"),
        _ => (0.0, "outside band"),
    };
    let score = (1.0 - EXPERIENCE_DECAY_PER_YEAR * distance).max(0.0);
    CriterionScore::new(
        score,
        false,
        format!("{years:.1} years, {distance:.1} {direction}"),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Salary
// ────────────────────────────────────────────────────────────────────────────

/// 1.0 when the expectation is at or below the offered maximum, decaying
/// linearly to 0 at 50% above it.
pub fn score_salary(
    expectation: Option<f64>,
    currency: Option<&str>,
    range: Option<&SalaryRange>,
) -> CriterionScore {
    let (range, max) = match range {
        Some(r) => match r.max.filter(|m| m.is_finite()) {
            Some(max) => (r, max),
            None => return CriterionScore::new(1.0, true, "No salary ceiling"),
        },
        None => return CriterionScore::new(1.0, true, "No salary range"),
    };
    let expectation = match expectation.filter(|e| e.is_finite() && *e >= 0.0) {
        Some(e) => e,
        None => return CriterionScore::unknown("Salary expectation unknown"),
    };

    let folded = |c: Option<&str>| c.map(fold_key).filter(|c| !c.is_empty());
    if let (Some(a), Some(b)) = (folded(currency), folded(range.currency.as_deref())) {
        if a != b {
            return CriterionScore::unknown(format!("Currency mismatch ({a} vs {b})"));
        }
    }

    if expectation <= max {
        let detail = if range.contains(expectation) {
            "Expectation within range"
        } else {
            "Expectation below range"
        };
        return CriterionScore::new(1.0, true, detail);
    }

    let score = if max > 0.0 {
        let overshoot = (expectation - max) / max;
        (1.0 - overshoot / SALARY_ZERO_AT_OVERSHOOT).max(0.0)
    } else {
        0.0
    };
    CriterionScore::new(
        score,
        false,
        format!("Expectation {expectation:.0} above maximum {max:.0}"),
    )
}
