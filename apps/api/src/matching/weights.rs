//! Criterion weights: caller-supplied, then validated and renormalized once
//! per match call.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Weights used when the caller supplies none.
pub const DEFAULT_WEIGHTS: MatchWeights = MatchWeights {
    skills: 0.5,
    location: 0.2,
    experience: 0.2,
    salary: 0.1,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Skills,
    Location,
    Experience,
    Salary,
}

/// Caller-facing weights. Missing fields take the default value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchWeights {
    pub skills: f64,
    pub location: f64,
    pub experience: f64,
    pub salary: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

/// A correction applied to caller weights. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum WeightIssue {
    /// Clamped to 0.
    Negative { criterion: Criterion, value: f64 },
    /// NaN or infinite, replaced by 0.
    NonFinite { criterion: Criterion },
    /// Every weight was 0 after clamping; equal weighting applied.
    AllZero,
}

/// Weights after validation: each in `[0, 1]`, summing to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWeights {
    skills: f64,
    location: f64,
    experience: f64,
    salary: f64,
}

impl NormalizedWeights {
    pub fn skills(&self) -> f64 {
        self.skills
    }

    pub fn location(&self) -> f64 {
        self.location
    }

    pub fn experience(&self) -> f64 {
        self.experience
    }

    pub fn salary(&self) -> f64 {
        self.salary
    }

    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Skills => self.skills,
            Criterion::Location => self.location,
            Criterion::Experience => self.experience,
            Criterion::Salary => self.salary,
        }
    }

    fn equal() -> Self {
        Self {
            skills: 0.25,
            location: 0.25,
            experience: 0.25,
            salary: 0.25,
        }
    }
}

impl MatchWeights {
    pub fn sum(&self) -> f64 {
        self.skills + self.location + self.experience + self.salary
    }

    /// Clamps invalid entries to 0 and rescales to sum 1. An all-zero vector
    /// falls back to equal weighting. Every correction is reported.
    pub fn normalize(&self) -> (NormalizedWeights, Vec<WeightIssue>) {
        let mut issues = Vec::new();
        let mut clean = |criterion: Criterion, value: f64| -> f64 {
            if !value.is_finite() {
                issues.push(WeightIssue::NonFinite { criterion });
                0.0
            } else if value < 0.0 {
                issues.push(WeightIssue::Negative { criterion, value });
                0.0
            } else {
                value
            }
        };

        let skills = clean(Criterion::Skills, self.skills);
        let location = clean(Criterion::Location, self.location);
        let experience = clean(Criterion::Experience, self.experience);
        let salary = clean(Criterion::Salary, self.salary);
        let total = skills + location + experience + salary;

        // A finite but enormous total would overflow to inf
        let normalized = if total > 0.0 && total.is_finite() {
            NormalizedWeights {
                skills: skills / total,
                location: location / total,
                experience: experience / total,
                salary: salary / total,
            }
        } else {
            issues.push(WeightIssue::AllZero);
            NormalizedWeights::equal()
        };

        if !issues.is_empty() {
            warn!("Corrected match weights {:?}: {:?}", self, issues);
        }
        (normalized, issues)
    }
}
