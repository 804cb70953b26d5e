use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Category assigned to skills the taxonomy does not know about.
pub const OTHER_CATEGORY: &str = "Other";

/// Confidence used for aliases registered without an explicit value.
pub const DEFAULT_ALIAS_CONFIDENCE: f64 = 0.95;

/// A canonical taxonomy skill. `name` is unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: String,
}

/// Alternate text form of a canonical skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SkillAlias {
    pub alias: String,
    pub skill_id: Uuid,
    pub confidence: Option<f64>,
}

impl SkillAlias {
    pub fn effective_confidence(&self) -> f64 {
        self.confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_ALIAS_CONFIDENCE)
            .clamp(0.0, 1.0)
    }
}

/// Alias payload accepted when registering a skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasInput {
    pub alias: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Which resolution tier produced a normalized skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Exact,
    Alias,
    Semantic,
    Unmatched,
}

/// A runner-up semantic candidate for a raw skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAlternative {
    pub name: String,
    pub category: String,
    pub similarity: f64,
}

/// Outcome of normalizing one raw skill string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSkill {
    pub normalized: String,
    pub category: String,
    pub confidence: f64,
    pub alternatives: Vec<SkillAlternative>,
    pub method: ResolutionMethod,
    /// Taxonomy id of the canonical skill; `None` when unmatched.
    pub skill_id: Option<Uuid>,
}

impl NormalizedSkill {
    pub fn from_skill(skill: &Skill, confidence: f64, method: ResolutionMethod) -> Self {
        Self {
            normalized: skill.name.clone(),
            category: skill.category.clone(),
            confidence,
            alternatives: Vec::new(),
            method,
            skill_id: Some(skill.id),
        }
    }

    /// The raw string passed through unchanged, category "Other", confidence 0.
    pub fn unmatched(raw: &str) -> Self {
        Self {
            normalized: raw.trim().to_string(),
            category: OTHER_CATEGORY.to_string(),
            confidence: 0.0,
            alternatives: Vec::new(),
            method: ResolutionMethod::Unmatched,
            skill_id: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.method != ResolutionMethod::Unmatched
    }
}
