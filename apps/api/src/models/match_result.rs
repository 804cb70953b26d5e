use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matching::weights::{NormalizedWeights, WeightIssue};

/// How a required skill was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillMatchMethod {
    /// Same canonical taxonomy name on both sides.
    Exact,
    /// Skill embeddings cleared the similarity threshold.
    Semantic,
}

/// One job skill paired with the best candidate skill that satisfied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub job_skill: String,
    pub candidate_skill: String,
    pub similarity: f64,
    pub method: SkillMatchMethod,
}

/// Whether skill-level semantic comparison took part in a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SemanticStatus {
    Applied,
    /// Not attempted, e.g. a profile has no stored embedding.
    Skipped { reason: String },
    /// Attempted but a provider call failed; taxonomy-only comparison was used.
    Unavailable { reason: String },
}

impl SemanticStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, SemanticStatus::Applied)
    }

    pub fn attempted(&self) -> bool {
        !matches!(self, SemanticStatus::Skipped { .. })
    }

    /// Combines two statuses, keeping the more degraded one.
    pub fn combine(self, other: SemanticStatus) -> SemanticStatus {
        match (self, other) {
            (SemanticStatus::Unavailable { reason }, _) | (_, SemanticStatus::Unavailable { reason }) => {
                SemanticStatus::Unavailable { reason }
            }
            (SemanticStatus::Skipped { reason }, _) | (_, SemanticStatus::Skipped { reason }) => {
                SemanticStatus::Skipped { reason }
            }
            _ => SemanticStatus::Applied,
        }
    }
}

/// Result of comparing two skill lists without persisted records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatchReport {
    pub score: f64,
    pub matches: Vec<SkillMatch>,
    pub missing: Vec<String>,
    pub semantic: SemanticStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub skills: f64,
    pub location: f64,
    pub experience: f64,
    pub salary: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchBreakdown {
    pub matched_skills: Vec<SkillMatch>,
    pub missing_skills: Vec<String>,
    pub location_match: bool,
    pub location_detail: String,
    pub experience_match: bool,
    pub experience_detail: String,
    pub salary_match: bool,
    pub salary_detail: String,
    pub semantic: SemanticStatus,
    /// Weights actually applied after renormalization.
    pub weights: NormalizedWeights,
    /// Corrections made to the caller-supplied weights, if any.
    pub weight_issues: Vec<WeightIssue>,
}

/// Derived compatibility view of one candidate against one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub total_score: f64,
    pub sub_scores: SubScores,
    pub breakdown: MatchBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_status_combine_prefers_unavailable() {
        let combined = SemanticStatus::Skipped {
            reason: "no embedding".to_string(),
        }
        .combine(SemanticStatus::Unavailable {
            reason: "timeout".to_string(),
        });
        assert_eq!(
            combined,
            SemanticStatus::Unavailable {
                reason: "timeout".to_string()
            }
        );
    }

    #[test]
    fn test_semantic_status_combine_applied() {
        let combined = SemanticStatus::Applied.combine(SemanticStatus::Applied);
        assert!(combined.is_applied());
        assert!(combined.attempted());
    }

    #[test]
    fn test_semantic_status_serializes_with_tag() {
        let json = serde_json::to_value(SemanticStatus::Skipped {
            reason: "missing".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "missing");
    }
}
