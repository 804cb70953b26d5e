//! Skill coverage: the skill criterion shared by pair matching and
//! skill-only matching.
//!
//! Algorithm, per job skill:
//! 1. same canonical key on the candidate side → similarity 1.0 (exact)
//! 2. otherwise best cosine similarity against candidate skill vectors,
//!    accepted when ≥ threshold (semantic)
//! 3. otherwise the job skill is missing and contributes 0
//!
//! score = Σ(weight × similarity) / Σ(weight) over *all* job skills, so missing
//! skills drag the score down.

use crate::matching::similarity::clamped_similarity;
use crate::models::match_result::{SkillMatch, SkillMatchMethod};

/// A skill prepared for comparison: display name, canonical comparison key,
/// weight (job side only) and an optional embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillInput {
    pub name: String,
    pub key: String,
    pub weight: f64,
    pub vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillScore {
    pub score: f64,
    pub matches: Vec<SkillMatch>,
    pub missing: Vec<String>,
}

pub fn score_skill_coverage(
    candidate: &[SkillInput],
    job: &[SkillInput],
    threshold: f64,
) -> SkillScore {
    if job.is_empty() {
        return SkillScore {
            score: 0.0,
            matches: Vec::new(),
            missing: Vec::new(),
        };
    }

    let mut matches = Vec::new();
    let mut missing = Vec::new();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for required in job {
        let weight = effective_weight(required.weight);
        weight_total += weight;

        match best_candidate_match(candidate, required, threshold) {
            Some(found) => {
                weighted_sum += weight * found.similarity;
                matches.push(found);
            }
            None => missing.push(required.name.clone()),
        }
    }

    let score = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        // Every weight was zero: plain mean
        matches.iter().map(|m| m.similarity).sum::<f64>() / job.len() as f64
    };

    SkillScore {
        score: score.clamp(0.0, 1.0),
        matches,
        missing,
    }
}

fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

fn best_candidate_match(
    candidate: &[SkillInput],
    required: &SkillInput,
    threshold: f64,
) -> Option<SkillMatch> {
    if let Some(exact) = candidate.iter().find(|c| c.key == required.key) {
        return Some(SkillMatch {
            job_skill: required.name.clone(),
            candidate_skill: exact.name.clone(),
            similarity: 1.0,
            method: SkillMatchMethod::Exact,
        });
    }

    let job_vector = required.vector.as_deref()?;
    let mut best: Option<(&SkillInput, f64)> = None;
    for skill in candidate {
        let Some(vector) = skill.vector.as_deref() else {
            continue;
        };
        let similarity = clamped_similarity(job_vector, vector);
        if best.map_or(true, |(_, current)| similarity > current) {
            best = Some((skill, similarity));
        }
    }

    best.filter(|(_, similarity)| *similarity >= threshold)
        .map(|(skill, similarity)| SkillMatch {
            job_skill: required.name.clone(),
            candidate_skill: skill.name.clone(),
            similarity,
            method: SkillMatchMethod::Semantic,
        })
}
