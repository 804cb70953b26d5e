//! Matching Engine: weighted composite score of one candidate against one job.
//!
//! Work is split in two phases:
//! 1. *prepare* (async): normalize each profile's skills and gather skill
//!    vectors. Collaborator failures are absorbed here and recorded as a
//!    [`SemanticStatus`].
//! 2. *score* (sync): pure arithmetic over two prepared profiles.
//!
//! The batch matcher prepares each profile once and scores the cross product.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::criteria::{
    score_experience, score_location, score_salary, LocationGranularity, NEUTRAL_SCORE,
};
use crate::matching::skills::{score_skill_coverage, SkillInput};
use crate::matching::weights::MatchWeights;
use crate::models::fold_key;
use crate::models::match_result::{
    MatchBreakdown, MatchResult, SemanticStatus, SkillMatchReport, SubScores,
};
use crate::models::profile::{CandidateProfile, JobProfile};
use crate::normalizer::strategies::ResolutionStrategy;
use crate::normalizer::SkillNormalizer;
use crate::providers::vector_index::{CANDIDATE_SKILLS_LABEL, JOB_SKILLS_LABEL, SKILL_LABEL};
use crate::providers::{OwnerType, ProfileStore, ProviderError};

/// Strategies used when semantic comparison is off or out of time.
pub const TAXONOMY_ONLY: [ResolutionStrategy; 2] = [ResolutionStrategy::Exact, ResolutionStrategy::Alias];

#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Minimum skill-embedding similarity accepted as a semantic skill match.
    pub skill_threshold: f64,
    pub location_granularity: LocationGranularity,
    pub default_weights: MatchWeights,
    /// In-flight vector lookups / embedding calls per profile.
    pub concurrency: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            skill_threshold: 0.75,
            location_granularity: LocationGranularity::City,
            default_weights: MatchWeights::default(),
            concurrency: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedCandidate {
    pub profile: CandidateProfile,
    pub skills: Vec<SkillInput>,
    pub semantic: SemanticStatus,
}

#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub profile: JobProfile,
    pub skills: Vec<SkillInput>,
    pub semantic: SemanticStatus,
}

impl PreparedCandidate {
    /// True when every key is among this candidate's canonical skill keys.
    pub fn has_all_skills(&self, keys: &[String]) -> bool {
        keys.iter().all(|key| self.skills.iter().any(|s| &s.key == key))
    }
}

struct PreparedSkills {
    skills: Vec<SkillInput>,
    degraded: Option<String>,
}

#[derive(Clone)]
pub struct MatchingEngine {
    profiles: Arc<dyn ProfileStore>,
    normalizer: SkillNormalizer,
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        normalizer: SkillNormalizer,
        config: MatchingConfig,
    ) -> Self {
        info!(
            "Matching engine ready (skill threshold: {}, granularity: {:?})",
            config.skill_threshold, config.location_granularity
        );
        Self {
            profiles,
            normalizer,
            config,
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    pub fn normalizer(&self) -> &SkillNormalizer {
        &self.normalizer
    }

    // ────────────────────────────────────────────────────────────────────────
    // Public operations
    // ────────────────────────────────────────────────────────────────────────

    /// `matchCandidateToJob`. Only unknown ids fail; every other problem
    /// degrades the result instead.
    pub async fn match_candidate_to_job(
        &self,
        candidate_id: Uuid,
        job_id: Uuid,
        weights: Option<MatchWeights>,
    ) -> Result<MatchResult, AppError> {
        let (candidate, job) = tokio::try_join!(
            self.load_candidate(candidate_id),
            self.load_job(job_id)
        )?;
        let (candidate, job) = tokio::join!(self.prepare_candidate(candidate), self.prepare_job(job));
        Ok(self.score_prepared(&candidate, &job, weights.as_ref()))
    }

    /// Skill-only comparison of two free-text lists, without stored records.
    pub async fn match_by_skills(
        &self,
        candidate_skills: &[String],
        job_skills: &[String],
        threshold: Option<f64>,
    ) -> Result<SkillMatchReport, AppError> {
        let threshold = threshold.unwrap_or(self.config.skill_threshold);
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::Validation(format!(
                "threshold must be within [0, 1], got {threshold}"
            )));
        }

        let candidate_entries = candidate_skills.iter().map(|s| (s.clone(), 1.0)).collect();
        let job_entries = job_skills.iter().map(|s| (s.clone(), 1.0)).collect();
        let (candidate, job) = tokio::join!(
            self.prepare_skills(candidate_entries, true),
            self.prepare_skills(job_entries, true)
        );

        let semantic = match candidate.degraded.or(job.degraded) {
            Some(reason) => SemanticStatus::Unavailable { reason },
            None => SemanticStatus::Applied,
        };
        let coverage = score_skill_coverage(&candidate.skills, &job.skills, threshold);
        Ok(SkillMatchReport {
            score: coverage.score,
            matches: coverage.matches,
            missing: coverage.missing,
            semantic,
        })
    }

    /// Embeds the candidate's skill list and stores it as the profile
    /// embedding that enables semantic comparison.
    pub async fn index_candidate(&self, candidate_id: Uuid) -> Result<(), AppError> {
        let candidate = self.load_candidate(candidate_id).await?;
        let text = candidate
            .skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        self.index_profile(OwnerType::Candidate, candidate_id, CANDIDATE_SKILLS_LABEL, &text)
            .await
    }

    /// Embeds the job's title and required skills as its profile embedding.
    pub async fn index_job(&self, job_id: Uuid) -> Result<(), AppError> {
        let job = self.load_job(job_id).await?;
        let skills = job
            .skills
            .iter()
            .map(|s| s.name.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let text = match (job.title.trim(), skills.is_empty()) {
            (_, true) => String::new(),
            ("", false) => skills,
            (title, false) => format!("{title}: {skills}"),
        };
        self.index_profile(OwnerType::Job, job_id, JOB_SKILLS_LABEL, &text)
            .await
    }

    async fn index_profile(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        label: &str,
        text: &str,
    ) -> Result<(), AppError> {
        if text.is_empty() {
            return Err(AppError::Validation(format!(
                "{} {owner_id} has no skills to index",
                owner_type.as_str()
            )));
        }
        let vector = self.normalizer.embedder().embed(text).await?;
        self.normalizer
            .vectors()
            .upsert(owner_type, owner_id, label, &vector)
            .await?;
        info!("Indexed {} {owner_id} under {label}", owner_type.as_str());
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Loading and preparation
    // ────────────────────────────────────────────────────────────────────────

    pub async fn load_candidate(&self, id: Uuid) -> Result<CandidateProfile, AppError> {
        self.profiles
            .get_candidate(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Candidate {id} not found")))
    }

    pub async fn load_job(&self, id: Uuid) -> Result<JobProfile, AppError> {
        self.profiles
            .get_job(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
    }

    pub async fn prepare_candidate(&self, profile: CandidateProfile) -> PreparedCandidate {
        let status = self
            .profile_status(OwnerType::Candidate, profile.id, CANDIDATE_SKILLS_LABEL)
            .await;
        let entries = profile.skills.iter().map(|s| (s.clone(), 1.0)).collect();
        let prepared = self.prepare_skills(entries, status.is_applied()).await;
        PreparedCandidate {
            semantic: degrade(status, prepared.degraded),
            skills: prepared.skills,
            profile,
        }
    }

    pub async fn prepare_job(&self, profile: JobProfile) -> PreparedJob {
        let status = self
            .profile_status(OwnerType::Job, profile.id, JOB_SKILLS_LABEL)
            .await;
        let entries = profile
            .skills
            .iter()
            .map(|s| (s.name.clone(), s.weight))
            .collect();
        let prepared = self.prepare_skills(entries, status.is_applied()).await;
        PreparedJob {
            semantic: degrade(status, prepared.degraded),
            skills: prepared.skills,
            profile,
        }
    }

    /// Semantic comparison needs the profile-level embedding to exist.
    async fn profile_status(&self, owner_type: OwnerType, id: Uuid, label: &str) -> SemanticStatus {
        match self.normalizer.vectors().get(owner_type, id, label).await {
            Ok(Some(_)) => SemanticStatus::Applied,
            Ok(None) => SemanticStatus::Skipped {
                reason: format!("{} {id} has no {label} embedding", owner_type.as_str()),
            },
            Err(e) => SemanticStatus::Unavailable {
                reason: e.to_string(),
            },
        }
    }

    /// Normalizes `(raw, weight)` entries, merges entries with the same
    /// canonical name (keeping the highest weight) and, when `semantic` is on,
    /// attaches one vector per skill.
    async fn prepare_skills(&self, entries: Vec<(String, f64)>, semantic: bool) -> PreparedSkills {
        let raws: Vec<String> = entries.iter().map(|(raw, _)| raw.clone()).collect();
        let mut raw_weights: HashMap<String, f64> = HashMap::new();
        for (raw, weight) in &entries {
            let slot = raw_weights.entry(fold_key(raw)).or_insert(*weight);
            *slot = slot.max(*weight);
        }

        let outcomes = if semantic {
            self.normalizer.normalize_many(&raws).await
        } else {
            self.normalizer.resolve_many_with(&raws, &TAXONOMY_ONLY).await
        };

        let mut degraded = None;
        let mut merged: Vec<(SkillInput, Option<Uuid>)> = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(reason) = outcome.degraded {
                degraded.get_or_insert(reason);
            }
            let weight = raw_weights
                .get(&fold_key(&outcome.raw))
                .copied()
                .unwrap_or(1.0);
            let key = fold_key(&outcome.skill.normalized);
            match merged.iter_mut().find(|(s, _)| s.key == key) {
                Some((existing, _)) => existing.weight = existing.weight.max(weight),
                None => merged.push((
                    SkillInput {
                        name: outcome.skill.normalized,
                        key,
                        weight,
                        vector: None,
                    },
                    outcome.skill.skill_id,
                )),
            }
        }

        if !semantic {
            return PreparedSkills {
                skills: merged.into_iter().map(|(s, _)| s).collect(),
                degraded,
            };
        }

        let requests: Vec<(String, Option<Uuid>)> = merged
            .iter()
            .map(|(skill, skill_id)| (skill.name.clone(), *skill_id))
            .collect();
        let vectors: Vec<Result<Vec<f32>, ProviderError>> = stream::iter(requests)
            .map(|(name, skill_id)| {
                let engine = self.clone();
                async move { engine.skill_vector(&name, skill_id).await }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut skills = Vec::with_capacity(merged.len());
        for ((mut skill, _), vector) in merged.into_iter().zip(vectors) {
            match vector {
                Ok(v) => skill.vector = Some(v),
                Err(e) => {
                    debug!("No vector for skill {}: {e}", skill.name);
                    degraded.get_or_insert(e.to_string());
                }
            }
            skills.push(skill);
        }
        PreparedSkills { skills, degraded }
    }

    /// Stored name embedding for taxonomy skills, a fresh embedding otherwise.
    async fn skill_vector(&self, name: &str, skill_id: Option<Uuid>) -> Result<Vec<f32>, ProviderError> {
        if let Some(id) = skill_id {
            if let Some(vector) = self
                .normalizer
                .vectors()
                .get(OwnerType::Skill, id, SKILL_LABEL)
                .await?
            {
                return Ok(vector);
            }
        }
        self.normalizer.embedder().embed(name).await
    }

    // ────────────────────────────────────────────────────────────────────────
    // Scoring
    // ────────────────────────────────────────────────────────────────────────

    /// Pure scoring of two prepared profiles. Deterministic for fixed inputs.
    pub fn score_prepared(
        &self,
        candidate: &PreparedCandidate,
        job: &PreparedJob,
        weights: Option<&MatchWeights>,
    ) -> MatchResult {
        let (weights, weight_issues) = weights
            .unwrap_or(&self.config.default_weights)
            .normalize();

        let (skill_score, matched_skills, missing_skills) = if job.skills.is_empty() {
            (NEUTRAL_SCORE, Vec::new(), Vec::new())
        } else {
            let coverage =
                score_skill_coverage(&candidate.skills, &job.skills, self.config.skill_threshold);
            (coverage.score, coverage.matches, coverage.missing)
        };

        let c = &candidate.profile;
        let j = &job.profile;
        let location = score_location(
            c.location.as_ref(),
            j.location.as_ref(),
            j.remote,
            self.config.location_granularity,
        );
        let experience = score_experience(c.years_experience, j.experience.as_ref());
        let salary = score_salary(
            c.salary_expectation,
            c.salary_currency.as_deref(),
            j.salary.as_ref(),
        );

        let sub_scores = SubScores {
            skills: skill_score.clamp(0.0, 1.0),
            location: location.score,
            experience: experience.score,
            salary: salary.score,
        };
        let total = weights.skills() * sub_scores.skills
            + weights.location() * sub_scores.location
            + weights.experience() * sub_scores.experience
            + weights.salary() * sub_scores.salary;

        MatchResult {
            candidate_id: c.id,
            job_id: j.id,
            total_score: total.clamp(0.0, 1.0),
            sub_scores,
            breakdown: MatchBreakdown {
                matched_skills,
                missing_skills,
                location_match: location.matched,
                location_detail: location.detail,
                experience_match: experience.matched,
                experience_detail: experience.detail,
                salary_match: salary.matched,
                salary_detail: salary.detail,
                semantic: candidate.semantic.clone().combine(job.semantic.clone()),
                weights,
                weight_issues,
            },
        }
    }
}

fn degrade(status: SemanticStatus, degraded: Option<String>) -> SemanticStatus {
    match degraded {
        Some(reason) if status.is_applied() => SemanticStatus::Unavailable { reason },
        _ => status,
    }
}
