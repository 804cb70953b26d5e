//! Batch Matcher: the Matching Engine over a candidate × job cross product.
//!
//! 1. dedupe and cap both id lists
//! 2. load every profile, apply cheap hard filters, prepare the survivors
//!    (bounded concurrency, overall deadline)
//! 3. apply the required-skill filter on prepared candidates
//! 4. score every remaining pair synchronously
//!
//! Profiles that could not be loaded or prepared in time do not abort the
//! batch: their pairs are reported in `not_computed`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::criteria::{score_location, LocationGranularity};
use crate::matching::engine::{MatchingEngine, PreparedCandidate, PreparedJob, TAXONOMY_ONLY};
use crate::matching::weights::MatchWeights;
use crate::models::fold_key;
use crate::models::match_result::MatchResult;
use crate::models::profile::{CandidateProfile, ExperienceBand, JobProfile, Location, SalaryRange};

const DEADLINE_REASON: &str = "deadline exceeded";

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_candidates: usize,
    pub max_jobs: usize,
    /// Profiles prepared concurrently; bounds in-flight embedding calls.
    pub concurrency: usize,
    pub deadline: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_candidates: 100,
            max_jobs: 50,
            concurrency: 6,
            deadline: Duration::from_secs(10),
        }
    }
}

/// Optional hard filters and per-call limits. Caller caps can only lower the
/// configured caps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchCriteria {
    /// Candidates must hold every one of these (after normalization).
    pub required_skills: Vec<String>,
    /// Candidates must be located here; jobs must be here or remote.
    pub location: Option<Location>,
    /// Candidates' years of experience must fall in this band.
    pub experience: Option<ExperienceBand>,
    /// Candidates' expectation must fall in this band; jobs' offer must overlap it.
    pub salary: Option<SalaryRange>,
    pub job_type: Option<String>,
    pub min_score: Option<f64>,
    pub max_candidates: Option<usize>,
    pub max_jobs: Option<usize>,
    pub weights: Option<MatchWeights>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Highest total score first; ties by candidate id then job id.
    pub results: Vec<MatchResult>,
    pub not_computed: Vec<PairFailure>,
    pub candidates_filtered: usize,
    pub jobs_filtered: usize,
    pub candidates_truncated: usize,
    pub jobs_truncated: usize,
    pub below_min_score: usize,
    pub deadline_exceeded: bool,
}

enum Side {
    Candidate(Uuid),
    Job(Uuid),
}

enum Slot<T> {
    Ready(T),
    Filtered,
    Failed(String),
}

enum Loaded {
    Candidate(Uuid, Slot<PreparedCandidate>),
    Job(Uuid, Slot<PreparedJob>),
}

#[derive(Clone)]
pub struct BatchMatcher {
    engine: MatchingEngine,
    config: BatchConfig,
}

impl BatchMatcher {
    pub fn new(engine: MatchingEngine, config: BatchConfig) -> Self {
        info!(
            "Batch matcher ready (caps: {} candidates × {} jobs, concurrency: {}, deadline: {}ms)",
            config.max_candidates,
            config.max_jobs,
            config.concurrency,
            config.deadline.as_millis()
        );
        Self { engine, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub async fn batch_match(
        &self,
        candidate_ids: &[Uuid],
        job_ids: &[Uuid],
        criteria: &BatchCriteria,
    ) -> Result<BatchReport, AppError> {
        if let Some(min) = criteria.min_score {
            if !min.is_finite() || !(0.0..=1.0).contains(&min) {
                return Err(AppError::Validation(format!(
                    "min_score must be within [0, 1], got {min}"
                )));
            }
        }

        let mut report = BatchReport::default();
        let candidate_cap = cap(criteria.max_candidates, self.config.max_candidates);
        let job_cap = cap(criteria.max_jobs, self.config.max_jobs);
        let (candidate_ids, truncated) = dedupe_and_cap(candidate_ids, candidate_cap);
        report.candidates_truncated = truncated;
        let (job_ids, truncated) = dedupe_and_cap(job_ids, job_cap);
        report.jobs_truncated = truncated;

        let started = Instant::now();
        let deadline = started + self.config.deadline;

        let sides: Vec<Side> = candidate_ids
            .iter()
            .map(|id| Side::Candidate(*id))
            .chain(job_ids.iter().map(|id| Side::Job(*id)))
            .collect();
        let total = sides.len();
        let shared_criteria = Arc::new(criteria.clone());

        let load_all = async {
            let mut loading = stream::iter(sides)
                .map(|side| {
                    let matcher = self.clone();
                    let criteria = shared_criteria.clone();
                    async move { matcher.load_side(side, &criteria).await }
                })
                .buffer_unordered(self.config.concurrency.max(1));

            let mut candidates: HashMap<Uuid, Slot<PreparedCandidate>> = HashMap::new();
            let mut jobs: HashMap<Uuid, Slot<PreparedJob>> = HashMap::new();
            let mut exceeded = false;
            loop {
                match tokio::time::timeout_at(deadline, loading.next()).await {
                    Ok(Some(Loaded::Candidate(id, slot))) => {
                        candidates.insert(id, slot);
                    }
                    Ok(Some(Loaded::Job(id, slot))) => {
                        jobs.insert(id, slot);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        warn!(
                            "Batch deadline of {}ms hit with {} of {} profiles prepared",
                            self.config.deadline.as_millis(),
                            candidates.len() + jobs.len(),
                            total
                        );
                        exceeded = true;
                        break;
                    }
                }
            }
            (candidates, jobs, exceeded)
        };

        let ((mut candidates, jobs, load_exceeded), (required, required_exceeded)) = tokio::join!(
            load_all,
            self.required_skill_keys(&criteria.required_skills, deadline)
        );
        report.deadline_exceeded = load_exceeded || required_exceeded;

        if !required.is_empty() {
            for slot in candidates.values_mut() {
                if matches!(slot, Slot::Ready(c) if !c.has_all_skills(&required)) {
                    *slot = Slot::Filtered;
                }
            }
        }
        report.candidates_filtered = candidates
            .values()
            .filter(|s| matches!(s, Slot::Filtered))
            .count();
        report.jobs_filtered = jobs.values().filter(|s| matches!(s, Slot::Filtered)).count();

        for candidate_id in &candidate_ids {
            let candidate = candidates.get(candidate_id);
            if matches!(candidate, Some(Slot::Filtered)) {
                continue;
            }
            for job_id in &job_ids {
                let job = jobs.get(job_id);
                match (candidate, job) {
                    (_, Some(Slot::Filtered)) => {}
                    (Some(Slot::Ready(c)), Some(Slot::Ready(j))) => {
                        let result = self.engine.score_prepared(c, j, criteria.weights.as_ref());
                        if criteria.min_score.map_or(true, |min| result.total_score >= min) {
                            report.results.push(result);
                        } else {
                            report.below_min_score += 1;
                        }
                    }
                    (candidate, job) => report.not_computed.push(PairFailure {
                        candidate_id: *candidate_id,
                        job_id: *job_id,
                        reason: failure_reason(candidate)
                            .or_else(|| failure_reason(job))
                            .unwrap_or_else(|| DEADLINE_REASON.to_string()),
                    }),
                }
            }
        }

        report.results.sort_by(rank_order);

        info!(
            "Batch matched {} pairs in {}ms ({} not computed, {} below min score)",
            report.results.len(),
            started.elapsed().as_millis(),
            report.not_computed.len(),
            report.below_min_score
        );
        Ok(report)
    }

    async fn load_side(&self, side: Side, criteria: &BatchCriteria) -> Loaded {
        let profiles = self.engine.profiles();
        let granularity = self.engine.config().location_granularity;
        match side {
            Side::Candidate(id) => {
                let slot = match profiles.get_candidate(id).await {
                    Ok(Some(p)) if candidate_passes(&p, criteria, granularity) => {
                        Slot::Ready(self.engine.prepare_candidate(p).await)
                    }
                    Ok(Some(_)) => Slot::Filtered,
                    Ok(None) => Slot::Failed(format!("candidate {id} not found")),
                    Err(e) => {
                        warn!("Could not load candidate {id}: {e}");
                        Slot::Failed(e.to_string())
                    }
                };
                Loaded::Candidate(id, slot)
            }
            Side::Job(id) => {
                let slot = match profiles.get_job(id).await {
                    Ok(Some(p)) if job_passes(&p, criteria, granularity) => {
                        Slot::Ready(self.engine.prepare_job(p).await)
                    }
                    Ok(Some(_)) => Slot::Filtered,
                    Ok(None) => Slot::Failed(format!("job {id} not found")),
                    Err(e) => {
                        warn!("Could not load job {id}: {e}");
                        Slot::Failed(e.to_string())
                    }
                };
                Loaded::Job(id, slot)
            }
        }
    }

    /// Folded canonical keys of the required skills. Past the deadline the
    /// embedding tier is abandoned and only exact and alias lookups apply.
    async fn required_skill_keys(&self, raws: &[String], deadline: Instant) -> (Vec<String>, bool) {
        if raws.is_empty() {
            return (Vec::new(), false);
        }
        let normalizer = self.engine.normalizer();
        let (outcomes, exceeded) =
            match tokio::time::timeout_at(deadline, normalizer.normalize_many(raws)).await {
                Ok(outcomes) => (outcomes, false),
                Err(_) => {
                    warn!(
                        "Required skills not resolved within the {}ms batch deadline, using taxonomy lookups",
                        self.config.deadline.as_millis()
                    );
                    (normalizer.resolve_many_with(raws, &TAXONOMY_ONLY).await, true)
                }
            };
        let keys = outcomes
            .into_iter()
            .map(|outcome| fold_key(&outcome.skill.normalized))
            .collect();
        (keys, exceeded)
    }
}

fn cap(requested: Option<usize>, configured: usize) -> usize {
    requested.map_or(configured, |r| r.min(configured))
}

fn dedupe_and_cap(ids: &[Uuid], cap: usize) -> (Vec<Uuid>, usize) {
    let mut seen = HashSet::new();
    let mut distinct: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    let truncated = distinct.len().saturating_sub(cap);
    distinct.truncate(cap);
    (distinct, truncated)
}

fn failure_reason<T>(slot: Option<&Slot<T>>) -> Option<String> {
    match slot {
        None => Some(DEADLINE_REASON.to_string()),
        Some(Slot::Failed(reason)) => Some(reason.clone()),
        Some(_) => None,
    }
}

/// Highest total first, then candidate id, then job id.
pub fn rank_order(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.total_score
        .partial_cmp(&a.total_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        .then_with(|| a.job_id.cmp(&b.job_id))
}

fn candidate_passes(
    candidate: &CandidateProfile,
    criteria: &BatchCriteria,
    granularity: LocationGranularity,
) -> bool {
    if let Some(location) = &criteria.location {
        if !score_location(candidate.location.as_ref(), Some(location), false, granularity).matched {
            return false;
        }
    }
    if let Some(band) = &criteria.experience {
        match candidate.years_experience {
            Some(years) if band.contains(years) => {}
            _ => return false,
        }
    }
    if let Some(range) = &criteria.salary {
        match candidate.salary_expectation {
            Some(expectation) if range.contains(expectation) => {}
            _ => return false,
        }
    }
    true
}

fn job_passes(job: &JobProfile, criteria: &BatchCriteria, granularity: LocationGranularity) -> bool {
    if let Some(wanted) = criteria.job_type.as_deref().map(fold_key) {
        if job.job_type.as_deref().map(fold_key) != Some(wanted) {
            return false;
        }
    }
    if let Some(location) = &criteria.location {
        if !score_location(Some(location), job.location.as_ref(), job.remote, granularity).matched {
            return false;
        }
    }
    if let Some(range) = &criteria.salary {
        match &job.salary {
            Some(offered) if offered.overlaps(range) => {}
            _ => return false,
        }
    }
    true
}
