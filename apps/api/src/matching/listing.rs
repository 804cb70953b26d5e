//! Paginated match listings: the externally-facing flow in front of the
//! Match Cache.
//!
//! A listing ranks one job against the most recent candidates (or one
//! candidate against the most recent open jobs). Pages are served from the
//! cache when present; freshly computed pages are cached for the listing TTL
//! unless some pair could not be computed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheOperation, MatchCache};
use crate::errors::AppError;
use crate::matching::batch::{BatchCriteria, BatchMatcher, BatchReport};
use crate::models::match_result::MatchResult;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ListingQuery {
    /// 1-based.
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub min_score: f64,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            min_score: 0.0,
        }
    }
}

impl ListingQuery {
    fn validate(&self) -> Result<(), AppError> {
        if self.page == 0 {
            return Err(AppError::Validation("page starts at 1".to_string()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "page_size must be within 1..={MAX_PAGE_SIZE}"
            )));
        }
        if !self.min_score.is_finite() || !(0.0..=1.0).contains(&self.min_score) {
            return Err(AppError::Validation(
                "min_score must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    fn key(&self, base: CacheKey) -> CacheKey {
        base.param("page", self.page)
            .param("page_size", self.page_size)
            .param("min_score", self.min_score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPage {
    pub items: Vec<MatchResult>,
    pub page: u32,
    pub page_size: u32,
    /// Results at or above `min_score` across all pages.
    pub total: usize,
    /// False when some pairs could not be computed; such pages are not cached.
    pub complete: bool,
}

#[derive(Clone)]
pub struct MatchListings {
    batch: BatchMatcher,
    cache: MatchCache,
}

impl MatchListings {
    pub fn new(batch: BatchMatcher, cache: MatchCache) -> Self {
        Self { batch, cache }
    }

    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    pub async fn list_for_job(&self, job_id: Uuid, query: ListingQuery) -> Result<MatchPage, AppError> {
        query.validate()?;
        let key = query.key(CacheKey::new(CacheOperation::JobMatches).param("job", job_id));
        if let Some(page) = self.cache.get::<MatchPage>(&key).await {
            return Ok(page);
        }

        let engine = self.batch.engine();
        engine.load_job(job_id).await?;
        let candidate_ids = engine
            .profiles()
            .list_candidate_ids(self.batch.config().max_candidates)
            .await?;
        let report = self
            .batch
            .batch_match(&candidate_ids, &[job_id], &criteria_for(&query))
            .await?;

        self.finish(&key, report, query).await
    }

    pub async fn list_for_candidate(
        &self,
        candidate_id: Uuid,
        query: ListingQuery,
    ) -> Result<MatchPage, AppError> {
        query.validate()?;
        let key = query.key(
            CacheKey::new(CacheOperation::CandidateMatches).param("candidate", candidate_id),
        );
        if let Some(page) = self.cache.get::<MatchPage>(&key).await {
            return Ok(page);
        }

        let engine = self.batch.engine();
        engine.load_candidate(candidate_id).await?;
        let job_ids = engine
            .profiles()
            .list_job_ids(self.batch.config().max_jobs)
            .await?;
        let report = self
            .batch
            .batch_match(&[candidate_id], &job_ids, &criteria_for(&query))
            .await?;

        self.finish(&key, report, query).await
    }

    async fn finish(
        &self,
        key: &CacheKey,
        report: BatchReport,
        query: ListingQuery,
    ) -> Result<MatchPage, AppError> {
        let complete = report.not_computed.is_empty();
        let total = report.results.len();
        let skip = (query.page as usize - 1) * query.page_size as usize;
        let page = MatchPage {
            items: report
                .results
                .into_iter()
                .skip(skip)
                .take(query.page_size as usize)
                .collect(),
            page: query.page,
            page_size: query.page_size,
            total,
            complete,
        };

        if complete {
            self.cache.set(key, &page, self.cache.listing_ttl()).await;
        } else {
            debug!("Not caching incomplete listing {}", key.render());
        }
        Ok(page)
    }

    /// Re-embeds the candidate's profile and drops listings it may appear in.
    pub async fn refresh_candidate(&self, candidate_id: Uuid) -> Result<u64, AppError> {
        self.batch.engine().index_candidate(candidate_id).await?;
        let removed = self.cache.invalidate_candidate(candidate_id).await;
        info!("Refreshed candidate {candidate_id}, {removed} cached listings dropped");
        Ok(removed)
    }

    /// Re-embeds the job's profile and drops listings it may appear in.
    pub async fn refresh_job(&self, job_id: Uuid) -> Result<u64, AppError> {
        self.batch.engine().index_job(job_id).await?;
        let removed = self.cache.invalidate_job(job_id).await;
        info!("Refreshed job {job_id}, {removed} cached listings dropped");
        Ok(removed)
    }
}

fn criteria_for(query: &ListingQuery) -> BatchCriteria {
    BatchCriteria {
        min_score: (query.min_score > 0.0).then_some(query.min_score),
        ..BatchCriteria::default()
    }
}
