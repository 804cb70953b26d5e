//! Axum route handlers for the Matching API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::batch::{BatchCriteria, BatchReport};
use crate::matching::listing::{ListingQuery, MatchPage};
use crate::matching::weights::MatchWeights;
use crate::models::match_result::{MatchResult, SkillMatchReport};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PairMatchRequest {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    #[serde(default)]
    pub weights: Option<MatchWeights>,
}

#[derive(Debug, Deserialize)]
pub struct SkillMatchRequest {
    pub candidate_skills: Vec<String>,
    pub job_skills: Vec<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BatchMatchRequest {
    pub candidate_ids: Vec<Uuid>,
    pub job_ids: Vec<Uuid>,
    #[serde(default)]
    pub criteria: BatchCriteria,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub id: Uuid,
    pub invalidated_listings: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/matches/pair
///
/// Scores one candidate against one job. 404 only for unknown ids; provider
/// trouble shows up as `breakdown.semantic` instead of an error.
pub async fn handle_match_pair(
    State(state): State<AppState>,
    Json(request): Json<PairMatchRequest>,
) -> Result<Json<MatchResult>, AppError> {
    let result = state
        .engine
        .match_candidate_to_job(request.candidate_id, request.job_id, request.weights)
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/matches/skills
///
/// Skill-only comparison of two free-text lists; no stored records needed.
pub async fn handle_match_skills(
    State(state): State<AppState>,
    Json(request): Json<SkillMatchRequest>,
) -> Result<Json<SkillMatchReport>, AppError> {
    let report = state
        .engine
        .match_by_skills(&request.candidate_skills, &request.job_skills, request.threshold)
        .await?;
    Ok(Json(report))
}

/// POST /api/v1/matches/batch
pub async fn handle_match_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchMatchRequest>,
) -> Result<Json<BatchReport>, AppError> {
    if request.candidate_ids.is_empty() || request.job_ids.is_empty() {
        return Err(AppError::Validation(
            "candidate_ids and job_ids cannot be empty".to_string(),
        ));
    }
    let report = state
        .batch
        .batch_match(&request.candidate_ids, &request.job_ids, &request.criteria)
        .await?;
    Ok(Json(report))
}

/// GET /api/v1/jobs/:id/matches?page=1&page_size=20&min_score=0.5
pub async fn handle_job_matches(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<MatchPage>, AppError> {
    Ok(Json(state.listings.list_for_job(job_id, query).await?))
}

/// GET /api/v1/candidates/:id/matches?page=1&page_size=20&min_score=0.5
pub async fn handle_candidate_matches(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<MatchPage>, AppError> {
    Ok(Json(
        state.listings.list_for_candidate(candidate_id, query).await?,
    ))
}

/// POST /api/v1/candidates/:id/refresh
///
/// Called by the record owner after a candidate changes.
pub async fn handle_refresh_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> Result<Json<RefreshResponse>, AppError> {
    let invalidated_listings = state.listings.refresh_candidate(candidate_id).await?;
    Ok(Json(RefreshResponse {
        id: candidate_id,
        invalidated_listings,
    }))
}

/// POST /api/v1/jobs/:id/refresh
pub async fn handle_refresh_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<RefreshResponse>, AppError> {
    let invalidated_listings = state.listings.refresh_job(job_id).await?;
    Ok(Json(RefreshResponse {
        id: job_id,
        invalidated_listings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, candidate, job};

    #[tokio::test]
    async fn test_pair_handler_returns_result() {
        let fixture = test_support::fixture().await;
        let c = fixture.add_candidate(candidate(&["Rust"])).await;
        let j = fixture.add_job(job(&["Rust"])).await;
        let Json(result) = handle_match_pair(
            State(fixture.state()),
            Json(PairMatchRequest {
                candidate_id: c,
                job_id: j,
                weights: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(result.sub_scores.skills, 1.0);
    }

    #[tokio::test]
    async fn test_batch_handler_requires_ids() {
        let fixture = test_support::fixture().await;
        let result = handle_match_batch(
            State(fixture.state()),
            Json(BatchMatchRequest {
                candidate_ids: vec![],
                job_ids: vec![Uuid::new_v4()],
                criteria: BatchCriteria::default(),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_refresh_unknown_job_is_not_found() {
        let fixture = test_support::fixture().await;
        let result = handle_refresh_job(State(fixture.state()), Path(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_batch_request_criteria_are_optional() {
        let request: BatchMatchRequest = serde_json::from_str(
            r#"{"candidate_ids": [], "job_ids": []}"#,
        )
        .unwrap();
        assert_eq!(request.criteria, BatchCriteria::default());
    }
}
