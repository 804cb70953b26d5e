//! Axum route handlers for the Skills API.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::skill::AliasInput;
use crate::normalizer::{NormalizationOutcome, RegisteredSkill};
use crate::state::AppState;

const MAX_SKILLS_PER_REQUEST: usize = 200;
const DEFAULT_SUGGEST_LIMIT: usize = 10;
const MAX_SUGGEST_LIMIT: usize = 50;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    pub skills: Vec<String>,
    /// Create "Other" placeholders for skills nothing in the taxonomy matches.
    #[serde(default)]
    pub create_missing: bool,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub results: Vec<NormalizationOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    pub prefix: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSkillRequest {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub aliases: Vec<AliasInput>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/skills/normalize
///
/// Normalizes a list of raw skill strings. Each result says whether a
/// collaborator was unavailable while resolving it.
pub async fn handle_normalize(
    State(state): State<AppState>,
    Json(request): Json<NormalizeRequest>,
) -> Result<Json<NormalizeResponse>, AppError> {
    if request.skills.is_empty() {
        return Err(AppError::Validation("skills cannot be empty".to_string()));
    }
    if request.skills.len() > MAX_SKILLS_PER_REQUEST {
        return Err(AppError::Validation(format!(
            "at most {MAX_SKILLS_PER_REQUEST} skills per request"
        )));
    }

    let normalizer = &state.normalizer;
    let mut results = normalizer.normalize_many(&request.skills).await;

    if request.create_missing {
        for outcome in results.iter_mut() {
            if outcome.skill.is_matched() {
                continue;
            }
            normalizer.ensure_skill(&outcome.raw).await?;
            *outcome = normalizer.normalize_detailed(&outcome.raw).await;
        }
    }

    Ok(Json(NormalizeResponse { results }))
}

/// GET /api/v1/skills/suggest?prefix=re&limit=10
pub async fn handle_suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestQuery>,
) -> Result<Json<SuggestResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SUGGEST_LIMIT)
        .min(MAX_SUGGEST_LIMIT);
    let suggestions = state.normalizer.suggest(&params.prefix, limit).await?;
    Ok(Json(SuggestResponse { suggestions }))
}

/// POST /api/v1/skills
///
/// Registers (or re-registers) a canonical skill with aliases. 409 when an
/// alias already belongs to another skill.
pub async fn handle_register_skill(
    State(state): State<AppState>,
    Json(request): Json<RegisterSkillRequest>,
) -> Result<(StatusCode, Json<RegisteredSkill>), AppError> {
    let registered = state
        .normalizer
        .register_skill(&request.name, &request.category, &request.aliases)
        .await?;
    Ok((StatusCode::CREATED, Json(registered)))
}
