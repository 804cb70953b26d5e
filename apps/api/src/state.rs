use crate::matching::{BatchMatcher, MatchListings, MatchingEngine};
use crate::normalizer::SkillNormalizer;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every service holds its collaborators as `Arc<dyn _>`, so clones are cheap.
#[derive(Clone)]
pub struct AppState {
    pub normalizer: SkillNormalizer,
    pub engine: MatchingEngine,
    pub batch: BatchMatcher,
    /// Cached per-job / per-candidate listings built on top of `batch`.
    pub listings: MatchListings,
}
