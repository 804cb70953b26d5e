//! Skill Normalizer: resolves free-text skill strings against the taxonomy.
//!
//! Resolution runs the configured strategy chain (exact → alias → semantic by
//! default). Full-chain results are cached by folded input: matches for
//! `positive_ttl`, misses for the shorter `negative_ttl`. Results produced
//! while a collaborator was unavailable are never cached.

pub mod handlers;
pub mod strategies;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheOperation, MatchCache};
use crate::errors::AppError;
use crate::models::fold_key;
use crate::models::skill::{AliasInput, NormalizedSkill, Skill, SkillAlias, OTHER_CATEGORY};
use crate::providers::vector_index::SKILL_LABEL;
use crate::providers::{
    AliasInsert, EmbeddingProvider, LimitedEmbedder, OwnerType, TaxonomyStore, VectorIndex,
};

use strategies::{Resolution, ResolutionStrategy, Resolver, DEFAULT_CHAIN};

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub strategies: Vec<ResolutionStrategy>,
    pub semantic_threshold: f64,
    pub max_alternatives: usize,
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
    /// In-flight resolutions for `normalize_many`.
    pub concurrency: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strategies: DEFAULT_CHAIN.to_vec(),
            semantic_threshold: 0.7,
            max_alternatives: 2,
            positive_ttl: Duration::from_secs(3600),
            negative_ttl: Duration::from_secs(300),
            concurrency: 6,
        }
    }
}

/// One normalized input plus whether any strategy was degraded on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationOutcome {
    pub raw: String,
    pub skill: NormalizedSkill,
    /// Reason of the first collaborator failure, if one occurred.
    pub degraded: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredSkill {
    pub skill: Skill,
    pub aliases: Vec<SkillAlias>,
    /// False when the name embedding could not be stored.
    pub indexed: bool,
}

#[derive(Clone)]
pub struct SkillNormalizer {
    taxonomy: Arc<dyn TaxonomyStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorIndex>,
    cache: MatchCache,
    config: NormalizerConfig,
}

impl SkillNormalizer {
    pub fn new(
        taxonomy: Arc<dyn TaxonomyStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorIndex>,
        cache: MatchCache,
        config: NormalizerConfig,
    ) -> Self {
        info!(
            "Skill normalizer ready (strategies: {:?}, semantic threshold: {}, embedder: {})",
            config.strategies,
            config.semantic_threshold,
            embedder.name()
        );
        // One permit pool for every embedding call made through this normalizer
        // or the services built on it
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(LimitedEmbedder::new(embedder, config.concurrency));
        Self {
            taxonomy,
            embedder,
            vectors,
            cache,
            config,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn vectors(&self) -> &Arc<dyn VectorIndex> {
        &self.vectors
    }

    pub fn taxonomy(&self) -> &Arc<dyn TaxonomyStore> {
        &self.taxonomy
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            taxonomy: self.taxonomy.as_ref(),
            embedder: self.embedder.as_ref(),
            vectors: self.vectors.as_ref(),
            semantic_threshold: self.config.semantic_threshold,
            max_alternatives: self.config.max_alternatives,
        }
    }

    fn cache_key(folded: &str) -> CacheKey {
        CacheKey::new(CacheOperation::SkillNormalization).param("input", folded)
    }

    /// `normalize(raw) -> {normalized, category, confidence, alternatives}`.
    /// Never fails: collaborator failures degrade to the remaining strategies.
    pub async fn normalize(&self, raw: &str) -> NormalizedSkill {
        self.normalize_detailed(raw).await.skill
    }

    pub async fn normalize_detailed(&self, raw: &str) -> NormalizationOutcome {
        let folded = fold_key(raw);
        if folded.is_empty() {
            return NormalizationOutcome {
                raw: raw.to_string(),
                skill: NormalizedSkill::unmatched(raw),
                degraded: None,
            };
        }

        let key = Self::cache_key(&folded);
        if let Some(cached) = self.cache.get::<NormalizedSkill>(&key).await {
            // Misses are shared across spellings; echo this caller's text
            let skill = if cached.is_matched() {
                cached
            } else {
                NormalizedSkill::unmatched(raw)
            };
            return NormalizationOutcome {
                raw: raw.to_string(),
                skill,
                degraded: None,
            };
        }

        let outcome = self.run_chain(raw, &self.config.strategies).await;
        if outcome.degraded.is_none() {
            let ttl = if outcome.skill.is_matched() {
                self.config.positive_ttl
            } else {
                self.config.negative_ttl
            };
            self.cache.set(&key, &outcome.skill, ttl).await;
        }
        outcome
    }

    /// Runs only the given strategies, bypassing the cache.
    pub async fn resolve_with(
        &self,
        raw: &str,
        strategies: &[ResolutionStrategy],
    ) -> NormalizationOutcome {
        if fold_key(raw).is_empty() {
            return NormalizationOutcome {
                raw: raw.to_string(),
                skill: NormalizedSkill::unmatched(raw),
                degraded: None,
            };
        }
        self.run_chain(raw, strategies).await
    }

    async fn run_chain(&self, raw: &str, strategies: &[ResolutionStrategy]) -> NormalizationOutcome {
        let resolver = self.resolver();
        let query = raw.trim();
        let mut degraded = None;

        for strategy in strategies {
            match strategy.resolve(&resolver, query).await {
                Resolution::Matched(skill) => {
                    return NormalizationOutcome {
                        raw: raw.to_string(),
                        skill,
                        degraded,
                    };
                }
                Resolution::Unmatched => {}
                Resolution::Unavailable(reason) => {
                    degraded.get_or_insert(reason);
                }
            }
        }

        NormalizationOutcome {
            raw: raw.to_string(),
            skill: NormalizedSkill::unmatched(raw),
            degraded,
        }
    }

    /// Normalizes a list with bounded concurrency. Inputs that fold to the same
    /// text are resolved once; output follows first-occurrence order.
    pub async fn normalize_many(&self, raws: &[String]) -> Vec<NormalizationOutcome> {
        stream::iter(distinct_inputs(raws))
            .map(|raw| {
                let normalizer = self.clone();
                async move { normalizer.normalize_detailed(&raw).await }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// [`normalize_many`] restricted to `strategies`, bypassing the cache.
    ///
    /// [`normalize_many`]: SkillNormalizer::normalize_many
    pub async fn resolve_many_with(
        &self,
        raws: &[String],
        strategies: &[ResolutionStrategy],
    ) -> Vec<NormalizationOutcome> {
        let strategies = strategies.to_vec();
        stream::iter(distinct_inputs(raws))
            .map(|raw| {
                let normalizer = self.clone();
                let strategies = strategies.clone();
                async move { normalizer.resolve_with(&raw, &strategies).await }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Canonical names and alias owners starting with `prefix`,
    /// case-insensitive, deduplicated, at most `limit`.
    pub async fn suggest(&self, prefix: &str, limit: usize) -> Result<Vec<String>, AppError> {
        let prefix = prefix.trim();
        if prefix.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let found = self.taxonomy.prefix_search(prefix, limit).await?;

        // Stores dedupe already; spelling variants of one name still fold together
        let mut seen = HashSet::new();
        Ok(found
            .into_iter()
            .filter(|name| seen.insert(fold_key(name)))
            .take(limit)
            .collect())
    }

    /// Idempotently registers a canonical skill with its aliases and name
    /// embedding. Fails with `AliasConflict` before writing anything when an
    /// alias already belongs to another skill.
    pub async fn register_skill(
        &self,
        name: &str,
        category: &str,
        aliases: &[AliasInput],
    ) -> Result<RegisteredSkill, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("skill name cannot be empty".to_string()));
        }
        let category = match category.trim() {
            "" => OTHER_CATEGORY,
            c => c,
        };

        let existing = self.taxonomy.lookup_exact(name).await?;
        for input in aliases {
            if let Some((owner, _)) = self.taxonomy.lookup_alias(&input.alias).await? {
                let same_owner = match &existing {
                    Some(skill) => skill.id == owner.id,
                    None => false,
                };
                if !same_owner {
                    return Err(AppError::AliasConflict {
                        alias: input.alias.clone(),
                        existing_skill: owner.name,
                    });
                }
            }
        }

        let skill = self.taxonomy.upsert_skill(name, category).await?;

        let mut stored = Vec::with_capacity(aliases.len());
        for input in aliases {
            if fold_key(&input.alias).is_empty() {
                continue;
            }
            match self
                .taxonomy
                .add_alias(skill.id, input.alias.trim(), input.confidence)
                .await?
            {
                AliasInsert::Inserted(alias) | AliasInsert::Existing(alias) => stored.push(alias),
                AliasInsert::Conflict { existing } => {
                    return Err(AppError::AliasConflict {
                        alias: input.alias.clone(),
                        existing_skill: existing.name,
                    });
                }
            }
        }

        let indexed = self.index_skill(&skill).await;
        self.invalidate_resolutions().await;

        info!(
            "Registered skill {} ({}) with {} aliases",
            skill.name,
            skill.category,
            stored.len()
        );
        Ok(RegisteredSkill {
            skill,
            aliases: stored,
            indexed,
        })
    }

    /// Returns the canonical skill for `raw`, creating an "Other" placeholder
    /// when nothing in the taxonomy matches. Concurrent creators converge on
    /// the first writer's row.
    pub async fn ensure_skill(&self, raw: &str) -> Result<Skill, AppError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(AppError::Validation("skill name cannot be empty".to_string()));
        }

        let outcome = self.normalize_detailed(name).await;
        if let Some(id) = outcome.skill.skill_id {
            if let Some(skill) = self.taxonomy.get_skill(id).await? {
                return Ok(skill);
            }
        }

        let skill = self.taxonomy.upsert_skill(name, OTHER_CATEGORY).await?;
        self.index_skill(&skill).await;
        self.invalidate_resolutions().await;
        info!("Created placeholder skill {} ({})", skill.name, skill.id);
        Ok(skill)
    }

    /// Stores the name embedding of `skill`. Failures are logged, not raised.
    async fn index_skill(&self, skill: &Skill) -> bool {
        let vector = match self.embedder.embed(&skill.name).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Could not embed skill {}: {e}", skill.name);
                return false;
            }
        };
        match self
            .vectors
            .upsert(OwnerType::Skill, skill.id, SKILL_LABEL, &vector)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not index skill {}: {e}", skill.name);
                false
            }
        }
    }

    /// Any taxonomy change may turn a cached miss into a hit.
    async fn invalidate_resolutions(&self) {
        let prefix = CacheKey::new(CacheOperation::SkillNormalization).prefix();
        let removed = self.cache.invalidate_prefix(&prefix).await;
        debug!("Dropped {removed} cached skill resolutions");
    }
}

fn distinct_inputs(raws: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raws.iter()
        .filter(|raw| {
            let folded = fold_key(raw);
            !folded.is_empty() && seen.insert(folded)
        })
        .cloned()
        .collect()
}
