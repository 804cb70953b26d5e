//! Resolution strategies, tried in order until one matches.
//!
//! Each strategy is independently callable and returns a tagged
//! [`Resolution`]; the chain itself is plain data (`Vec<ResolutionStrategy>`).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::skill::{NormalizedSkill, ResolutionMethod, SkillAlternative};
use crate::providers::{EmbeddingProvider, OwnerType, TaxonomyStore, VectorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Case-insensitive canonical name, confidence 1.0.
    Exact,
    /// Case-insensitive alias, confidence from the alias row (default 0.95).
    Alias,
    /// Nearest skill embedding above the semantic threshold.
    Semantic,
}

/// Full chain in resolution order.
pub const DEFAULT_CHAIN: [ResolutionStrategy; 3] = [
    ResolutionStrategy::Exact,
    ResolutionStrategy::Alias,
    ResolutionStrategy::Semantic,
];

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched(NormalizedSkill),
    Unmatched,
    /// A collaborator failed; the next strategy still runs.
    Unavailable(String),
}

/// Borrowed collaborators and tuning shared by every strategy.
pub struct Resolver<'a> {
    pub taxonomy: &'a dyn TaxonomyStore,
    pub embedder: &'a dyn EmbeddingProvider,
    pub vectors: &'a dyn VectorIndex,
    pub semantic_threshold: f64,
    pub max_alternatives: usize,
}

impl ResolutionStrategy {
    pub async fn resolve(&self, resolver: &Resolver<'_>, raw: &str) -> Resolution {
        let resolution = match self {
            ResolutionStrategy::Exact => resolve_exact(resolver.taxonomy, raw).await,
            ResolutionStrategy::Alias => resolve_alias(resolver.taxonomy, raw).await,
            ResolutionStrategy::Semantic => resolve_semantic(resolver, raw).await,
        };
        debug!("{:?} strategy for {:?}: {}", self, raw, outcome_label(&resolution));
        resolution
    }
}

fn outcome_label(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::Matched(_) => "matched",
        Resolution::Unmatched => "unmatched",
        Resolution::Unavailable(_) => "unavailable",
    }
}

pub async fn resolve_exact(taxonomy: &dyn TaxonomyStore, raw: &str) -> Resolution {
    match taxonomy.lookup_exact(raw).await {
        Ok(Some(skill)) => Resolution::Matched(NormalizedSkill::from_skill(
            &skill,
            1.0,
            ResolutionMethod::Exact,
        )),
        Ok(None) => Resolution::Unmatched,
        Err(e) => {
            warn!("Taxonomy exact lookup failed for {raw:?}: {e}");
            Resolution::Unavailable(e.to_string())
        }
    }
}

pub async fn resolve_alias(taxonomy: &dyn TaxonomyStore, raw: &str) -> Resolution {
    match taxonomy.lookup_alias(raw).await {
        Ok(Some((skill, alias))) => Resolution::Matched(NormalizedSkill::from_skill(
            &skill,
            alias.effective_confidence(),
            ResolutionMethod::Alias,
        )),
        Ok(None) => Resolution::Unmatched,
        Err(e) => {
            warn!("Taxonomy alias lookup failed for {raw:?}: {e}");
            Resolution::Unavailable(e.to_string())
        }
    }
}

/// Embeds `raw`, takes the closest skill above the threshold as the match and
/// up to `max_alternatives` runner-ups as alternatives.
pub async fn resolve_semantic(resolver: &Resolver<'_>, raw: &str) -> Resolution {
    let query = match resolver.embedder.embed(raw).await {
        Ok(v) => v,
        Err(e) => {
            warn!(
                "Embedding via {} failed for {raw:?}, semantic resolution skipped: {e}",
                resolver.embedder.name()
            );
            return Resolution::Unavailable(e.to_string());
        }
    };

    let hits = match resolver
        .vectors
        .nearest(
            OwnerType::Skill,
            &query,
            1 + resolver.max_alternatives,
            resolver.semantic_threshold,
        )
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            warn!("Vector index lookup failed for {raw:?}: {e}");
            return Resolution::Unavailable(e.to_string());
        }
    };

    let mut resolved = Vec::with_capacity(hits.len());
    for hit in hits {
        // Vectors can outlive their taxonomy row; skip orphans
        match resolver.taxonomy.get_skill(hit.owner_id).await {
            Ok(Some(skill)) => resolved.push((skill, hit.similarity)),
            Ok(None) => debug!("Skipping orphan skill vector {}", hit.owner_id),
            Err(e) => {
                warn!("Taxonomy read failed during semantic resolution: {e}");
                return Resolution::Unavailable(e.to_string());
            }
        }
    }

    let mut resolved = resolved.into_iter();
    let Some((best, similarity)) = resolved.next() else {
        return Resolution::Unmatched;
    };

    let mut normalized =
        NormalizedSkill::from_skill(&best, similarity.clamp(0.0, 1.0), ResolutionMethod::Semantic);
    normalized.alternatives = resolved
        .take(resolver.max_alternatives)
        .map(|(skill, similarity)| SkillAlternative {
            name: skill.name,
            category: skill.category,
            similarity,
        })
        .collect();
    Resolution::Matched(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::{InMemoryTaxonomy, InMemoryVectorIndex};
    use crate::providers::vector_index::SKILL_LABEL;
    use crate::providers::HashEmbeddingProvider;

    #[tokio::test]
    async fn test_exact_is_case_insensitive() {
        let taxonomy = InMemoryTaxonomy::new();
        taxonomy.upsert_skill("PostgreSQL", "Database").await.unwrap();
        match resolve_exact(&taxonomy, "postgresql").await {
            Resolution::Matched(skill) => {
                assert_eq!(skill.normalized, "PostgreSQL");
                assert_eq!(skill.confidence, 1.0);
                assert_eq!(skill.method, ResolutionMethod::Exact);
            }
            other => panic!("expected match, got {other:?}"),
        }
        assert_eq!(resolve_exact(&taxonomy, "postgres").await, Resolution::Unmatched);
    }

    #[tokio::test]
    async fn test_alias_uses_stored_confidence() {
        let taxonomy = InMemoryTaxonomy::new();
        let pg = taxonomy.upsert_skill("PostgreSQL", "Database").await.unwrap();
        taxonomy.add_alias(pg.id, "Postgres", Some(0.9)).await.unwrap();
        taxonomy.add_alias(pg.id, "pg", None).await.unwrap();

        let Resolution::Matched(skill) = resolve_alias(&taxonomy, "POSTGRES").await else {
            panic!("expected alias match");
        };
        assert_eq!(skill.normalized, "PostgreSQL");
        assert!((skill.confidence - 0.9).abs() < 1e-12);

        let Resolution::Matched(skill) = resolve_alias(&taxonomy, "pg").await else {
            panic!("expected alias match");
        };
        assert!((skill.confidence - 0.95).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_semantic_returns_best_and_alternatives() {
        let taxonomy = InMemoryTaxonomy::new();
        let vectors = InMemoryVectorIndex::new();
        let embedder = HashEmbeddingProvider::new(2).with_vector("k8s orchestration", vec![1.0, 0.0]);

        let entries = [
            ("Kubernetes", vec![0.95_f32, 0.312]),
            ("Docker", vec![0.8, 0.6]),
            ("Nomad", vec![0.75, 0.661]),
            ("Excel", vec![0.0, 1.0]),
        ];
        for (name, vector) in entries {
            let skill = taxonomy.upsert_skill(name, "DevOps").await.unwrap();
            vectors
                .upsert(OwnerType::Skill, skill.id, SKILL_LABEL, &vector)
                .await
                .unwrap();
        }

        let resolver = Resolver {
            taxonomy: &taxonomy,
            embedder: &embedder,
            vectors: &vectors,
            semantic_threshold: 0.7,
            max_alternatives: 1,
        };
        let Resolution::Matched(skill) = resolve_semantic(&resolver, "k8s orchestration").await
        else {
            panic!("expected semantic match");
        };
        assert_eq!(skill.normalized, "Kubernetes");
        assert_eq!(skill.method, ResolutionMethod::Semantic);
        assert!((skill.confidence - 0.95).abs() < 1e-3);
        assert_eq!(skill.alternatives.len(), 1);
        assert_eq!(skill.alternatives[0].name, "Docker");
    }

    #[tokio::test]
    async fn test_semantic_below_threshold_is_unmatched() {
        let taxonomy = InMemoryTaxonomy::new();
        let vectors = InMemoryVectorIndex::new();
        let embedder = HashEmbeddingProvider::new(2).with_vector("knitting", vec![0.0, 1.0]);
        let skill = taxonomy.upsert_skill("Rust", "Language").await.unwrap();
        vectors
            .upsert(OwnerType::Skill, skill.id, SKILL_LABEL, &[1.0, 0.0])
            .await
            .unwrap();

        let resolver = Resolver {
            taxonomy: &taxonomy,
            embedder: &embedder,
            vectors: &vectors,
            semantic_threshold: 0.7,
            max_alternatives: 2,
        };
        assert_eq!(
            resolve_semantic(&resolver, "knitting").await,
            Resolution::Unmatched
        );
    }
}
