use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::providers::ProviderError;

/// Label of the per-skill name embedding.
pub const SKILL_LABEL: &str = "skill_name";
/// Label of a candidate's validated skill-list embedding.
pub const CANDIDATE_SKILLS_LABEL: &str = "validated_skills";
/// Label of a job's full requirement embedding.
pub const JOB_SKILLS_LABEL: &str = "job_full";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Candidate,
    Job,
    Skill,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Candidate => "candidate",
            OwnerType::Job => "job",
            OwnerType::Skill => "skill",
        }
    }
}

/// A nearest-neighbour hit: owner id and cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub owner_id: Uuid,
    pub similarity: f64,
}

/// Vectors keyed by `(owner_type, owner_id, label)`, one per key.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces the vector for the key.
    async fn upsert(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        label: &str,
        vector: &[f32],
    ) -> Result<(), ProviderError>;

    async fn get(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        label: &str,
    ) -> Result<Option<Vec<f32>>, ProviderError>;

    /// Up to `k` owners of `owner_type` with similarity ≥ `min_similarity`,
    /// most similar first.
    async fn nearest(
        &self,
        owner_type: OwnerType,
        query: &[f32],
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<VectorHit>, ProviderError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PgVectorIndex: pgvector-backed
// ────────────────────────────────────────────────────────────────────────────

/// Stores vectors in a pgvector `embeddings` table. Vectors travel as text
/// literals cast with `::vector`, so no pgvector client crate is needed.
#[derive(Clone)]
pub struct PgVectorIndex {
    pool: PgPool,
}

impl PgVectorIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        label: &str,
        vector: &[f32],
    ) -> Result<(), ProviderError> {
        sqlx::query(
            r#"
            INSERT INTO embeddings (owner_type, owner_id, label, embedding)
            VALUES ($1, $2, $3, $4::vector)
            ON CONFLICT (owner_type, owner_id, label)
            DO UPDATE SET embedding = EXCLUDED.embedding, updated_at = now()
            "#,
        )
        .bind(owner_type.as_str())
        .bind(owner_id)
        .bind(label)
        .bind(to_vector_literal(vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        label: &str,
    ) -> Result<Option<Vec<f32>>, ProviderError> {
        let literal: Option<String> = sqlx::query_scalar(
            r#"
            SELECT embedding::text
            FROM embeddings
            WHERE owner_type = $1 AND owner_id = $2 AND label = $3
            "#,
        )
        .bind(owner_type.as_str())
        .bind(owner_id)
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;

        literal.as_deref().map(parse_vector_literal).transpose()
    }

    async fn nearest(
        &self,
        owner_type: OwnerType,
        query: &[f32],
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<VectorHit>, ProviderError> {
        let rows: Vec<(Uuid, f64)> = sqlx::query_as(
            r#"
            SELECT owner_id, 1 - (embedding <=> $2::vector) AS similarity
            FROM embeddings
            WHERE owner_type = $1
              AND 1 - (embedding <=> $2::vector) >= $3
            ORDER BY embedding <=> $2::vector
            LIMIT $4
            "#,
        )
        .bind(owner_type.as_str())
        .bind(to_vector_literal(query))
        .bind(min_similarity)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(owner_id, similarity)| VectorHit {
                owner_id,
                similarity: similarity.clamp(0.0, 1.0),
            })
            .collect())
    }
}

/// Renders a vector in pgvector's text form: `[0.1,0.2,0.3]`.
pub fn to_vector_literal(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Parses pgvector's text form back into a vector.
pub fn parse_vector_literal(literal: &str) -> Result<Vec<f32>, ProviderError> {
    let inner = literal
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ProviderError::MalformedVector(literal.to_string()))?;

    if inner.trim().is_empty() {
        return Err(ProviderError::EmptyEmbedding);
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| ProviderError::MalformedVector(literal.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal_format() {
        assert_eq!(to_vector_literal(&[1.0, -0.5, 0.25]), "[1,-0.5,0.25]");
    }

    #[test]
    fn test_parse_vector_literal() {
        let v = parse_vector_literal("[0.1, 0.2,0.3]").unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_parse_vector_literal_rejects_garbage() {
        assert!(matches!(
            parse_vector_literal("0.1,0.2"),
            Err(ProviderError::MalformedVector(_))
        ));
        assert!(matches!(
            parse_vector_literal("[0.1,abc]"),
            Err(ProviderError::MalformedVector(_))
        ));
        assert!(matches!(
            parse_vector_literal("[]"),
            Err(ProviderError::EmptyEmbedding)
        ));
    }

    #[test]
    fn test_owner_type_labels() {
        assert_eq!(OwnerType::Candidate.as_str(), "candidate");
        assert_eq!(OwnerType::Job.as_str(), "job");
        assert_eq!(OwnerType::Skill.as_str(), "skill");
    }
}
