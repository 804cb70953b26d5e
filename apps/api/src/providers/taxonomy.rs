//! Skill taxonomy access: canonical names, aliases, prefix search.
//!
//! Alias collisions across skills are rejected on insert: an alias text maps to
//! exactly one skill, the one it was first registered for.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::skill::{Skill, SkillAlias};
use crate::providers::ProviderError;

/// Outcome of registering an alias.
#[derive(Debug, Clone, PartialEq)]
pub enum AliasInsert {
    Inserted(SkillAlias),
    /// The same alias was already registered for the same skill.
    Existing(SkillAlias),
    /// The alias text already belongs to a different skill.
    Conflict { existing: Skill },
}

#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Case-insensitive canonical-name lookup.
    async fn lookup_exact(&self, name: &str) -> Result<Option<Skill>, ProviderError>;

    /// Case-insensitive alias lookup, returning the owning skill and alias row.
    async fn lookup_alias(&self, alias: &str)
        -> Result<Option<(Skill, SkillAlias)>, ProviderError>;

    async fn get_skill(&self, id: Uuid) -> Result<Option<Skill>, ProviderError>;

    /// Distinct canonical names whose name, or one of whose aliases, starts
    /// with `prefix` (case-insensitive). Deduplicated before `limit` applies.
    async fn prefix_search(&self, prefix: &str, limit: usize)
        -> Result<Vec<String>, ProviderError>;

    /// Idempotent insert keyed by case-insensitive name. When the name exists
    /// the stored skill (first writer's id and category) is returned.
    async fn upsert_skill(&self, name: &str, category: &str) -> Result<Skill, ProviderError>;

    async fn add_alias(
        &self,
        skill_id: Uuid,
        alias: &str,
        confidence: Option<f64>,
    ) -> Result<AliasInsert, ProviderError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PgTaxonomyStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgTaxonomyStore {
    pool: PgPool,
}

impl PgTaxonomyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AliasJoinRow {
    id: Uuid,
    name: String,
    category: String,
    alias: String,
    confidence: Option<f64>,
}

impl AliasJoinRow {
    fn split(self) -> (Skill, SkillAlias) {
        (
            Skill {
                id: self.id,
                name: self.name,
                category: self.category,
            },
            SkillAlias {
                alias: self.alias,
                skill_id: self.id,
                confidence: self.confidence,
            },
        )
    }
}

#[async_trait]
impl TaxonomyStore for PgTaxonomyStore {
    async fn lookup_exact(&self, name: &str) -> Result<Option<Skill>, ProviderError> {
        Ok(sqlx::query_as::<_, Skill>(
            "SELECT id, name, category FROM skills WHERE lower(name) = lower($1)",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn lookup_alias(
        &self,
        alias: &str,
    ) -> Result<Option<(Skill, SkillAlias)>, ProviderError> {
        let row = sqlx::query_as::<_, AliasJoinRow>(
            r#"
            SELECT s.id, s.name, s.category, a.alias, a.confidence
            FROM skill_aliases a
            JOIN skills s ON s.id = a.skill_id
            WHERE lower(a.alias) = lower($1)
            ORDER BY a.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(alias.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(AliasJoinRow::split))
    }

    async fn get_skill(&self, id: Uuid) -> Result<Option<Skill>, ProviderError> {
        Ok(
            sqlx::query_as::<_, Skill>("SELECT id, name, category FROM skills WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn prefix_search(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT name FROM (
                SELECT s.name FROM skills s
                WHERE lower(s.name) LIKE $1 ESCAPE '\'
                UNION
                SELECT s.name FROM skill_aliases a
                JOIN skills s ON s.id = a.skill_id
                WHERE lower(a.alias) LIKE $1 ESCAPE '\'
            ) matches
            ORDER BY length(name), name
            LIMIT $2
            "#,
        )
        .bind(like_prefix_pattern(prefix))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_skill(&self, name: &str, category: &str) -> Result<Skill, ProviderError> {
        let name = name.trim();
        sqlx::query(
            r#"
            INSERT INTO skills (id, name, category)
            VALUES ($1, $2, $3)
            ON CONFLICT ((lower(name))) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(category)
        .execute(&self.pool)
        .await?;

        // First writer wins: read back whichever row owns the name.
        Ok(sqlx::query_as::<_, Skill>(
            "SELECT id, name, category FROM skills WHERE lower(name) = lower($1)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn add_alias(
        &self,
        skill_id: Uuid,
        alias: &str,
        confidence: Option<f64>,
    ) -> Result<AliasInsert, ProviderError> {
        let alias = alias.trim();
        sqlx::query(
            r#"
            INSERT INTO skill_aliases (skill_id, alias, confidence)
            VALUES ($1, $2, $3)
            ON CONFLICT ((lower(alias))) DO NOTHING
            "#,
        )
        .bind(skill_id)
        .bind(alias)
        .bind(confidence)
        .execute(&self.pool)
        .await?;

        let (owner, row) = self.lookup_alias(alias).await?.ok_or_else(|| {
            ProviderError::Unavailable(format!("alias '{alias}' vanished after insert"))
        })?;

        Ok(classify_alias_insert(skill_id, owner, row, confidence))
    }
}

/// Decides whether the stored alias row is the one just written, a repeat, or
/// a conflict with another skill.
fn classify_alias_insert(
    requested_skill: Uuid,
    owner: Skill,
    row: SkillAlias,
    requested_confidence: Option<f64>,
) -> AliasInsert {
    if owner.id != requested_skill {
        AliasInsert::Conflict { existing: owner }
    } else if row.confidence == requested_confidence {
        AliasInsert::Inserted(row)
    } else {
        AliasInsert::Existing(row)
    }
}

/// Builds a `LIKE` pattern matching values that start with `prefix`,
/// escaping the wildcard characters. Lowercased for case-insensitive search.
pub fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
