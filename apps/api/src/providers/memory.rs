//! In-memory adapters for every collaborator trait. Used for offline runs and as
//! injected fakes in tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::similarity::clamped_similarity;
use crate::models::fold_key;
use crate::models::profile::{CandidateProfile, JobProfile};
use crate::models::skill::{Skill, SkillAlias};
use crate::providers::profiles::ProfileStore;
use crate::providers::taxonomy::{AliasInsert, TaxonomyStore};
use crate::providers::vector_index::{OwnerType, VectorHit, VectorIndex};
use crate::providers::ProviderError;

// ────────────────────────────────────────────────────────────────────────────
// Taxonomy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TaxonomyTables {
    skills: Vec<Skill>,
    aliases: Vec<SkillAlias>,
}

impl TaxonomyTables {
    fn skill_by_id(&self, id: Uuid) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == id)
    }
}

#[derive(Default)]
pub struct InMemoryTaxonomy {
    tables: RwLock<TaxonomyTables>,
}

impl InMemoryTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaxonomyStore for InMemoryTaxonomy {
    async fn lookup_exact(&self, name: &str) -> Result<Option<Skill>, ProviderError> {
        let key = fold_key(name);
        let tables = self.tables.read().await;
        Ok(tables
            .skills
            .iter()
            .find(|s| fold_key(&s.name) == key)
            .cloned())
    }

    async fn lookup_alias(
        &self,
        alias: &str,
    ) -> Result<Option<(Skill, SkillAlias)>, ProviderError> {
        let key = fold_key(alias);
        let tables = self.tables.read().await;
        Ok(tables
            .aliases
            .iter()
            .find(|a| fold_key(&a.alias) == key)
            .and_then(|a| tables.skill_by_id(a.skill_id).map(|s| (s.clone(), a.clone()))))
    }

    async fn get_skill(&self, id: Uuid) -> Result<Option<Skill>, ProviderError> {
        Ok(self.tables.read().await.skill_by_id(id).cloned())
    }

    async fn prefix_search(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let prefix = fold_key(prefix);
        let tables = self.tables.read().await;

        let mut names: Vec<String> = tables
            .skills
            .iter()
            .filter(|s| fold_key(&s.name).starts_with(&prefix))
            .map(|s| s.name.clone())
            .collect();
        names.extend(
            tables
                .aliases
                .iter()
                .filter(|a| fold_key(&a.alias).starts_with(&prefix))
                .filter_map(|a| tables.skill_by_id(a.skill_id))
                .map(|s| s.name.clone()),
        );

        let mut seen = HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        names.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        names.truncate(limit);
        Ok(names)
    }

    async fn upsert_skill(&self, name: &str, category: &str) -> Result<Skill, ProviderError> {
        let key = fold_key(name);
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.skills.iter().find(|s| fold_key(&s.name) == key) {
            return Ok(existing.clone());
        }
        let skill = Skill {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            category: category.to_string(),
        };
        tables.skills.push(skill.clone());
        Ok(skill)
    }

    async fn add_alias(
        &self,
        skill_id: Uuid,
        alias: &str,
        confidence: Option<f64>,
    ) -> Result<AliasInsert, ProviderError> {
        let key = fold_key(alias);
        let mut tables = self.tables.write().await;

        if tables.skill_by_id(skill_id).is_none() {
            return Err(ProviderError::Unavailable(format!(
                "skill {skill_id} does not exist"
            )));
        }

        if let Some(existing) = tables.aliases.iter().find(|a| fold_key(&a.alias) == key) {
            if existing.skill_id == skill_id {
                return Ok(AliasInsert::Existing(existing.clone()));
            }
            let owner = tables
                .skill_by_id(existing.skill_id)
                .cloned()
                .ok_or_else(|| ProviderError::Unavailable("alias owner missing".to_string()))?;
            return Ok(AliasInsert::Conflict { existing: owner });
        }

        let row = SkillAlias {
            alias: alias.trim().to_string(),
            skill_id,
            confidence,
        };
        tables.aliases.push(row.clone());
        Ok(AliasInsert::Inserted(row))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Vector index
// ────────────────────────────────────────────────────────────────────────────

type VectorKey = (OwnerType, Uuid, String);

#[derive(Default)]
pub struct InMemoryVectorIndex {
    vectors: RwLock<HashMap<VectorKey, Vec<f32>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.vectors.read().await.len()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        label: &str,
        vector: &[f32],
    ) -> Result<(), ProviderError> {
        if vector.is_empty() {
            return Err(ProviderError::EmptyEmbedding);
        }
        self.vectors
            .write()
            .await
            .insert((owner_type, owner_id, label.to_string()), vector.to_vec());
        Ok(())
    }

    async fn get(
        &self,
        owner_type: OwnerType,
        owner_id: Uuid,
        label: &str,
    ) -> Result<Option<Vec<f32>>, ProviderError> {
        Ok(self
            .vectors
            .read()
            .await
            .get(&(owner_type, owner_id, label.to_string()))
            .cloned())
    }

    async fn nearest(
        &self,
        owner_type: OwnerType,
        query: &[f32],
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<VectorHit>, ProviderError> {
        let vectors = self.vectors.read().await;

        // Best similarity per owner across its labels
        let mut best: HashMap<Uuid, f64> = HashMap::new();
        for ((kind, owner_id, _), vector) in vectors.iter() {
            if *kind != owner_type {
                continue;
            }
            let similarity = clamped_similarity(query, vector);
            let entry = best.entry(*owner_id).or_insert(similarity);
            if similarity > *entry {
                *entry = similarity;
            }
        }

        let mut hits: Vec<VectorHit> = best
            .into_iter()
            .filter(|(_, similarity)| *similarity >= min_similarity)
            .map(|(owner_id, similarity)| VectorHit {
                owner_id,
                similarity,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.owner_id.cmp(&b.owner_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Profiles
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryProfileStore {
    candidates: RwLock<Vec<CandidateProfile>>,
    jobs: RwLock<Vec<JobProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a candidate; replaced records become most recent.
    pub async fn put_candidate(&self, candidate: CandidateProfile) {
        let mut candidates = self.candidates.write().await;
        candidates.retain(|c| c.id != candidate.id);
        candidates.push(candidate);
    }

    pub async fn put_job(&self, job: JobProfile) {
        let mut jobs = self.jobs.write().await;
        jobs.retain(|j| j.id != job.id);
        jobs.push(job);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_candidate(&self, id: Uuid) -> Result<Option<CandidateProfile>, AppError> {
        Ok(self
            .candidates
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobProfile>, AppError> {
        Ok(self.jobs.read().await.iter().find(|j| j.id == id).cloned())
    }

    async fn list_candidate_ids(&self, limit: usize) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .candidates
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .map(|c| c.id)
            .collect())
    }

    async fn list_job_ids(&self, limit: usize) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .map(|j| j.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_skill_first_writer_wins() {
        let taxonomy = InMemoryTaxonomy::new();
        let first = taxonomy.upsert_skill("React", "Frontend").await.unwrap();
        let second = taxonomy.upsert_skill("react", "Other").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.category, "Frontend");
        assert_eq!(second.name, "React");
    }

    #[tokio::test]
    async fn test_alias_conflict_across_skills_is_rejected() {
        let taxonomy = InMemoryTaxonomy::new();
        let java = taxonomy.upsert_skill("Java", "Language").await.unwrap();
        let js = taxonomy.upsert_skill("JavaScript", "Language").await.unwrap();

        let first = taxonomy.add_alias(js.id, "JS", None).await.unwrap();
        assert!(matches!(first, AliasInsert::Inserted(_)));

        let repeat = taxonomy.add_alias(js.id, "js", None).await.unwrap();
        assert!(matches!(repeat, AliasInsert::Existing(_)));

        let conflict = taxonomy.add_alias(java.id, "js", None).await.unwrap();
        assert_eq!(conflict, AliasInsert::Conflict { existing: js.clone() });

        let (owner, _) = taxonomy.lookup_alias("JS").await.unwrap().unwrap();
        assert_eq!(owner.id, js.id);
    }

    #[tokio::test]
    async fn test_prefix_search_covers_names_and_aliases() {
        let taxonomy = InMemoryTaxonomy::new();
        let react = taxonomy.upsert_skill("React", "Frontend").await.unwrap();
        taxonomy.upsert_skill("Redis", "Database").await.unwrap();
        let k8s = taxonomy.upsert_skill("Kubernetes", "DevOps").await.unwrap();
        taxonomy.add_alias(react.id, "ReactJS", None).await.unwrap();
        taxonomy.add_alias(k8s.id, "kube", None).await.unwrap();

        let re = taxonomy.prefix_search("re", 10).await.unwrap();
        assert!(re.contains(&"React".to_string()));
        assert!(re.contains(&"Redis".to_string()));

        let ku = taxonomy.prefix_search("KU", 10).await.unwrap();
        assert_eq!(ku, vec!["Kubernetes".to_string()]);
    }

    #[tokio::test]
    async fn test_prefix_search_dedupes_before_limit() {
        let taxonomy = InMemoryTaxonomy::new();
        let pyt = taxonomy.upsert_skill("Pyt", "Language").await.unwrap();
        taxonomy.upsert_skill("Python", "Language").await.unwrap();
        for alias in ["Pyth", "Pyth3", "Pyth2", "Pyth.x"] {
            taxonomy.add_alias(pyt.id, alias, None).await.unwrap();
        }

        let found = taxonomy.prefix_search("py", 2).await.unwrap();
        assert_eq!(found, vec!["Pyt".to_string(), "Python".to_string()]);
    }

    #[tokio::test]
    async fn test_vector_nearest_orders_and_filters() {
        let index = InMemoryVectorIndex::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        index.upsert(OwnerType::Skill, a, "skill_name", &[1.0, 0.0]).await.unwrap();
        index.upsert(OwnerType::Skill, b, "skill_name", &[0.8, 0.6]).await.unwrap();
        index.upsert(OwnerType::Skill, c, "skill_name", &[0.0, 1.0]).await.unwrap();
        index.upsert(OwnerType::Job, Uuid::new_v4(), "job_full", &[1.0, 0.0]).await.unwrap();

        let hits = index.nearest(OwnerType::Skill, &[1.0, 0.0], 5, 0.7).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].owner_id, a);
        assert_eq!(hits[1].owner_id, b);
        assert!((hits[1].similarity - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_vector_upsert_replaces() {
        let index = InMemoryVectorIndex::new();
        let id = Uuid::new_v4();
        index.upsert(OwnerType::Candidate, id, "validated_skills", &[1.0]).await.unwrap();
        index.upsert(OwnerType::Candidate, id, "validated_skills", &[2.0]).await.unwrap();
        assert_eq!(index.len().await, 1);
        let stored = index.get(OwnerType::Candidate, id, "validated_skills").await.unwrap();
        assert_eq!(stored, Some(vec![2.0]));
    }

    #[tokio::test]
    async fn test_profile_store_lists_most_recent_first() {
        let store = InMemoryProfileStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for id in [first, second] {
            store
                .put_candidate(CandidateProfile {
                    id,
                    skills: vec![],
                    location: None,
                    years_experience: None,
                    salary_expectation: None,
                    salary_currency: None,
                })
                .await;
        }
        assert_eq!(store.list_candidate_ids(10).await.unwrap(), vec![second, first]);
        assert_eq!(store.list_candidate_ids(1).await.unwrap(), vec![second]);
        assert!(store.get_job(Uuid::new_v4()).await.unwrap().is_none());
    }
}
