//! Shared fixture for unit tests: a seeded in-memory taxonomy whose skill
//! vectors sit on orthogonal axes, in-memory profiles and cache, and fake
//! embedders for failure and latency paths.
//!
//! Seeding never calls the embedder, so a failing or slow embedder only
//! affects the code under test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cache::{InMemoryCacheStore, MatchCache};
use crate::matching::{BatchConfig, BatchMatcher, MatchListings, MatchingConfig, MatchingEngine};
use crate::models::profile::{CandidateProfile, JobProfile, RequiredSkill};
use crate::normalizer::{NormalizerConfig, SkillNormalizer};
use crate::providers::memory::{InMemoryProfileStore, InMemoryTaxonomy, InMemoryVectorIndex};
use crate::providers::vector_index::{CANDIDATE_SKILLS_LABEL, JOB_SKILLS_LABEL, SKILL_LABEL};
use crate::providers::{
    EmbeddingProvider, HashEmbeddingProvider, OwnerType, ProviderError, TaxonomyStore, VectorIndex,
};
use crate::state::AppState;

pub const DIM: usize = 64;

/// Axis reserved for profile-level vectors; no skill lives here.
const PROFILE_AXIS: usize = DIM - 1;

const DEFAULT_JS_TS_SIMILARITY: f32 = 0.8;

/// (name, category, aliases, axis). TypeScript is placed separately so its
/// similarity to JavaScript can be tuned per test.
const SEEDED: [(&str, &str, &[&str], usize); 9] = [
    ("React", "Frontend", &["ReactJS"], 0),
    ("Node.js", "Backend", &[], 1),
    ("JavaScript", "Language", &["JS"], 3),
    ("Python", "Language", &[], 4),
    ("PostgreSQL", "Database", &["Postgres"], 5),
    ("Kubernetes", "DevOps", &["k8s"], 6),
    ("Docker", "DevOps", &[], 7),
    ("Go", "Language", &[], 8),
    ("Rust", "Language", &[], 9),
];

const TYPESCRIPT_AXIS: usize = 2;
const JAVASCRIPT_AXIS: usize = 3;

/// Terms that are not in the taxonomy. Each gets its own axis so it can never
/// drift into a semantic match by accident.
const UNKNOWN_TERMS: [&str; 12] = [
    "totally-unknown-skill-xyz",
    "Zig",
    "ziglang",
    "Elm",
    "Haskell",
    "Kotlin",
    "SomethingNew",
    "Fortran",
    "Preact",
    "Excel",
    "knitting",
    "Nomad",
];
const UNKNOWN_AXIS_START: usize = 20;

fn axis(index: usize) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    vector[index] = 1.0;
    vector
}

/// Unit vector with cosine `similarity` against the JavaScript axis.
fn typescript_vector(similarity: f32) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    vector[TYPESCRIPT_AXIS] = (1.0 - similarity * similarity).max(0.0).sqrt();
    vector[JAVASCRIPT_AXIS] = similarity;
    vector
}

/// Hash embedder with every seeded skill and unknown term pinned.
/// "ECMAScript" shares JavaScript's axis.
pub fn pinned_embedder(js_ts_similarity: f32) -> HashEmbeddingProvider {
    let mut embedder = HashEmbeddingProvider::new(DIM)
        .with_vector("TypeScript", typescript_vector(js_ts_similarity))
        .with_vector("ECMAScript", axis(JAVASCRIPT_AXIS));
    for (name, _, _, index) in SEEDED {
        embedder = embedder.with_vector(name, axis(index));
    }
    for (offset, term) in UNKNOWN_TERMS.iter().enumerate() {
        embedder = embedder.with_vector(term, axis(UNKNOWN_AXIS_START + offset));
    }
    embedder
}

// ────────────────────────────────────────────────────────────────────────────
// Fake embedders
// ────────────────────────────────────────────────────────────────────────────

/// Every call fails as if the provider were down.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Unavailable("embedding service down".to_string()))
    }
}

/// Sleeps before answering like the pinned embedder.
pub struct SlowEmbedder {
    delay: Duration,
    inner: HashEmbeddingProvider,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: pinned_embedder(DEFAULT_JS_TS_SIMILARITY),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(text).await
    }
}

/// Records the highest number of `embed` calls in flight at once.
pub struct CountingEmbedder {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    inner: HashEmbeddingProvider,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            inner: pinned_embedder(DEFAULT_JS_TS_SIMILARITY),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixture
// ────────────────────────────────────────────────────────────────────────────

pub struct Fixture {
    pub taxonomy: Arc<InMemoryTaxonomy>,
    pub vectors: Arc<InMemoryVectorIndex>,
    pub profiles: Arc<InMemoryProfileStore>,
    pub cache_store: Arc<InMemoryCacheStore>,
    pub cache: MatchCache,
    pub normalizer: SkillNormalizer,
    pub engine: MatchingEngine,
    pub batch: BatchMatcher,
    pub listings: MatchListings,
}

impl Fixture {
    pub fn state(&self) -> AppState {
        AppState {
            normalizer: self.normalizer.clone(),
            engine: self.engine.clone(),
            batch: self.batch.clone(),
            listings: self.listings.clone(),
        }
    }

    /// Stores the candidate with a profile embedding so semantic comparison
    /// applies to it.
    pub async fn add_candidate(&self, profile: CandidateProfile) -> Uuid {
        let id = profile.id;
        self.profiles.put_candidate(profile).await;
        self.upsert_profile_vector(OwnerType::Candidate, id, CANDIDATE_SKILLS_LABEL)
            .await;
        id
    }

    pub async fn add_candidate_unindexed(&self, profile: CandidateProfile) -> Uuid {
        let id = profile.id;
        self.profiles.put_candidate(profile).await;
        id
    }

    pub async fn add_job(&self, profile: JobProfile) -> Uuid {
        let id = profile.id;
        self.profiles.put_job(profile).await;
        self.upsert_profile_vector(OwnerType::Job, id, JOB_SKILLS_LABEL)
            .await;
        id
    }

    pub async fn add_job_unindexed(&self, profile: JobProfile) -> Uuid {
        let id = profile.id;
        self.profiles.put_job(profile).await;
        id
    }

    async fn upsert_profile_vector(&self, owner_type: OwnerType, id: Uuid, label: &str) {
        self.vectors
            .upsert(owner_type, id, label, &axis(PROFILE_AXIS))
            .await
            .unwrap();
    }
}

pub async fn fixture() -> Fixture {
    build(
        Arc::new(pinned_embedder(DEFAULT_JS_TS_SIMILARITY)),
        DEFAULT_JS_TS_SIMILARITY,
        BatchConfig::default(),
    )
    .await
}

pub async fn fixture_with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> Fixture {
    build(embedder, DEFAULT_JS_TS_SIMILARITY, BatchConfig::default()).await
}

/// Seeds TypeScript so its cosine similarity to JavaScript is `similarity`.
pub async fn fixture_with_js_ts_similarity(similarity: f32) -> Fixture {
    build(
        Arc::new(pinned_embedder(similarity)),
        similarity,
        BatchConfig::default(),
    )
    .await
}

pub async fn fixture_with_embedder_and_batch(
    embedder: Arc<dyn EmbeddingProvider>,
    batch_config: BatchConfig,
) -> Fixture {
    build(embedder, DEFAULT_JS_TS_SIMILARITY, batch_config).await
}

async fn build(
    embedder: Arc<dyn EmbeddingProvider>,
    js_ts_similarity: f32,
    batch_config: BatchConfig,
) -> Fixture {
    let taxonomy = Arc::new(InMemoryTaxonomy::new());
    let vectors = Arc::new(InMemoryVectorIndex::new());
    seed(&taxonomy, &vectors, js_ts_similarity).await;

    let profiles = Arc::new(InMemoryProfileStore::new());
    let cache_store = Arc::new(InMemoryCacheStore::new());
    let cache = MatchCache::new(cache_store.clone(), Duration::from_secs(30));

    let normalizer = SkillNormalizer::new(
        taxonomy.clone(),
        embedder,
        vectors.clone(),
        cache.clone(),
        NormalizerConfig::default(),
    );
    let engine = MatchingEngine::new(profiles.clone(), normalizer.clone(), MatchingConfig::default());
    let batch = BatchMatcher::new(engine.clone(), batch_config);
    let listings = MatchListings::new(batch.clone(), cache.clone());

    Fixture {
        taxonomy,
        vectors,
        profiles,
        cache_store,
        cache,
        normalizer,
        engine,
        batch,
        listings,
    }
}

async fn seed(taxonomy: &InMemoryTaxonomy, vectors: &InMemoryVectorIndex, js_ts_similarity: f32) {
    let typescript = taxonomy.upsert_skill("TypeScript", "Language").await.unwrap();
    vectors
        .upsert(
            OwnerType::Skill,
            typescript.id,
            SKILL_LABEL,
            &typescript_vector(js_ts_similarity),
        )
        .await
        .unwrap();

    for (name, category, aliases, index) in SEEDED {
        let skill = taxonomy.upsert_skill(name, category).await.unwrap();
        for alias in aliases {
            taxonomy.add_alias(skill.id, alias, None).await.unwrap();
        }
        vectors
            .upsert(OwnerType::Skill, skill.id, SKILL_LABEL, &axis(index))
            .await
            .unwrap();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Profile builders
// ────────────────────────────────────────────────────────────────────────────

pub fn candidate(skills: &[&str]) -> CandidateProfile {
    CandidateProfile {
        id: Uuid::new_v4(),
        skills: skills.iter().map(|s| s.to_string()).collect(),
        location: None,
        years_experience: None,
        salary_expectation: None,
        salary_currency: None,
    }
}

pub fn job(skills: &[&str]) -> JobProfile {
    JobProfile {
        id: Uuid::new_v4(),
        title: "Software Engineer".to_string(),
        skills: skills.iter().map(|s| RequiredSkill::new(*s)).collect(),
        location: None,
        remote: false,
        experience: None,
        salary: None,
        job_type: None,
    }
}
