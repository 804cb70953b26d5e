//! Match Cache: memoizes externally-facing match listings.
//!
//! Every failure of the underlying store is logged and treated as a miss, so
//! a cache outage only costs recomputation. Per-pair scoring inside the engine
//! never goes through this cache.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheOperation, CacheStore};

#[derive(Clone)]
pub struct MatchCache {
    store: Arc<dyn CacheStore>,
    listing_ttl: Duration,
}

impl MatchCache {
    pub fn new(store: Arc<dyn CacheStore>, listing_ttl: Duration) -> Self {
        Self { store, listing_ttl }
    }

    pub fn listing_ttl(&self) -> Duration {
        self.listing_ttl
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let rendered = key.render();
        match self.store.get(&rendered).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache hit: {rendered}");
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {rendered}: {e}");
                    None
                }
            },
            Ok(None) => {
                debug!("Cache miss: {rendered}");
                None
            }
            Err(e) => {
                warn!("Cache unavailable on get {rendered}, treating as miss: {e}");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let rendered = key.render();
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping cache write for {rendered}: {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(&rendered, &raw, ttl).await {
            warn!("Cache unavailable on set {rendered}: {e}");
        }
    }

    /// Drops everything cached under `prefix`; failures are logged only.
    pub async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        match self.store.delete_prefix(prefix).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Cache invalidation of {prefix} failed: {e}");
                0
            }
        }
    }

    /// A job changed: its own listings are stale, and so is every candidate
    /// listing, since any of them may rank this job.
    pub async fn invalidate_job(&self, job_id: Uuid) -> u64 {
        let own = CacheKey::new(CacheOperation::JobMatches).param("job", job_id);
        let removed = self.invalidate_prefix(&own.prefix()).await
            + self
                .invalidate_prefix(&CacheKey::new(CacheOperation::CandidateMatches).prefix())
                .await;
        debug!("Invalidated {removed} cached listings for job {job_id}");
        removed
    }

    /// A candidate changed: mirror image of [`invalidate_job`].
    ///
    /// [`invalidate_job`]: MatchCache::invalidate_job
    pub async fn invalidate_candidate(&self, candidate_id: Uuid) -> u64 {
        let own = CacheKey::new(CacheOperation::CandidateMatches).param("candidate", candidate_id);
        let removed = self.invalidate_prefix(&own.prefix()).await
            + self
                .invalidate_prefix(&CacheKey::new(CacheOperation::JobMatches).prefix())
                .await;
        debug!("Invalidated {removed} cached listings for candidate {candidate_id}");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, InMemoryCacheStore};
    use async_trait::async_trait;

    struct DownCache;

    #[async_trait]
    impl CacheStore for DownCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn listing_key(job: Uuid, page: u32) -> CacheKey {
        CacheKey::new(CacheOperation::JobMatches)
            .param("job", job)
            .param("page", page)
    }

    #[tokio::test]
    async fn test_round_trip_value() {
        let cache = MatchCache::new(Arc::new(InMemoryCacheStore::new()), Duration::from_secs(30));
        let key = listing_key(Uuid::new_v4(), 1);
        cache.set(&key, &vec![1u32, 2, 3], Duration::from_secs(30)).await;
        let value: Option<Vec<u32>> = cache.get(&key).await;
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_unavailable_store_is_a_miss() {
        let cache = MatchCache::new(Arc::new(DownCache), Duration::from_secs(30));
        let key = listing_key(Uuid::new_v4(), 1);
        cache.set(&key, &"payload", Duration::from_secs(30)).await;
        let value: Option<String> = cache.get(&key).await;
        assert!(value.is_none());
        assert_eq!(cache.invalidate_job(Uuid::new_v4()).await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_job_drops_own_and_candidate_listings() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = MatchCache::new(store.clone(), Duration::from_secs(30));
        let ttl = Duration::from_secs(30);
        let job = Uuid::new_v4();
        let other_job = Uuid::new_v4();
        let candidate_key =
            CacheKey::new(CacheOperation::CandidateMatches).param("candidate", Uuid::new_v4());

        cache.set(&listing_key(job, 1), &1, ttl).await;
        cache.set(&listing_key(job, 2), &2, ttl).await;
        cache.set(&listing_key(other_job, 1), &3, ttl).await;
        cache.set(&candidate_key.clone().param("page", 1), &4, ttl).await;

        let removed = cache.invalidate_job(job).await;
        assert_eq!(removed, 3);
        assert_eq!(store.live_entries().await, 1);
        let survivor: Option<i32> = cache.get(&listing_key(other_job, 1)).await;
        assert_eq!(survivor, Some(3));
    }

    #[tokio::test]
    async fn test_invalidate_candidate_drops_job_listings() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = MatchCache::new(store.clone(), Duration::from_secs(30));
        let ttl = Duration::from_secs(30);
        cache.set(&listing_key(Uuid::new_v4(), 1), &1, ttl).await;
        cache.set(&listing_key(Uuid::new_v4(), 1), &2, ttl).await;

        assert_eq!(cache.invalidate_candidate(Uuid::new_v4()).await, 2);
        assert_eq!(store.live_entries().await, 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = MatchCache::new(store.clone(), Duration::from_secs(30));
        let key = listing_key(Uuid::new_v4(), 1);
        store
            .set(&key.render(), "not json", Duration::from_secs(30))
            .await
            .unwrap();
        let value: Option<Vec<u32>> = cache.get(&key).await;
        assert!(value.is_none());
    }
}
