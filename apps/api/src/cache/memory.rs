use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::cache::{CacheError, CacheStore};

/// Process-local cache. Expired entries are dropped on read and pruned on every write.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn live_entries(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }
}

fn remove_if_expired(entries: &mut HashMap<String, (String, Instant)>, key: &str, now: Instant) {
    if entries.get(key).is_some_and(|(_, expires_at)| *expires_at <= now) {
        entries.remove(key);
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if *expires_at > now => return Ok(Some(value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // A writer may have refreshed the key since the read lock was released
        remove_if_expired(&mut *self.entries.write().await, key, now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = InMemoryCacheStore::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = InMemoryCacheStore::new();
        cache.set("k", "v", Duration::from_secs(30)).await.unwrap();
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.live_entries().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_check_keeps_refreshed_entry() {
        let observed_at = Instant::now();
        tokio::time::advance(Duration::from_secs(5)).await;
        let mut entries = HashMap::new();
        entries.insert(
            "k".to_string(),
            ("fresh".to_string(), Instant::now() + Duration::from_secs(30)),
        );

        remove_if_expired(&mut entries, "k", observed_at);
        assert!(entries.contains_key("k"));

        remove_if_expired(&mut entries, "k", Instant::now() + Duration::from_secs(31));
        assert!(entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_after_expiry_survives_get() {
        let cache = InMemoryCacheStore::new();
        cache.set("k", "old", Duration::from_secs(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("k", "new", Duration::from_secs(30)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_prunes_expired_entries() {
        let cache = InMemoryCacheStore::new();
        for i in 0..5 {
            cache
                .set(&format!("stale:{i}"), "v", Duration::from_secs(1))
                .await
                .unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("live", "v", Duration::from_secs(30)).await.unwrap();
        assert_eq!(cache.entries.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let cache = InMemoryCacheStore::new();
        let ttl = Duration::from_secs(60);
        cache.set("mapi:job_matches:job=1:page=1", "a", ttl).await.unwrap();
        cache.set("mapi:job_matches:job=1:page=2", "b", ttl).await.unwrap();
        cache.set("mapi:job_matches:job=2:page=1", "c", ttl).await.unwrap();

        let removed = cache.delete_prefix("mapi:job_matches:job=1:").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.live_entries().await, 1);
    }
}
