//! Key/value cache seam and the typed key builder shared by every cached
//! operation.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod match_cache;
pub mod memory;
pub mod redis_store;

pub use match_cache::MatchCache;
pub use memory::InMemoryCacheStore;
pub use redis_store::RedisCacheStore;

/// Namespace prepended to every rendered key.
const KEY_NAMESPACE: &str = "mapi";

/// Cache failure. Never fatal: callers treat it as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

/// Operation tag of a cache key. Distinct operations never share a key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOperation {
    SkillNormalization,
    JobMatches,
    CandidateMatches,
}

impl CacheOperation {
    pub fn tag(&self) -> &'static str {
        match self {
            CacheOperation::SkillNormalization => "skill_norm",
            CacheOperation::JobMatches => "job_matches",
            CacheOperation::CandidateMatches => "candidate_matches",
        }
    }
}

/// Typed cache key: operation tag plus an ordered parameter list.
///
/// Rendered as `mapi:<tag>:<name>=<value>:...` with `%`, `:` and `=` escaped
/// inside values, so two different parameter lists never render the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    operation: CacheOperation,
    params: Vec<(&'static str, String)>,
}

impl CacheKey {
    pub fn new(operation: CacheOperation) -> Self {
        Self {
            operation,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl Display) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    pub fn operation(&self) -> CacheOperation {
        self.operation
    }

    pub fn render(&self) -> String {
        let mut key = format!("{KEY_NAMESPACE}:{}", self.operation.tag());
        for (name, value) in &self.params {
            key.push(':');
            key.push_str(name);
            key.push('=');
            key.push_str(&escape_value(value));
        }
        key
    }

    /// Prefix matching every key that extends this one with more parameters.
    pub fn prefix(&self) -> String {
        format!("{}:", self.render())
    }
}

fn escape_value(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace(':', "%3A")
        .replace('=', "%3D")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_orders_params_as_given() {
        let key = CacheKey::new(CacheOperation::JobMatches)
            .param("job", "j1")
            .param("page", 2)
            .param("page_size", 20);
        assert_eq!(key.render(), "mapi:job_matches:job=j1:page=2:page_size=20");
    }

    #[test]
    fn test_operations_do_not_collide() {
        let a = CacheKey::new(CacheOperation::JobMatches).param("id", "x");
        let b = CacheKey::new(CacheOperation::CandidateMatches).param("id", "x");
        assert_ne!(a.render(), b.render());
    }

    #[test]
    fn test_values_are_escaped() {
        // Without escaping these two would render identically
        let a = CacheKey::new(CacheOperation::SkillNormalization)
            .param("input", "a:b=c")
            .param("x", "1");
        let b = CacheKey::new(CacheOperation::SkillNormalization)
            .param("input", "a")
            .param("b", "c:x=1");
        assert_ne!(a.render(), b.render());
        assert!(a.render().contains("a%3Ab%3Dc"));
    }

    #[test]
    fn test_prefix_covers_extended_keys() {
        let base = CacheKey::new(CacheOperation::JobMatches).param("job", "j1");
        let full = base.clone().param("page", 1);
        assert!(full.render().starts_with(&base.prefix()));

        let other = CacheKey::new(CacheOperation::JobMatches).param("job", "j10");
        assert!(!other.param("page", 1).render().starts_with(&base.prefix()));
    }
}
