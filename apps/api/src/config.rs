use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::matching::{BatchConfig, MatchingConfig};
use crate::normalizer::NormalizerConfig;

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_EMBEDDING_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub embedding_api_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub port: u16,
    pub rust_log: String,
    pub skill_threshold: f64,
    pub semantic_threshold: f64,
    pub listing_ttl: Duration,
    pub batch_concurrency: usize,
    pub batch_max_candidates: usize,
    pub batch_max_jobs: usize,
    pub batch_deadline: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let config = Config {
            database_url: require("DATABASE_URL")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: require("REDIS_URL")?,
            embedding_api_url: lookup("EMBEDDING_API_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_API_URL.to_string()),
            embedding_api_key: require("EMBEDDING_API_KEY")?,
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_or(&lookup, "EMBEDDING_DIMENSION", 768)?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            skill_threshold: parse_or(&lookup, "MATCH_SKILL_THRESHOLD", 0.75)?,
            semantic_threshold: parse_or(&lookup, "NORMALIZER_SEMANTIC_THRESHOLD", 0.7)?,
            listing_ttl: Duration::from_secs(parse_or(&lookup, "MATCH_LISTING_TTL_SECS", 30)?),
            batch_concurrency: parse_or(&lookup, "BATCH_CONCURRENCY", 6)?,
            batch_max_candidates: parse_or(&lookup, "BATCH_MAX_CANDIDATES", 100)?,
            batch_max_jobs: parse_or(&lookup, "BATCH_MAX_JOBS", 50)?,
            batch_deadline: Duration::from_millis(parse_or(&lookup, "BATCH_DEADLINE_MS", 10_000)?),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("MATCH_SKILL_THRESHOLD", self.skill_threshold),
            ("NORMALIZER_SEMANTIC_THRESHOLD", self.semantic_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{key} must be within [0, 1], got {value}");
            }
        }
        if self.embedding_dimension == 0 {
            anyhow::bail!("EMBEDDING_DIMENSION must be positive");
        }
        if self.batch_concurrency == 0 {
            anyhow::bail!("BATCH_CONCURRENCY must be positive");
        }
        Ok(())
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            semantic_threshold: self.semantic_threshold,
            concurrency: self.batch_concurrency,
            ..NormalizerConfig::default()
        }
    }

    pub fn matching_config(&self) -> MatchingConfig {
        MatchingConfig {
            skill_threshold: self.skill_threshold,
            concurrency: self.batch_concurrency,
            ..MatchingConfig::default()
        }
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_candidates: self.batch_max_candidates,
            max_jobs: self.batch_max_jobs,
            concurrency: self.batch_concurrency,
            deadline: self.batch_deadline,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
