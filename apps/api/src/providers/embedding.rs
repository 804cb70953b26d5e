//! Embedding providers: turn text into fixed-dimension dense vectors.
//!
//! `HttpEmbeddingProvider` calls a Gemini-style `embedContent` endpoint with
//! retry and backoff. `HashEmbeddingProvider` is a deterministic feature-hashing
//! embedder with optional fixed vectors, used offline and in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::models::fold_key;
use crate::providers::ProviderError;

/// Default dimension of the reference deployment's embedding model.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short backend name for logs ("http", "hash").
    fn name(&self) -> &'static str;

    /// Dimension of every vector this provider returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HttpEmbeddingProvider
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Embedding client for a hosted `embedContent` API.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        dimension: usize,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Retries on 429 and 5xx with exponential backoff (250ms, 500ms).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::EmptyInput);
        }

        let model_path = format!("models/{}", self.model);
        let body = EmbedRequest {
            model: &model_path,
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
            output_dimensionality: self.dimension,
        };

        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.api_url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    last_error = Some(ProviderError::Timeout);
                    continue;
                }
                Err(e) => {
                    last_error = Some(ProviderError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Embedding API returned {}: {}", status, body);
                last_error = Some(ProviderError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: EmbedResponse = response.json().await?;
            let vector = check_dimension(parsed.embedding.values, self.dimension)?;
            debug!("Embedded {} chars into {} dims", text.len(), vector.len());
            return Ok(vector);
        }

        Err(last_error.unwrap_or(ProviderError::Unavailable(format!(
            "embedding failed after {MAX_RETRIES} attempts"
        ))))
    }
}

fn check_dimension(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>, ProviderError> {
    if vector.is_empty() {
        return Err(ProviderError::EmptyEmbedding);
    }
    if vector.len() != expected {
        return Err(ProviderError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

// ────────────────────────────────────────────────────────────────────────────
// LimitedEmbedder
// ────────────────────────────────────────────────────────────────────────────

/// Caps in-flight `embed` calls across every caller sharing this wrapper.
/// Nested fan-outs (a batch of pairs, each normalizing its skills) all draw
/// from the same permit pool.
pub struct LimitedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    permits: Arc<Semaphore>,
}

impl LimitedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LimitedEmbedder {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("embedding limiter closed: {e}")))?;
        self.inner.embed(text).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HashEmbeddingProvider
// ────────────────────────────────────────────────────────────────────────────

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic embedder: signed feature hashing of character trigrams over the
/// folded text, L2-normalized. Texts registered with [`with_vector`] return
/// that vector instead.
///
/// [`with_vector`]: HashEmbeddingProvider::with_vector
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
    fixed: HashMap<String, Vec<f32>>,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            fixed: HashMap::new(),
        }
    }

    /// Pins the vector returned for `text` (matched case-insensitively).
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(fold_key(text), vector);
        self
    }

    fn hash_vector(&self, key: &str) -> Vec<f32> {
        let padded: Vec<char> = format!(" {key} ").chars().collect();
        let mut vector = vec![0.0_f32; self.dimension];
        for window in padded.windows(3) {
            let mut hash = FNV_OFFSET;
            for c in window {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    hash ^= u64::from(byte);
                    hash = hash.wrapping_mul(FNV_PRIME);
                }
            }
            let index = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let key = fold_key(text);
        if key.is_empty() {
            return Err(ProviderError::EmptyInput);
        }
        match self.fixed.get(&key) {
            Some(vector) => check_dimension(vector.clone(), self.dimension),
            None => Ok(self.hash_vector(&key)),
        }
    }
}
