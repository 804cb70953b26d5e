//! Collaborator seams of the matching core.
//!
//! Each external dependency (embedding model, vector index, skill taxonomy,
//! candidate/job records) sits behind an `async_trait` carried as `Arc<dyn _>`,
//! with a production adapter (HTTP / Postgres) and an in-memory adapter in
//! [`memory`] for offline use and tests.

use thiserror::Error;

pub mod embedding;
pub mod memory;
pub mod profiles;
pub mod taxonomy;
pub mod vector_index;

pub use embedding::{
    EmbeddingProvider, HashEmbeddingProvider, HttpEmbeddingProvider, LimitedEmbedder,
};
pub use profiles::{PgProfileStore, ProfileStore};
pub use taxonomy::{AliasInsert, PgTaxonomyStore, TaxonomyStore};
pub use vector_index::{OwnerType, PgVectorIndex, VectorHit, VectorIndex};

/// Failure of an external collaborator call. Recoverable: the core falls back
/// to taxonomy-only comparison instead of failing the request.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("Provider returned an empty embedding")]
    EmptyEmbedding,

    #[error("Malformed vector: {0}")]
    MalformedVector(String),

    #[error("Provider call timed out")]
    Timeout,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}
