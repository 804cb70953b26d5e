use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates the PostgreSQL pool shared by the taxonomy, vector and profile
/// adapters, and checks that the pgvector extension is installed.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL (max {max_connections} connections)...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    let has_vector: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'vector')",
    )
    .fetch_one(&pool)
    .await
    .context("Could not inspect installed extensions")?;
    if !has_vector {
        anyhow::bail!("The pgvector extension is not installed; run migrations/001_matching_schema.sql");
    }

    info!("PostgreSQL connection pool established");
    Ok(pool)
}
