use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use match_api::cache::{MatchCache, RedisCacheStore};
use match_api::config::Config;
use match_api::db::create_pool;
use match_api::matching::{BatchMatcher, MatchListings, MatchingEngine};
use match_api::normalizer::SkillNormalizer;
use match_api::providers::{
    EmbeddingProvider, HttpEmbeddingProvider, PgProfileStore, PgTaxonomyStore, PgVectorIndex,
};
use match_api::routes::build_router;
use match_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("match_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (taxonomy, embeddings, profiles)
    let db = create_pool(&config.database_url, config.database_max_connections).await?;

    // Initialize Redis (match cache)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let cache = MatchCache::new(Arc::new(RedisCacheStore::new(redis)), config.listing_ttl);
    info!("Redis cache initialized (listing TTL: {}s)", config.listing_ttl.as_secs());

    // Initialize embedding provider
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        config.embedding_api_url.clone(),
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
    )?);
    info!(
        "Embedding provider initialized (model: {}, dimension: {})",
        config.embedding_model, config.embedding_dimension
    );

    // Build services
    let normalizer = SkillNormalizer::new(
        Arc::new(PgTaxonomyStore::new(db.clone())),
        embedder,
        Arc::new(PgVectorIndex::new(db.clone())),
        cache.clone(),
        config.normalizer_config(),
    );
    let engine = MatchingEngine::new(
        Arc::new(PgProfileStore::new(db)),
        normalizer.clone(),
        config.matching_config(),
    );
    let batch = BatchMatcher::new(engine.clone(), config.batch_config());
    let listings = MatchListings::new(batch.clone(), cache);

    let state = AppState {
        normalizer,
        engine,
        batch,
        listings,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
