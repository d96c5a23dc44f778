mod cache;
mod config;
mod db;
mod decisions;
mod diff;
mod errors;
mod models;
mod normalize;
mod pipeline;
mod profile;
mod routes;
mod similarity;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::TtlCache;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::similarity::{EmbeddingClient, FuzzyProvider, SimilarityProvider};
use crate::state::AppState;

/// Admin-status cache TTL. Short enough that a revoked tier takes effect
/// within minutes, long enough to skip the lookup on merge-heavy sessions.
const ADMIN_CACHE_TTL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Meridian API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize similarity backend (embedding service by default; fuzzy
    // in-process backend via USE_FUZZY_SIMILARITY)
    let similarity: Arc<dyn SimilarityProvider> = if config.use_fuzzy_similarity {
        info!("Similarity backend: fuzzy (Jaro-Winkler)");
        Arc::new(FuzzyProvider)
    } else {
        info!(
            "Similarity backend: embedding service at {}",
            config.embedding_service_url
        );
        Arc::new(EmbeddingClient::new(config.embedding_service_url.clone()))
    };

    let admin_cache = Arc::new(TtlCache::new(Duration::from_secs(ADMIN_CACHE_TTL_SECS)));

    // Build app state
    let state = AppState {
        db,
        similarity,
        admin_cache,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
