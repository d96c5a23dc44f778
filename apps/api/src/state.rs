use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::normalize::privilege::AdminCache;
use crate::similarity::SimilarityProvider;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Pluggable similarity backend. Default: embedding service client.
    /// Swap to the in-process fuzzy backend via USE_FUZZY_SIMILARITY.
    pub similarity: Arc<dyn SimilarityProvider>,
    /// TTL cache for admin-privilege lookups gating canonical-graph mutation.
    pub admin_cache: Arc<AdminCache>,
    pub config: Config,
}
