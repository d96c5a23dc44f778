use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails fast at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub embedding_service_url: String,
    pub port: u16,
    pub rust_log: String,
    /// When set, similarity runs on the in-process fuzzy backend instead of
    /// the embedding service. Useful for local runs without the service.
    pub use_fuzzy_similarity: bool,
    pub thresholds: Thresholds,
}

/// The similarity/confidence boundaries used across the reconciliation
/// pipeline, centralized so every comparison reads from one policy.
///
/// All lower bounds are inclusive: a value equal to the threshold passes.
/// `equivalence_review_ceiling` is exclusive: similarity below it keeps the
/// diff flagged for review.
#[derive(Debug, Clone)]
pub struct Thresholds {
    /// Parser confidence below this flags `new` diffs for review.
    pub review: f64,
    /// Similarity at or above this classifies as `equivalent`.
    pub equivalence: f64,
    /// Equivalent diffs below this still require review.
    pub equivalence_review_ceiling: f64,
    /// Normalizer candidates below this create a new canonical node.
    pub auto_link_floor: f64,
    /// Embedding matches at or above this link without review.
    pub auto_merge: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            review: 0.85,
            equivalence: 0.90,
            equivalence_review_ceiling: 0.95,
            auto_link_floor: 0.70,
            auto_merge: 0.92,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            embedding_service_url: require_env("EMBEDDING_SERVICE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            use_fuzzy_similarity: std::env::var("USE_FUZZY_SIMILARITY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            thresholds: Thresholds::from_env()?,
        })
    }
}

impl Thresholds {
    fn from_env() -> Result<Self> {
        let defaults = Thresholds::default();
        Ok(Thresholds {
            review: optional_f64("REVIEW_THRESHOLD", defaults.review)?,
            equivalence: optional_f64("EQUIVALENCE_THRESHOLD", defaults.equivalence)?,
            equivalence_review_ceiling: optional_f64(
                "EQUIVALENCE_REVIEW_CEILING",
                defaults.equivalence_review_ceiling,
            )?,
            auto_link_floor: optional_f64("AUTO_LINK_FLOOR", defaults.auto_link_floor)?,
            auto_merge: optional_f64("AUTO_MERGE_THRESHOLD", defaults.auto_merge)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_f64(key: &str, default: f64) -> Result<f64> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<f64>()
            .with_context(|| format!("'{key}' must be a number between 0 and 1")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_ordering() {
        let t = Thresholds::default();
        assert!(t.auto_link_floor < t.review);
        assert!(t.review < t.equivalence);
        assert!(t.equivalence < t.auto_merge);
        assert!(t.auto_merge < t.equivalence_review_ceiling);
    }
}
