//! Similarity backends for the diff classifier and the entity normalizer.
//!
//! `AppState` holds an `Arc<dyn SimilarityProvider>`, selected at startup:
//! the embedding-service client by default, the in-process Jaro-Winkler
//! backend via `USE_FUZZY_SIMILARITY`. Provider failure is surfaced as
//! `SimilarityError::Unavailable`; consumers degrade conservatively and
//! never substitute a guessed score.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::normalized::MatchMethod;

pub mod embedding;

pub use embedding::EmbeddingClient;

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("Similarity service unavailable: {0}")]
    Unavailable(String),
}

/// A backend that scores how close two name-like strings are, 0.0–1.0.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError>;

    /// Recorded on entity links as the match method.
    fn method(&self) -> MatchMethod;
}

/// Deterministic in-process backend: Jaro-Winkler over normalized text.
/// Also serves as the fallback the normalizer records as `fuzzy`.
pub struct FuzzyProvider;

#[async_trait]
impl SimilarityProvider for FuzzyProvider {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        Ok(strsim::jaro_winkler(
            &normalize_value(a),
            &normalize_value(b),
        ))
    }

    fn method(&self) -> MatchMethod {
        MatchMethod::Fuzzy
    }
}

/// Canonical text form used for equality and similarity comparisons:
/// trimmed, case-folded, internal whitespace collapsed to single spaces.
pub fn normalize_value(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_folds_case() {
        assert_eq!(normalize_value("  Senior Engineer "), "senior engineer");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_value("Sr.\t Software\n Engineer"), "sr. software engineer");
    }

    #[tokio::test]
    async fn test_fuzzy_identical_strings_score_one() {
        let sim = FuzzyProvider.similarity("Google", "google").await.unwrap();
        assert!((sim - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_fuzzy_close_strings_score_high() {
        let sim = FuzzyProvider
            .similarity("Senior Engineer", "Senior Enginer")
            .await
            .unwrap();
        assert!(sim > 0.9, "score was {sim}");
    }

    #[tokio::test]
    async fn test_fuzzy_unrelated_strings_score_low() {
        let sim = FuzzyProvider
            .similarity("Python", "Harvard University")
            .await
            .unwrap();
        assert!(sim < 0.7, "score was {sim}");
    }
}
