//! Diff classification: parsed value vs. confirmed value, four-way outcome.
//!
//! The policy is evaluated in order, first match wins:
//! 1. no confirmed value          → new
//! 2. normalized equality         → identical
//! 3. similarity ≥ equivalence    → equivalent
//! 4. otherwise                   → conflicting
//!
//! When the similarity provider is unavailable, classification falls back to
//! `conflicting` with `requires_review = true`, never to a guessed match.
//! Confidence scores are carried from the parser, never invented here.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::models::diff::DiffType;
use crate::similarity::{normalize_value, SimilarityProvider};

/// Classification result before it is attached to a parsed entity and
/// persisted as a diff row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedDiff {
    pub diff_type: DiffType,
    pub similarity_score: f64,
    pub confidence_score: Option<f64>,
    pub justification: String,
    pub requires_review: bool,
}

pub async fn classify_value(
    parsed_value: &str,
    confirmed_value: Option<&str>,
    parser_confidence: Option<f64>,
    provider: &dyn SimilarityProvider,
    thresholds: &Thresholds,
) -> ClassifiedDiff {
    // Rule 1: nothing confirmed for this field yet.
    let confirmed_value = match confirmed_value {
        Some(v) => v,
        None => {
            // Missing parser confidence is treated as zero: review it.
            let confidence = parser_confidence.unwrap_or(0.0);
            return ClassifiedDiff {
                diff_type: DiffType::New,
                similarity_score: 0.0,
                confidence_score: parser_confidence,
                justification: format!(
                    "no confirmed value for this field; parser confidence {confidence:.2} vs review threshold {:.2}",
                    thresholds.review
                ),
                requires_review: confidence < thresholds.review,
            };
        }
    };

    // Rule 2: exact match after trimming, case folding and whitespace collapse.
    if normalize_value(parsed_value) == normalize_value(confirmed_value) {
        return ClassifiedDiff {
            diff_type: DiffType::Identical,
            similarity_score: 1.0,
            confidence_score: parser_confidence,
            justification: "normalized values are equal".to_string(),
            requires_review: false,
        };
    }

    // Rules 3 and 4 need a similarity score. An unavailable provider must not
    // default to a match: degrade to conflicting and flag for review.
    let similarity = match provider.similarity(parsed_value, confirmed_value).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Similarity provider unavailable, degrading to conflicting: {e}");
            return ClassifiedDiff {
                diff_type: DiffType::Conflicting,
                similarity_score: 0.0,
                confidence_score: parser_confidence,
                justification: format!(
                    "degraded mode: similarity unavailable ({e}); conservative fallback"
                ),
                requires_review: true,
            };
        }
    };

    if similarity >= thresholds.equivalence {
        return ClassifiedDiff {
            diff_type: DiffType::Equivalent,
            similarity_score: similarity,
            confidence_score: parser_confidence,
            justification: format!(
                "similarity {similarity:.2} at or above equivalence threshold {:.2}",
                thresholds.equivalence
            ),
            requires_review: similarity < thresholds.equivalence_review_ceiling,
        };
    }

    ClassifiedDiff {
        diff_type: DiffType::Conflicting,
        similarity_score: similarity,
        confidence_score: parser_confidence,
        justification: format!(
            "similarity {similarity:.2} below equivalence threshold {:.2}",
            thresholds.equivalence
        ),
        requires_review: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::normalized::MatchMethod;
    use crate::similarity::SimilarityError;
    use async_trait::async_trait;

    /// Returns a fixed score, or errors when `score` is None.
    struct StubProvider {
        score: Option<f64>,
    }

    #[async_trait]
    impl SimilarityProvider for StubProvider {
        async fn similarity(&self, _a: &str, _b: &str) -> Result<f64, SimilarityError> {
            self.score
                .ok_or_else(|| SimilarityError::Unavailable("stub down".to_string()))
        }

        fn method(&self) -> MatchMethod {
            MatchMethod::Embedding
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds::default()
    }

    #[tokio::test]
    async fn test_exact_match_is_identical() {
        let d = classify_value(
            "Senior Software Engineer",
            Some("Senior Software Engineer"),
            Some(0.9),
            &StubProvider { score: Some(0.5) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Identical);
        assert_eq!(d.similarity_score, 1.0);
        assert!(!d.requires_review);
    }

    #[tokio::test]
    async fn test_normalized_match_is_identical() {
        let d = classify_value(
            "  senior  software engineer ",
            Some("Senior Software Engineer"),
            None,
            &StubProvider { score: Some(0.2) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Identical);
        assert_eq!(d.similarity_score, 1.0);
    }

    #[tokio::test]
    async fn test_similar_value_is_equivalent_with_review() {
        // "Sr. Engineer" vs "Senior Engineer" at similarity 0.93:
        // equivalent, but below the 0.95 review ceiling.
        let d = classify_value(
            "Senior Engineer",
            Some("Sr. Engineer"),
            Some(0.9),
            &StubProvider { score: Some(0.93) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Equivalent);
        assert_eq!(d.similarity_score, 0.93);
        assert!(d.requires_review);
    }

    #[tokio::test]
    async fn test_high_similarity_equivalent_without_review() {
        let d = classify_value(
            "Software Engineer II",
            Some("Software Engineer 2"),
            Some(0.9),
            &StubProvider { score: Some(0.97) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Equivalent);
        assert!(!d.requires_review);
    }

    #[tokio::test]
    async fn test_equivalence_boundary_is_inclusive() {
        let d = classify_value(
            "a",
            Some("b"),
            None,
            &StubProvider { score: Some(0.90) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Equivalent);
    }

    #[tokio::test]
    async fn test_review_ceiling_boundary_is_exclusive() {
        let d = classify_value(
            "a",
            Some("b"),
            None,
            &StubProvider { score: Some(0.95) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Equivalent);
        assert!(!d.requires_review);
    }

    #[tokio::test]
    async fn test_low_similarity_is_conflicting() {
        let d = classify_value(
            "Google",
            Some("Harvard University"),
            Some(0.9),
            &StubProvider { score: Some(0.3) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Conflicting);
        assert!(d.requires_review);
    }

    #[tokio::test]
    async fn test_no_confirmed_value_is_new() {
        // Scenario: no confirmed skill.category yet, parsed value "Python".
        let d = classify_value(
            "Python",
            None,
            Some(0.9),
            &StubProvider { score: Some(0.99) },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::New);
        assert_eq!(d.similarity_score, 0.0);
        assert!(!d.requires_review);
    }

    #[tokio::test]
    async fn test_new_with_low_confidence_requires_review() {
        let d = classify_value(
            "Python",
            None,
            Some(0.5),
            &StubProvider { score: None },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::New);
        assert!(d.requires_review);
    }

    #[tokio::test]
    async fn test_review_threshold_boundary_passes() {
        let d = classify_value(
            "Python",
            None,
            Some(0.85),
            &StubProvider { score: None },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::New);
        assert!(!d.requires_review);
    }

    #[tokio::test]
    async fn test_missing_confidence_on_new_requires_review() {
        let d = classify_value(
            "Python",
            None,
            None,
            &StubProvider { score: None },
            &thresholds(),
        )
        .await;
        assert!(d.requires_review);
    }

    #[tokio::test]
    async fn test_provider_outage_degrades_to_conflicting() {
        let d = classify_value(
            "Senior Engineer",
            Some("Sr. Engineer"),
            Some(0.9),
            &StubProvider { score: None },
            &thresholds(),
        )
        .await;
        assert_eq!(d.diff_type, DiffType::Conflicting);
        assert!(d.requires_review);
        assert!(d.justification.contains("degraded"));
    }

    #[tokio::test]
    async fn test_classification_is_deterministic() {
        let stub = StubProvider { score: Some(0.93) };
        let a = classify_value("x", Some("y"), Some(0.8), &stub, &thresholds()).await;
        let b = classify_value("x", Some("y"), Some(0.8), &stub, &thresholds()).await;
        assert_eq!(a.diff_type, b.diff_type);
        assert_eq!(a.similarity_score, b.similarity_score);
        assert_eq!(a.requires_review, b.requires_review);
        assert_eq!(a.justification, b.justification);
    }
}
