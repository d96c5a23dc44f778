/// Embedding service client — the single point of entry for all embedding
/// calls in Meridian. No other module may talk to the service directly.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{normalize_value, SimilarityError, SimilarityProvider};
use crate::models::normalized::MatchMethod;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Service returned {got} vectors, expected {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("Service unavailable after {retries} retries")]
    Unavailable { retries: u32 },
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f64>>,
}

/// Wraps the embedding HTTP service with retry logic.
/// Retries on connection errors, 429 and 5xx with exponential backoff.
#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
}

impl EmbeddingClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
        }
    }

    /// Embeds a batch of texts, preserving input order.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        let request_body = EmbedRequest {
            texts: texts.to_vec(),
        };
        let url = format!("{}/embed", self.base_url.trim_end_matches('/'));

        let mut last_error: Option<EmbeddingError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(&request_body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbeddingError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Embedding service returned {}: {}", status, body);
                last_error = Some(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let parsed: EmbedResponse = response.json().await?;

            if parsed.embeddings.len() != texts.len() {
                return Err(EmbeddingError::ShapeMismatch {
                    expected: texts.len(),
                    got: parsed.embeddings.len(),
                });
            }

            debug!("Embedded {} texts", texts.len());
            return Ok(parsed.embeddings);
        }

        Err(last_error.unwrap_or(EmbeddingError::Unavailable {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl SimilarityProvider for EmbeddingClient {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64, SimilarityError> {
        let a = normalize_value(a);
        let b = normalize_value(b);
        let vectors = self
            .embed(&[a.as_str(), b.as_str()])
            .await
            .map_err(|e| SimilarityError::Unavailable(e.to_string()))?;
        Ok(cosine_similarity(&vectors[0], &vectors[1]))
    }

    fn method(&self) -> MatchMethod {
        MatchMethod::Embedding
    }
}

/// Cosine similarity clamped to 0.0–1.0. Zero vectors score 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let v = vec![0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_negative_clamped() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }
}
