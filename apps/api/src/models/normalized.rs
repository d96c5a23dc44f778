use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    Pending,
    Flagged,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Approved => "approved",
            ReviewStatus::Pending => "pending",
            ReviewStatus::Flagged => "flagged",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "approved" => Ok(ReviewStatus::Approved),
            "pending" => Ok(ReviewStatus::Pending),
            "flagged" => Ok(ReviewStatus::Flagged),
            other => Err(AppError::Validation(format!(
                "Unknown review status '{other}'"
            ))),
        }
    }
}

/// How a parsed mention was matched to a canonical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Embedding,
    Fuzzy,
    Llm,
    Manual,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Embedding => "embedding",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Llm => "llm",
            MatchMethod::Manual => "manual",
        }
    }
}

/// A deduplicated, cross-user canonical node (e.g. "Google" as a company).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NormalizedEntityRow {
    pub id: Uuid,
    pub entity_type: String,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub confidence_score: f64,
    pub review_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parsed mention → canonical node edge.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeEntityLinkRow {
    pub id: Uuid,
    pub parsed_entity_id: Uuid,
    pub normalized_entity_id: Uuid,
    pub match_method: String,
    pub match_score: f64,
    pub review_required: bool,
    pub created_at: DateTime<Utc>,
}
