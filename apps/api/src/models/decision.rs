use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Accept,
    Reject,
    Override,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Accept => "accept",
            DecisionType::Reject => "reject",
            DecisionType::Override => "override",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "accept" => Ok(DecisionType::Accept),
            "reject" => Ok(DecisionType::Reject),
            "override" => Ok(DecisionType::Override),
            other => Err(AppError::Validation(format!(
                "Unknown decision type '{other}'"
            ))),
        }
    }
}

/// One recorded resolution of a diffed field. At most one row per
/// (parsed_entity_id, field_name); `applied_at` marks it as already applied.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MergeDecisionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resume_version_id: Uuid,
    pub parsed_entity_id: Uuid,
    pub field_name: String,
    pub decision_type: String,
    pub parsed_value: String,
    pub confirmed_value: Option<String>,
    /// Required iff decision_type = override.
    pub override_value: Option<String>,
    pub justification: String,
    pub confidence_score: Option<f64>,
    pub applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
