use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Four-way outcome of comparing a parsed value to a confirmed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    Identical,
    Equivalent,
    Conflicting,
    New,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Identical => "identical",
            DiffType::Equivalent => "equivalent",
            DiffType::Conflicting => "conflicting",
            DiffType::New => "new",
        }
    }
}

/// One classified diff, keyed (resume_version_id, parsed_entity_id, field_name).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeDiffRow {
    pub id: Uuid,
    pub resume_version_id: Uuid,
    pub parsed_entity_id: Uuid,
    pub field_name: String,
    pub diff_type: String,
    pub similarity_score: f64,
    pub confidence_score: Option<f64>,
    /// Names the classification rule that fired and the measured score.
    pub justification: String,
    pub requires_review: bool,
    /// Absent when diff_type = new.
    pub profile_entity_id: Option<Uuid>,
    pub profile_entity_type: Option<String>,
    pub created_at: DateTime<Utc>,
}
