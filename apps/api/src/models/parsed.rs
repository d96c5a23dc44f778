use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A raw field extracted from an uploaded resume by the external parser.
/// Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParsedEntityRow {
    pub id: Uuid,
    pub resume_version_id: Uuid,
    pub user_id: Uuid,
    pub entity_type: String,
    pub field_name: String,
    pub raw_value: String,
    /// The profile entity this field was extracted for, when the parser
    /// could tell. Absent for fields with no existing profile target.
    pub profile_entity_id: Option<Uuid>,
    /// Parser/embedding confidence, carried through classification untouched.
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}
