use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

/// The five kinds of logical entities a profile is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    WorkExperience,
    Education,
    Skill,
    Project,
    Certification,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::WorkExperience => "work_experience",
            EntityType::Education => "education",
            EntityType::Skill => "skill",
            EntityType::Project => "project",
            EntityType::Certification => "certification",
        }
    }

    /// Parses a path/query segment. Unknown values are a caller error.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "work_experience" => Ok(EntityType::WorkExperience),
            "education" => Ok(EntityType::Education),
            "skill" => Ok(EntityType::Skill),
            "project" => Ok(EntityType::Project),
            "certification" => Ok(EntityType::Certification),
            other => Err(AppError::Validation(format!(
                "Unknown entity type '{other}'"
            ))),
        }
    }
}

/// Where a version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Manual,
    AiExtraction,
    UserAcceptance,
    System,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::AiExtraction => "ai_extraction",
            Source::UserAcceptance => "user_acceptance",
            Source::System => "system",
        }
    }
}

/// One immutable row in a logical entity's version chain.
/// Rows are only ever INSERTed; "current" is the max active version.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EntityVersionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub logical_entity_id: Uuid,
    pub entity_type: String,
    pub version: i32,
    pub is_active: bool,
    pub source: String,
    pub source_confidence: Option<f64>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user's currently-accepted scalar value for one field.
/// At most one row per (user_id, entity_type, entity_id, field_name).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfirmedFieldRow {
    pub user_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub field_name: String,
    pub value: String,
    pub confidence_score: Option<f64>,
    pub last_confirmed_at: DateTime<Utc>,
}
