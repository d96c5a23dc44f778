use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

/// Pipeline stages in strict execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    Parse,
    Diff,
    Normalize,
    Enrich,
    Review,
    Update,
}

/// Execution order. A stage only starts once its predecessor completed.
pub const STAGE_ORDER: [Stage; 7] = [
    Stage::Upload,
    Stage::Parse,
    Stage::Diff,
    Stage::Normalize,
    Stage::Enrich,
    Stage::Review,
    Stage::Update,
];

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::Parse => "parse",
            Stage::Diff => "diff",
            Stage::Normalize => "normalize",
            Stage::Enrich => "enrich",
            Stage::Review => "review",
            Stage::Update => "update",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        STAGE_ORDER
            .iter()
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or_else(|| AppError::Validation(format!("Unknown stage '{s}'")))
    }

    pub fn predecessor(&self) -> Option<Stage> {
        let idx = STAGE_ORDER.iter().position(|s| s == self)?;
        if idx == 0 {
            None
        } else {
            Some(STAGE_ORDER[idx - 1])
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

/// One stage run for one resume version. The orchestrator derives the
/// timeline from these rows; it never executes stage work itself.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StageJobRow {
    pub id: Uuid,
    pub resume_version_id: Uuid,
    pub stage: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
