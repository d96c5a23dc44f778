use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::parsed::ParsedEntityRow;
use crate::models::pipeline::{Stage, StageJobRow};
use crate::pipeline::timeline::{
    get_timeline, mark_stage_completed, record_stage_failure, skip_stage, Timeline,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterParsedRequest {
    pub user_id: Uuid,
    pub entities: Vec<ParsedEntityInput>,
}

#[derive(Deserialize)]
pub struct ParsedEntityInput {
    pub entity_type: String,
    pub field_name: String,
    pub raw_value: String,
    pub confidence: Option<f64>,
    pub profile_entity_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RegisterParsedResponse {
    pub resume_version_id: Uuid,
    pub registered: usize,
    pub entities: Vec<ParsedEntityRow>,
}

#[derive(Deserialize)]
pub struct StageReportRequest {
    pub status: String,
    pub error_message: Option<String>,
}

/// GET /api/v1/resumes/:version_id/timeline
pub async fn handle_get_timeline(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<Timeline>, AppError> {
    let timeline = get_timeline(&state.db, version_id).await?;
    Ok(Json(timeline))
}

/// POST /api/v1/resumes/:version_id/parsed
///
/// The boundary to the external parsing collaborator: registers its output
/// and records the upload and parse stages as completed.
pub async fn handle_register_parsed(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
    Json(req): Json<RegisterParsedRequest>,
) -> Result<Json<RegisterParsedResponse>, AppError> {
    if req.entities.is_empty() {
        return Err(AppError::Validation(
            "At least one parsed entity is required".to_string(),
        ));
    }

    let mut rows = Vec::with_capacity(req.entities.len());
    for input in &req.entities {
        let row = sqlx::query_as::<_, ParsedEntityRow>(
            r#"
            INSERT INTO parsed_entities
                (id, resume_version_id, user_id, entity_type, field_name,
                 raw_value, profile_entity_id, confidence)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(version_id)
        .bind(req.user_id)
        .bind(&input.entity_type)
        .bind(&input.field_name)
        .bind(&input.raw_value)
        .bind(input.profile_entity_id)
        .bind(input.confidence)
        .fetch_one(&state.db)
        .await?;
        rows.push(row);
    }

    mark_stage_completed(&state.db, version_id, Stage::Upload).await?;
    mark_stage_completed(&state.db, version_id, Stage::Parse).await?;

    Ok(Json(RegisterParsedResponse {
        resume_version_id: version_id,
        registered: rows.len(),
        entities: rows,
    }))
}

/// POST /api/v1/resumes/:version_id/stages/:stage/report
///
/// Status reporting for stages the orchestrator wraps but does not execute
/// (enrich, review, update, and retries of upload/parse).
pub async fn handle_report_stage(
    State(state): State<AppState>,
    Path((version_id, stage)): Path<(Uuid, String)>,
    Json(req): Json<StageReportRequest>,
) -> Result<Json<StageJobRow>, AppError> {
    let stage = Stage::parse(&stage)?;
    let row = match req.status.as_str() {
        "completed" => mark_stage_completed(&state.db, version_id, stage).await?,
        "skipped" => skip_stage(&state.db, version_id, stage).await?,
        "failed" => {
            let message = req.error_message.as_deref().unwrap_or("unknown failure");
            record_stage_failure(&state.db, version_id, stage, message).await?
        }
        other => {
            return Err(AppError::Validation(format!(
                "Stage reports accept 'completed', 'failed' or 'skipped', got '{other}'"
            )))
        }
    };
    Ok(Json(row))
}
