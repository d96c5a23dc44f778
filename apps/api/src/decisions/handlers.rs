use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decisions::ledger::{
    apply_all, apply_decision, create_decision, ApplyOutcome, ApplySummary, NewDecision,
};
use crate::errors::AppError;
use crate::models::decision::{DecisionType, MergeDecisionRow};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateDecisionRequest {
    pub user_id: Uuid,
    pub resume_version_id: Uuid,
    pub parsed_entity_id: Uuid,
    pub field_name: String,
    pub decision_type: String,
    pub parsed_value: String,
    pub confirmed_value: Option<String>,
    pub override_value: Option<String>,
    pub justification: String,
    pub confidence_score: Option<f64>,
}

#[derive(Serialize)]
pub struct ApplyResponse {
    pub decision_id: Uuid,
    pub outcome: ApplyOutcome,
}

/// POST /api/v1/decisions
pub async fn handle_create_decision(
    State(state): State<AppState>,
    Json(req): Json<CreateDecisionRequest>,
) -> Result<Json<MergeDecisionRow>, AppError> {
    let decision_type = DecisionType::parse(&req.decision_type)?;
    let decision = create_decision(
        &state.db,
        NewDecision {
            user_id: req.user_id,
            resume_version_id: req.resume_version_id,
            parsed_entity_id: req.parsed_entity_id,
            field_name: &req.field_name,
            decision_type,
            parsed_value: &req.parsed_value,
            confirmed_value: req.confirmed_value.as_deref(),
            override_value: req.override_value.as_deref(),
            justification: &req.justification,
            confidence_score: req.confidence_score,
        },
    )
    .await?;
    Ok(Json(decision))
}

/// POST /api/v1/decisions/:id/apply
pub async fn handle_apply_decision(
    State(state): State<AppState>,
    Path(decision_id): Path<Uuid>,
) -> Result<Json<ApplyResponse>, AppError> {
    let outcome = apply_decision(&state.db, decision_id).await?;
    Ok(Json(ApplyResponse {
        decision_id,
        outcome,
    }))
}

/// POST /api/v1/resumes/:version_id/decisions/apply-all
pub async fn handle_apply_all(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<ApplySummary>, AppError> {
    let summary = apply_all(&state.db, version_id).await?;
    Ok(Json(summary))
}

/// GET /api/v1/resumes/:version_id/decisions
pub async fn handle_list_decisions(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<Vec<MergeDecisionRow>>, AppError> {
    let decisions = sqlx::query_as::<_, MergeDecisionRow>(
        "SELECT * FROM merge_decisions WHERE resume_version_id = $1 ORDER BY created_at",
    )
    .bind(version_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(decisions))
}
