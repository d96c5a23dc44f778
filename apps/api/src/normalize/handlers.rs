use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::normalized::{NormalizedEntityRow, ReviewStatus};
use crate::models::parsed::ParsedEntityRow;
use crate::normalize::bulk::{run_normalize_stage, NormalizeRunSummary};
use crate::normalize::graph::{self, LinkOutcome, ScoredEntity};
use crate::normalize::privilege::require_admin;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub parsed_entity_id: Uuid,
}

#[derive(Deserialize)]
pub struct SimilarQuery {
    pub parsed_entity_id: Uuid,
    pub threshold: Option<f64>,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub target_id: Uuid,
    pub actor_id: Uuid,
}

#[derive(Deserialize)]
pub struct ReviewStatusRequest {
    pub review_status: String,
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub actor_id: Uuid,
}

/// POST /api/v1/normalized/resolve
pub async fn handle_resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<LinkOutcome>, AppError> {
    let parsed =
        sqlx::query_as::<_, ParsedEntityRow>("SELECT * FROM parsed_entities WHERE id = $1")
            .bind(req.parsed_entity_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Parsed entity {} not found", req.parsed_entity_id))
            })?;

    let outcome = graph::find_or_create(
        &state.db,
        state.similarity.as_ref(),
        &state.config.thresholds,
        &parsed,
    )
    .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/normalized/similar
pub async fn handle_find_similar(
    State(state): State<AppState>,
    Query(params): Query<SimilarQuery>,
) -> Result<Json<Vec<ScoredEntity>>, AppError> {
    let threshold = params
        .threshold
        .unwrap_or(state.config.thresholds.auto_link_floor);
    let matches = graph::find_similar(
        &state.db,
        state.similarity.as_ref(),
        params.parsed_entity_id,
        threshold,
    )
    .await?;
    Ok(Json(matches))
}

/// POST /api/v1/normalized/:id/merge — admin only.
pub async fn handle_merge(
    State(state): State<AppState>,
    Path(source_id): Path<Uuid>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<NormalizedEntityRow>, AppError> {
    require_admin(&state.db, &state.admin_cache, req.actor_id).await?;
    let merged = graph::merge(&state.db, source_id, req.target_id, req.actor_id).await?;
    Ok(Json(merged))
}

/// PATCH /api/v1/normalized/:id/review-status
pub async fn handle_set_review_status(
    State(state): State<AppState>,
    Path(entity_id): Path<Uuid>,
    Json(req): Json<ReviewStatusRequest>,
) -> Result<Json<NormalizedEntityRow>, AppError> {
    let status = ReviewStatus::parse(&req.review_status)?;
    let updated = graph::set_review_status(&state.db, entity_id, status).await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/normalized/:id — admin only.
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(entity_id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<StatusCode, AppError> {
    require_admin(&state.db, &state.admin_cache, req.actor_id).await?;
    graph::delete_node(&state.db, entity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/resumes/:version_id/normalize
pub async fn handle_run_normalize(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<NormalizeRunSummary>, AppError> {
    let summary = run_normalize_stage(
        &state.db,
        state.similarity.as_ref(),
        &state.config.thresholds,
        version_id,
    )
    .await?;
    Ok(Json(summary))
}
