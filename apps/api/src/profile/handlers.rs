use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::entity::{EntityType, EntityVersionRow, Source};
use crate::profile::store::{self, NewEntity};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateEntityRequest {
    pub user_id: Uuid,
    pub data: Value,
    pub source: Source,
    pub source_confidence: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateEntityRequest {
    pub user_id: Uuid,
    pub data: Value,
    pub source: Source,
    pub source_confidence: Option<f64>,
}

#[derive(Deserialize)]
pub struct DeleteEntityRequest {
    pub user_id: Uuid,
    pub source: Source,
}

/// GET /api/v1/profile/:entity_type
pub async fn handle_get_latest(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<EntityVersionRow>>, AppError> {
    let entity_type = EntityType::parse(&entity_type)?;
    let entities = store::get_latest(&state.db, entity_type, params.user_id).await?;
    Ok(Json(entities))
}

/// POST /api/v1/profile/:entity_type
pub async fn handle_create(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Json(req): Json<CreateEntityRequest>,
) -> Result<Json<EntityVersionRow>, AppError> {
    let entity_type = EntityType::parse(&entity_type)?;
    let row = store::create(
        &state.db,
        entity_type,
        NewEntity {
            user_id: req.user_id,
            data: &req.data,
            source: req.source,
            source_confidence: req.source_confidence,
        },
    )
    .await?;
    Ok(Json(row))
}

/// PATCH /api/v1/profile/:entity_type/:logical_id
pub async fn handle_update(
    State(state): State<AppState>,
    Path((entity_type, logical_id)): Path<(String, Uuid)>,
    Json(req): Json<UpdateEntityRequest>,
) -> Result<Json<EntityVersionRow>, AppError> {
    let entity_type = EntityType::parse(&entity_type)?;
    let row = store::update(
        &state.db,
        entity_type,
        req.user_id,
        logical_id,
        &req.data,
        req.source,
        req.source_confidence,
    )
    .await?;
    Ok(Json(row))
}

/// DELETE /api/v1/profile/:entity_type/:logical_id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path((entity_type, logical_id)): Path<(String, Uuid)>,
    Json(req): Json<DeleteEntityRequest>,
) -> Result<Json<EntityVersionRow>, AppError> {
    let entity_type = EntityType::parse(&entity_type)?;
    let row =
        store::soft_delete(&state.db, entity_type, req.user_id, logical_id, req.source).await?;
    Ok(Json(row))
}

/// GET /api/v1/profile/:entity_type/:logical_id/history
pub async fn handle_history(
    State(state): State<AppState>,
    Path((entity_type, logical_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<EntityVersionRow>>, AppError> {
    let entity_type = EntityType::parse(&entity_type)?;
    let history = store::get_history(&state.db, entity_type, logical_id).await?;
    Ok(Json(history))
}
