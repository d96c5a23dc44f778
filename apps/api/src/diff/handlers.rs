use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::diff::runner::{run_diff_stage, DiffRunSummary};
use crate::errors::AppError;
use crate::models::diff::ResumeDiffRow;
use crate::state::AppState;

/// POST /api/v1/resumes/:version_id/diff
pub async fn handle_run_diff(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<DiffRunSummary>, AppError> {
    let summary = run_diff_stage(
        &state.db,
        state.similarity.as_ref(),
        &state.config.thresholds,
        version_id,
    )
    .await?;
    Ok(Json(summary))
}

/// GET /api/v1/resumes/:version_id/diffs
pub async fn handle_list_diffs(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
) -> Result<Json<Vec<ResumeDiffRow>>, AppError> {
    let diffs = sqlx::query_as::<_, ResumeDiffRow>(
        "SELECT * FROM resume_diffs WHERE resume_version_id = $1 ORDER BY created_at",
    )
    .bind(version_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(diffs))
}
