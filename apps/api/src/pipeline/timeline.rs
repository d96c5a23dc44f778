//! Stage status for one resume version.
//!
//! The orchestrator does not execute parsing or enrichment; it records and
//! derives status from stage job rows. Stages run in strict order; a failed
//! stage is terminal for the run and downstream stages stay pending until an
//! explicit re-invocation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pipeline::{Stage, StageJobRow, StageStatus, STAGE_ORDER};

#[derive(Debug, Clone, Serialize)]
pub struct StageState {
    pub name: &'static str,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Timeline {
    pub resume_version_id: Uuid,
    pub stages: Vec<StageState>,
    pub overall_status: StageStatus,
}

/// GET-timeline entry point: load job rows, derive.
pub async fn get_timeline(pool: &PgPool, resume_version_id: Uuid) -> Result<Timeline, AppError> {
    let rows = load_stage_jobs(pool, resume_version_id).await?;
    Ok(derive_timeline(resume_version_id, &rows))
}

/// Starts a stage run. Fails with `Validation` unless the predecessor stage
/// has completed (or was explicitly skipped). Starting a stage whose last
/// run failed is allowed: that IS the explicit retry.
pub async fn start_stage(
    pool: &PgPool,
    resume_version_id: Uuid,
    stage: Stage,
) -> Result<StageJobRow, AppError> {
    let rows = load_stage_jobs(pool, resume_version_id).await?;

    if let Some(pred) = stage.predecessor() {
        if !predecessor_satisfied(pred, &rows) {
            return Err(AppError::Validation(format!(
                "Stage '{}' cannot start: predecessor '{}' has not completed",
                stage.as_str(),
                pred.as_str()
            )));
        }
    }

    let row = insert_stage_job(pool, resume_version_id, stage, StageStatus::InProgress).await?;
    info!(
        "Stage '{}' started for resume version {}",
        stage.as_str(),
        resume_version_id
    );
    Ok(row)
}

pub async fn complete_stage(pool: &PgPool, job_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE resume_stage_jobs SET status = 'completed', completed_at = NOW() WHERE id = $1",
    )
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail_stage(pool: &PgPool, job_id: Uuid, error_message: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE resume_stage_jobs
        SET status = 'failed', completed_at = NOW(), error_message = $2
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(error_message)
    .execute(pool)
    .await?;
    Ok(())
}

/// Records an externally-executed stage (upload, parse) as already done.
pub async fn mark_stage_completed(
    pool: &PgPool,
    resume_version_id: Uuid,
    stage: Stage,
) -> Result<StageJobRow, AppError> {
    insert_stage_job(pool, resume_version_id, stage, StageStatus::Completed).await
}

/// Records an externally-executed stage as failed. Downstream stages stay
/// pending until an explicit retry.
pub async fn record_stage_failure(
    pool: &PgPool,
    resume_version_id: Uuid,
    stage: Stage,
    error_message: &str,
) -> Result<StageJobRow, AppError> {
    let row = insert_stage_job(pool, resume_version_id, stage, StageStatus::InProgress).await?;
    fail_stage(pool, row.id, error_message).await?;
    Ok(StageJobRow {
        status: StageStatus::Failed.as_str().to_string(),
        error_message: Some(error_message.to_string()),
        ..row
    })
}

/// Explicit external skip. The orchestrator never skips on its own.
pub async fn skip_stage(
    pool: &PgPool,
    resume_version_id: Uuid,
    stage: Stage,
) -> Result<StageJobRow, AppError> {
    insert_stage_job(pool, resume_version_id, stage, StageStatus::Skipped).await
}

async fn insert_stage_job(
    pool: &PgPool,
    resume_version_id: Uuid,
    stage: Stage,
    status: StageStatus,
) -> Result<StageJobRow, AppError> {
    let completed = matches!(status, StageStatus::Completed | StageStatus::Skipped);
    Ok(sqlx::query_as::<_, StageJobRow>(
        r#"
        INSERT INTO resume_stage_jobs
            (id, resume_version_id, stage, status, started_at, completed_at)
        VALUES ($1, $2, $3, $4, NOW(), CASE WHEN $5 THEN NOW() END)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(resume_version_id)
    .bind(stage.as_str())
    .bind(status.as_str())
    .bind(completed)
    .fetch_one(pool)
    .await?)
}

async fn load_stage_jobs(
    pool: &PgPool,
    resume_version_id: Uuid,
) -> Result<Vec<StageJobRow>, AppError> {
    Ok(sqlx::query_as::<_, StageJobRow>(
        "SELECT * FROM resume_stage_jobs WHERE resume_version_id = $1 ORDER BY created_at",
    )
    .bind(resume_version_id)
    .fetch_all(pool)
    .await?)
}

/// Derives the per-stage view from job rows. The newest row per stage wins;
/// stages with no row are pending.
pub fn derive_timeline(resume_version_id: Uuid, rows: &[StageJobRow]) -> Timeline {
    let stages: Vec<StageState> = STAGE_ORDER
        .iter()
        .map(|stage| {
            // rows are ordered by created_at, so the last match is newest
            let latest = rows.iter().rev().find(|r| r.stage == stage.as_str());
            match latest {
                Some(row) => StageState {
                    name: stage.as_str(),
                    status: parse_status(&row.status),
                    started_at: row.started_at,
                    completed_at: row.completed_at,
                    error_message: row.error_message.clone(),
                },
                None => StageState {
                    name: stage.as_str(),
                    status: StageStatus::Pending,
                    started_at: None,
                    completed_at: None,
                    error_message: None,
                },
            }
        })
        .collect();

    let overall_status = derive_overall(&stages);
    Timeline {
        resume_version_id,
        stages,
        overall_status,
    }
}

fn derive_overall(stages: &[StageState]) -> StageStatus {
    if stages.iter().any(|s| s.status == StageStatus::Failed) {
        return StageStatus::Failed;
    }
    if stages
        .iter()
        .all(|s| matches!(s.status, StageStatus::Completed | StageStatus::Skipped))
    {
        return StageStatus::Completed;
    }
    if stages
        .iter()
        .any(|s| !matches!(s.status, StageStatus::Pending))
    {
        return StageStatus::InProgress;
    }
    StageStatus::Pending
}

/// True when the predecessor's newest run is completed or skipped.
pub fn predecessor_satisfied(pred: Stage, rows: &[StageJobRow]) -> bool {
    rows.iter()
        .rev()
        .find(|r| r.stage == pred.as_str())
        .map(|r| matches!(parse_status(&r.status), StageStatus::Completed | StageStatus::Skipped))
        .unwrap_or(false)
}

fn parse_status(s: &str) -> StageStatus {
    match s {
        "in_progress" => StageStatus::InProgress,
        "completed" => StageStatus::Completed,
        "failed" => StageStatus::Failed,
        "skipped" => StageStatus::Skipped,
        _ => StageStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job(stage: Stage, status: &str, seq: i64) -> StageJobRow {
        let t = Utc.timestamp_opt(1_700_000_000 + seq, 0).unwrap();
        StageJobRow {
            id: Uuid::new_v4(),
            resume_version_id: Uuid::nil(),
            stage: stage.as_str().to_string(),
            status: status.to_string(),
            started_at: Some(t),
            completed_at: None,
            error_message: None,
            created_at: t,
        }
    }

    #[test]
    fn test_empty_rows_all_pending() {
        let t = derive_timeline(Uuid::nil(), &[]);
        assert_eq!(t.stages.len(), 7);
        assert!(t.stages.iter().all(|s| s.status == StageStatus::Pending));
        assert_eq!(t.overall_status, StageStatus::Pending);
    }

    #[test]
    fn test_failed_stage_is_terminal_for_overall() {
        let rows = vec![
            job(Stage::Upload, "completed", 0),
            job(Stage::Parse, "failed", 1),
        ];
        let t = derive_timeline(Uuid::nil(), &rows);
        assert_eq!(t.overall_status, StageStatus::Failed);
        // downstream stages remain pending
        assert_eq!(t.stages[2].status, StageStatus::Pending);
    }

    #[test]
    fn test_newest_row_wins_per_stage() {
        // A failed run followed by an explicit retry that completed.
        let rows = vec![
            job(Stage::Upload, "failed", 0),
            job(Stage::Upload, "completed", 1),
        ];
        let t = derive_timeline(Uuid::nil(), &rows);
        assert_eq!(t.stages[0].status, StageStatus::Completed);
        assert_eq!(t.overall_status, StageStatus::InProgress);
    }

    #[test]
    fn test_all_completed_overall_completed() {
        let rows: Vec<_> = STAGE_ORDER
            .iter()
            .enumerate()
            .map(|(i, s)| job(*s, "completed", i as i64))
            .collect();
        let t = derive_timeline(Uuid::nil(), &rows);
        assert_eq!(t.overall_status, StageStatus::Completed);
    }

    #[test]
    fn test_skipped_counts_toward_completion() {
        let mut rows: Vec<_> = STAGE_ORDER
            .iter()
            .enumerate()
            .map(|(i, s)| job(*s, "completed", i as i64))
            .collect();
        rows[4] = job(Stage::Enrich, "skipped", 4);
        let t = derive_timeline(Uuid::nil(), &rows);
        assert_eq!(t.overall_status, StageStatus::Completed);
    }

    #[test]
    fn test_predecessor_gate() {
        let rows = vec![job(Stage::Upload, "completed", 0)];
        assert!(predecessor_satisfied(Stage::Upload, &rows));
        assert!(!predecessor_satisfied(Stage::Parse, &rows));
    }

    #[test]
    fn test_predecessor_gate_rejects_in_progress() {
        let rows = vec![job(Stage::Upload, "in_progress", 0)];
        assert!(!predecessor_satisfied(Stage::Upload, &rows));
    }

    #[test]
    fn test_predecessor_accepts_skipped() {
        let rows = vec![job(Stage::Upload, "skipped", 0)];
        assert!(predecessor_satisfied(Stage::Upload, &rows));
    }

    #[test]
    fn test_stage_order_predecessors() {
        assert_eq!(Stage::Upload.predecessor(), None);
        assert_eq!(Stage::Diff.predecessor(), Some(Stage::Parse));
        assert_eq!(Stage::Update.predecessor(), Some(Stage::Review));
    }
}
