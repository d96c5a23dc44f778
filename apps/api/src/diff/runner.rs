//! The diff stage: classify every parsed field of a resume version against
//! the user's confirmed profile and persist the resulting diff rows.
//!
//! One item's failure never aborts the batch; failures are collected into
//! the summary, and the caller always sees counts rather than a boolean.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::Thresholds;
use crate::diff::classifier::classify_value;
use crate::errors::AppError;
use crate::models::diff::{DiffType, ResumeDiffRow};
use crate::models::parsed::ParsedEntityRow;
use crate::models::pipeline::Stage;
use crate::pipeline::timeline::{complete_stage, fail_stage, start_stage};
use crate::profile::confirmed::get_confirmed;
use crate::similarity::SimilarityProvider;

#[derive(Debug, Serialize)]
pub struct DiffItemError {
    pub parsed_entity_id: Uuid,
    pub field_name: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DiffRunSummary {
    pub resume_version_id: Uuid,
    pub total: usize,
    pub identical: usize,
    pub equivalent: usize,
    pub conflicting: usize,
    pub new: usize,
    pub requires_review: usize,
    pub errors: Vec<DiffItemError>,
}

pub async fn run_diff_stage(
    pool: &PgPool,
    provider: &dyn SimilarityProvider,
    thresholds: &Thresholds,
    resume_version_id: Uuid,
) -> Result<DiffRunSummary, AppError> {
    let job = start_stage(pool, resume_version_id, Stage::Diff).await?;

    let parsed = match load_parsed_entities(pool, resume_version_id).await {
        Ok(rows) => rows,
        Err(e) => {
            fail_stage(pool, job.id, &e.to_string()).await?;
            return Err(e);
        }
    };

    let mut summary = DiffRunSummary {
        resume_version_id,
        total: parsed.len(),
        identical: 0,
        equivalent: 0,
        conflicting: 0,
        new: 0,
        requires_review: 0,
        errors: Vec::new(),
    };

    for entity in &parsed {
        match classify_parsed(pool, provider, thresholds, entity).await {
            Ok(diff) => {
                match diff.diff_type.as_str() {
                    "identical" => summary.identical += 1,
                    "equivalent" => summary.equivalent += 1,
                    "new" => summary.new += 1,
                    _ => summary.conflicting += 1,
                }
                if diff.requires_review {
                    summary.requires_review += 1;
                }
            }
            Err(e) => summary.errors.push(DiffItemError {
                parsed_entity_id: entity.id,
                field_name: entity.field_name.clone(),
                message: e.to_string(),
            }),
        }
    }

    complete_stage(pool, job.id).await?;
    info!(
        "Diff stage for resume version {}: {} fields, {} flagged for review, {} errors",
        resume_version_id,
        summary.total,
        summary.requires_review,
        summary.errors.len()
    );
    Ok(summary)
}

async fn load_parsed_entities(
    pool: &PgPool,
    resume_version_id: Uuid,
) -> Result<Vec<ParsedEntityRow>, AppError> {
    Ok(sqlx::query_as::<_, ParsedEntityRow>(
        "SELECT * FROM parsed_entities WHERE resume_version_id = $1 ORDER BY created_at",
    )
    .bind(resume_version_id)
    .fetch_all(pool)
    .await?)
}

/// Classifies one parsed field and upserts its diff row. Re-running the diff
/// stage for the same resume version refreshes rows in place; the
/// (resume_version_id, parsed_entity_id, field_name) key stays unique.
async fn classify_parsed(
    pool: &PgPool,
    provider: &dyn SimilarityProvider,
    thresholds: &Thresholds,
    entity: &ParsedEntityRow,
) -> Result<ResumeDiffRow, AppError> {
    let confirmed = match entity.profile_entity_id {
        Some(profile_entity_id) => {
            get_confirmed(
                pool,
                entity.user_id,
                &entity.entity_type,
                profile_entity_id,
                &entity.field_name,
            )
            .await?
        }
        None => None,
    };

    let classified = classify_value(
        &entity.raw_value,
        confirmed.as_ref().map(|c| c.value.as_str()),
        entity.confidence,
        provider,
        thresholds,
    )
    .await;

    // A `new` diff carries no profile reference, even when the parser
    // guessed a target that turned out to have no confirmed value.
    let (profile_entity_id, profile_entity_type) = match (&classified.diff_type, &confirmed) {
        (DiffType::New, _) | (_, None) => (None, None),
        (_, Some(c)) => (Some(c.entity_id), Some(c.entity_type.clone())),
    };

    Ok(sqlx::query_as::<_, ResumeDiffRow>(
        r#"
        INSERT INTO resume_diffs
            (id, resume_version_id, parsed_entity_id, field_name, diff_type,
             similarity_score, confidence_score, justification, requires_review,
             profile_entity_id, profile_entity_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (resume_version_id, parsed_entity_id, field_name)
        DO UPDATE SET
            diff_type = $5, similarity_score = $6, confidence_score = $7,
            justification = $8, requires_review = $9,
            profile_entity_id = $10, profile_entity_type = $11
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entity.resume_version_id)
    .bind(entity.id)
    .bind(&entity.field_name)
    .bind(classified.diff_type.as_str())
    .bind(classified.similarity_score)
    .bind(classified.confidence_score)
    .bind(&classified.justification)
    .bind(classified.requires_review)
    .bind(profile_entity_id)
    .bind(profile_entity_type)
    .fetch_one(pool)
    .await?)
}
