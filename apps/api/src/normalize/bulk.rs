//! Bulk normalization: link every parsed entity of a resume version to the
//! canonical graph, in small chunks with a pause between them so the
//! embedding service is never hit with the whole resume at once.
//!
//! A failing item is recorded and the rest of the batch continues.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::Thresholds;
use crate::errors::AppError;
use crate::models::parsed::ParsedEntityRow;
use crate::models::pipeline::Stage;
use crate::normalize::graph::find_or_create;
use crate::pipeline::timeline::{complete_stage, fail_stage, start_stage};
use crate::similarity::SimilarityProvider;

const CHUNK_SIZE: usize = 3;
const INTER_CHUNK_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeItemStatus {
    Linked,
    Created,
    Error,
}

#[derive(Debug, Serialize)]
pub struct NormalizeItemOutcome {
    pub parsed_entity_id: Uuid,
    pub status: NormalizeItemStatus,
    pub normalized_entity_id: Option<Uuid>,
    pub review_required: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeRunSummary {
    pub resume_version_id: Uuid,
    pub total: usize,
    pub linked: usize,
    pub created: usize,
    pub review_required: usize,
    pub errors: usize,
    pub outcomes: Vec<NormalizeItemOutcome>,
}

pub async fn run_normalize_stage(
    pool: &PgPool,
    provider: &dyn SimilarityProvider,
    thresholds: &Thresholds,
    resume_version_id: Uuid,
) -> Result<NormalizeRunSummary, AppError> {
    let job = start_stage(pool, resume_version_id, Stage::Normalize).await?;

    let parsed = match load_parsed_entities(pool, resume_version_id).await {
        Ok(rows) => rows,
        Err(e) => {
            fail_stage(pool, job.id, &e.to_string()).await?;
            return Err(e);
        }
    };

    let mut outcomes = Vec::with_capacity(parsed.len());
    let mut chunks = parsed.chunks(CHUNK_SIZE).peekable();

    while let Some(chunk) = chunks.next() {
        for entity in chunk {
            outcomes.push(normalize_one(pool, provider, thresholds, entity).await);
        }
        if chunks.peek().is_some() {
            tokio::time::sleep(std::time::Duration::from_millis(INTER_CHUNK_DELAY_MS)).await;
        }
    }

    complete_stage(pool, job.id).await?;

    let summary = summarize(resume_version_id, outcomes);
    info!(
        "Normalize stage for resume version {}: {} items, {} linked, {} created, {} errors",
        resume_version_id, summary.total, summary.linked, summary.created, summary.errors
    );
    Ok(summary)
}

async fn normalize_one(
    pool: &PgPool,
    provider: &dyn SimilarityProvider,
    thresholds: &Thresholds,
    entity: &ParsedEntityRow,
) -> NormalizeItemOutcome {
    match find_or_create(pool, provider, thresholds, entity).await {
        Ok(outcome) => NormalizeItemOutcome {
            parsed_entity_id: entity.id,
            status: if outcome.created {
                NormalizeItemStatus::Created
            } else {
                NormalizeItemStatus::Linked
            },
            normalized_entity_id: Some(outcome.normalized_entity.id),
            review_required: outcome.link.review_required,
            error: None,
        },
        Err(e) => NormalizeItemOutcome {
            parsed_entity_id: entity.id,
            status: NormalizeItemStatus::Error,
            normalized_entity_id: None,
            review_required: false,
            error: Some(e.to_string()),
        },
    }
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

fn summarize(resume_version_id: Uuid, outcomes: Vec<NormalizeItemOutcome>) -> NormalizeRunSummary {
    let mut summary = NormalizeRunSummary {
        resume_version_id,
        total: outcomes.len(),
        linked: 0,
        created: 0,
        review_required: 0,
        errors: 0,
        outcomes: Vec::new(),
    };
    for outcome in &outcomes {
        match outcome.status {
            NormalizeItemStatus::Linked => summary.linked += 1,
            NormalizeItemStatus::Created => summary.created += 1,
            NormalizeItemStatus::Error => summary.errors += 1,
        }
        if outcome.review_required {
            summary.review_required += 1;
        }
    }
    summary.outcomes = outcomes;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: NormalizeItemStatus, review: bool) -> NormalizeItemOutcome {
        NormalizeItemOutcome {
            parsed_entity_id: Uuid::new_v4(),
            status,
            normalized_entity_id: None,
            review_required: review,
            error: None,
        }
    }

    #[test]
    fn test_summarize_counts_by_status() {
        let s = summarize(
            Uuid::nil(),
            vec![
                outcome(NormalizeItemStatus::Linked, true),
                outcome(NormalizeItemStatus::Linked, false),
                outcome(NormalizeItemStatus::Created, false),
                outcome(NormalizeItemStatus::Error, false),
            ],
        );
        assert_eq!(s.total, 4);
        assert_eq!(s.linked, 2);
        assert_eq!(s.created, 1);
        assert_eq!(s.errors, 1);
        assert_eq!(s.review_required, 1);
    }

    #[test]
    fn test_summarize_empty_batch() {
        let s = summarize(Uuid::nil(), vec![]);
        assert_eq!(s.total, 0);
        assert_eq!(s.errors, 0);
    }
}
