//! Canonical entity graph: cross-user deduplicated nodes (companies,
//! institutions, skills) that parsed mentions link to.
//!
//! Auto-link tie-break during ingestion: best score at or above the
//! auto-merge threshold with the embedding method links without review;
//! at or above the link floor, links flagged for review; below the floor, a
//! new node is created instead of linking.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::Thresholds;
use crate::errors::AppError;
use crate::models::normalized::{
    MatchMethod, NormalizedEntityRow, ResumeEntityLinkRow, ReviewStatus,
};
use crate::models::parsed::ParsedEntityRow;
use crate::similarity::SimilarityProvider;

#[derive(Debug, Serialize)]
pub struct ScoredEntity {
    #[serde(flatten)]
    pub entity: NormalizedEntityRow,
    pub similarity_score: f64,
}

#[derive(Debug, Serialize)]
pub struct LinkOutcome {
    pub normalized_entity: NormalizedEntityRow,
    pub link: ResumeEntityLinkRow,
    /// True when no candidate reached the link floor and a node was created.
    pub created: bool,
}

/// How an incoming mention should attach to the graph.
#[derive(Debug, PartialEq)]
pub enum Disposition {
    CreateNew,
    Link { review_required: bool },
}

/// Pure tie-break policy over the best candidate score.
pub fn link_disposition(
    best: Option<(f64, MatchMethod)>,
    thresholds: &Thresholds,
) -> Disposition {
    match best {
        Some((score, method)) if score >= thresholds.auto_merge => Disposition::Link {
            // Only embedding matches are trusted enough to skip review.
            review_required: method != MatchMethod::Embedding,
        },
        Some((score, _)) if score >= thresholds.auto_link_floor => Disposition::Link {
            review_required: true,
        },
        _ => Disposition::CreateNew,
    }
}

/// Candidates for a parsed mention, scored and sorted descending. A node's
/// score is the best of its canonical name and all aliases.
pub async fn find_similar(
    pool: &PgPool,
    provider: &dyn SimilarityProvider,
    parsed_entity_id: Uuid,
    threshold: f64,
) -> Result<Vec<ScoredEntity>, AppError> {
    let parsed = load_parsed(pool, parsed_entity_id).await?;
    let candidates = load_candidates(pool, &parsed.entity_type).await?;

    let mut scored = Vec::new();
    for entity in candidates {
        let score = score_against(provider, &parsed.raw_value, &entity).await?;
        if score >= threshold {
            scored.push(ScoredEntity {
                entity,
                similarity_score: score,
            });
        }
    }
    scored.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(scored)
}

/// Maps a parsed mention to a canonical node, creating one when nothing is
/// close enough. One link per parsed entity; re-resolving refreshes it.
pub async fn find_or_create(
    pool: &PgPool,
    provider: &dyn SimilarityProvider,
    thresholds: &Thresholds,
    parsed: &ParsedEntityRow,
) -> Result<LinkOutcome, AppError> {
    let candidates = load_candidates(pool, &parsed.entity_type).await?;

    let mut best: Option<(f64, NormalizedEntityRow)> = None;
    for entity in candidates {
        let score = score_against(provider, &parsed.raw_value, &entity).await?;
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            best = Some((score, entity));
        }
    }

    let disposition = link_disposition(
        best.as_ref().map(|(s, _)| (*s, provider.method())),
        thresholds,
    );

    match disposition {
        Disposition::Link { review_required } => {
            let (score, entity) = best.expect("Link disposition implies a candidate");
            let link = upsert_link(
                pool,
                parsed.id,
                entity.id,
                provider.method(),
                score,
                review_required,
            )
            .await?;
            Ok(LinkOutcome {
                normalized_entity: entity,
                link,
                created: false,
            })
        }
        Disposition::CreateNew => {
            let entity = create_node(
                pool,
                &parsed.entity_type,
                &parsed.raw_value,
                parsed.confidence.unwrap_or(0.0),
            )
            .await?;
            let link =
                upsert_link(pool, parsed.id, entity.id, provider.method(), 1.0, false).await?;
            info!(
                "Created normalized {} node '{}' for parsed entity {}",
                parsed.entity_type, entity.canonical_name, parsed.id
            );
            Ok(LinkOutcome {
                normalized_entity: entity,
                link,
                created: true,
            })
        }
    }
}

/// Folds `source` into `target`: re-points every link, merges the source's
/// canonical name and aliases into the target's alias set, then removes the
/// source node. One transaction; partial re-pointing is never observable.
pub async fn merge(
    pool: &PgPool,
    source_id: Uuid,
    target_id: Uuid,
    actor_id: Uuid,
) -> Result<NormalizedEntityRow, AppError> {
    if source_id == target_id {
        return Err(AppError::Validation(
            "Cannot merge a normalized entity into itself".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let source = fetch_node(&mut tx, source_id).await?;
    let target = fetch_node(&mut tx, target_id).await?;

    let mut aliases = target.aliases.clone();
    for alias in std::iter::once(&source.canonical_name).chain(source.aliases.iter()) {
        if !aliases.contains(alias) && *alias != target.canonical_name {
            aliases.push(alias.clone());
        }
    }

    let repointed = sqlx::query(
        "UPDATE resume_entity_links SET normalized_entity_id = $1 WHERE normalized_entity_id = $2",
    )
    .bind(target_id)
    .bind(source_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let merged = sqlx::query_as::<_, NormalizedEntityRow>(
        "UPDATE normalized_entities SET aliases = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(target_id)
    .bind(&aliases)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM normalized_entities WHERE id = $1")
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        "Merged normalized entity {source_id} into {target_id} ({repointed} links re-pointed) by {actor_id}"
    );
    Ok(merged)
}

pub async fn set_review_status(
    pool: &PgPool,
    entity_id: Uuid,
    status: ReviewStatus,
) -> Result<NormalizedEntityRow, AppError> {
    sqlx::query_as::<_, NormalizedEntityRow>(
        "UPDATE normalized_entities SET review_status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(entity_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Normalized entity {entity_id} not found")))
}

pub async fn delete_node(pool: &PgPool, entity_id: Uuid) -> Result<(), AppError> {
    let deleted = sqlx::query("DELETE FROM normalized_entities WHERE id = $1")
        .bind(entity_id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound(format!(
            "Normalized entity {entity_id} not found"
        )));
    }
    Ok(())
}

async fn score_against(
    provider: &dyn SimilarityProvider,
    value: &str,
    entity: &NormalizedEntityRow,
) -> Result<f64, AppError> {
    let mut best = provider
        .similarity(value, &entity.canonical_name)
        .await
        .map_err(|e| AppError::DegradedMode(e.to_string()))?;
    for alias in &entity.aliases {
        let score = provider
            .similarity(value, alias)
            .await
            .map_err(|e| AppError::DegradedMode(e.to_string()))?;
        if score > best {
            best = score;
        }
    }
    Ok(best)
}

async fn load_parsed(pool: &PgPool, parsed_entity_id: Uuid) -> Result<ParsedEntityRow, AppError> {
    sqlx::query_as::<_, ParsedEntityRow>("SELECT * FROM parsed_entities WHERE id = $1")
        .bind(parsed_entity_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Parsed entity {parsed_entity_id} not found")))
}

async fn load_candidates(
    pool: &PgPool,
    entity_type: &str,
) -> Result<Vec<NormalizedEntityRow>, AppError> {
    Ok(sqlx::query_as::<_, NormalizedEntityRow>(
        "SELECT * FROM normalized_entities WHERE entity_type = $1",
    )
    .bind(entity_type)
    .fetch_all(pool)
    .await?)
}

async fn fetch_node(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<NormalizedEntityRow, AppError> {
    sqlx::query_as::<_, NormalizedEntityRow>("SELECT * FROM normalized_entities WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Normalized entity {id} not found")))
}

async fn create_node(
    pool: &PgPool,
    entity_type: &str,
    canonical_name: &str,
    confidence_score: f64,
) -> Result<NormalizedEntityRow, AppError> {
    Ok(sqlx::query_as::<_, NormalizedEntityRow>(
        r#"
        INSERT INTO normalized_entities
            (id, entity_type, canonical_name, aliases, confidence_score, review_status)
        VALUES ($1, $2, $3, '{}', $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entity_type)
    .bind(canonical_name)
    .bind(confidence_score)
    .bind(ReviewStatus::Pending.as_str())
    .fetch_one(pool)
    .await?)
}

async fn upsert_link(
    pool: &PgPool,
    parsed_entity_id: Uuid,
    normalized_entity_id: Uuid,
    method: MatchMethod,
    score: f64,
    review_required: bool,
) -> Result<ResumeEntityLinkRow, AppError> {
    Ok(sqlx::query_as::<_, ResumeEntityLinkRow>(
        r#"
        INSERT INTO resume_entity_links
            (id, parsed_entity_id, normalized_entity_id, match_method, match_score, review_required)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (parsed_entity_id)
        DO UPDATE SET
            normalized_entity_id = $3, match_method = $4, match_score = $5, review_required = $6
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(parsed_entity_id)
    .bind(normalized_entity_id)
    .bind(method.as_str())
    .bind(score)
    .bind(review_required)
    .fetch_one(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn test_high_embedding_score_links_without_review() {
        let d = link_disposition(Some((0.95, MatchMethod::Embedding)), &thresholds());
        assert_eq!(
            d,
            Disposition::Link {
                review_required: false
            }
        );
    }

    #[test]
    fn test_auto_merge_boundary_is_inclusive() {
        let d = link_disposition(Some((0.92, MatchMethod::Embedding)), &thresholds());
        assert_eq!(
            d,
            Disposition::Link {
                review_required: false
            }
        );
    }

    #[test]
    fn test_high_fuzzy_score_still_reviewed() {
        let d = link_disposition(Some((0.95, MatchMethod::Fuzzy)), &thresholds());
        assert_eq!(
            d,
            Disposition::Link {
                review_required: true
            }
        );
    }

    #[test]
    fn test_mid_score_links_with_review() {
        let d = link_disposition(Some((0.8, MatchMethod::Embedding)), &thresholds());
        assert_eq!(
            d,
            Disposition::Link {
                review_required: true
            }
        );
    }

    #[test]
    fn test_link_floor_boundary_is_inclusive() {
        let d = link_disposition(Some((0.70, MatchMethod::Embedding)), &thresholds());
        assert_eq!(
            d,
            Disposition::Link {
                review_required: true
            }
        );
    }

    #[test]
    fn test_below_floor_creates_new_node() {
        let d = link_disposition(Some((0.69, MatchMethod::Embedding)), &thresholds());
        assert_eq!(d, Disposition::CreateNew);
    }

    #[test]
    fn test_no_candidates_creates_new_node() {
        assert_eq!(link_disposition(None, &thresholds()), Disposition::CreateNew);
    }
}
