//! Versioned entity store: append-only version chains per logical entity.
//!
//! CRITICAL: rows are never UPDATEd or DELETEd. Every change is an INSERT of
//! `version = current + 1`; soft delete is a new version with
//! `is_active = false`. "Current" is a derived view (max version), and the
//! `UNIQUE (logical_entity_id, version)` constraint is the backstop against
//! two writers racing to the same version number: a lost race surfaces as
//! `AppError::Conflict` and the caller re-reads and retries.

use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::entity::{EntityType, EntityVersionRow, Source};

pub struct NewEntity<'a> {
    pub user_id: Uuid,
    pub data: &'a Value,
    pub source: Source,
    pub source_confidence: Option<f64>,
}

/// Returns exactly one row per logical entity: the max-version row, provided
/// it is active. Logical entities whose latest version is inactive are
/// soft-deleted and excluded entirely.
pub async fn get_latest(
    pool: &PgPool,
    entity_type: EntityType,
    user_id: Uuid,
) -> Result<Vec<EntityVersionRow>, AppError> {
    Ok(sqlx::query_as::<_, EntityVersionRow>(
        r#"
        SELECT * FROM (
            SELECT DISTINCT ON (logical_entity_id) *
            FROM entity_versions
            WHERE user_id = $1 AND entity_type = $2
            ORDER BY logical_entity_id, version DESC
        ) latest
        WHERE is_active
        "#,
    )
    .bind(user_id)
    .bind(entity_type.as_str())
    .fetch_all(pool)
    .await?)
}

/// Inserts version 1 of a brand-new logical entity.
pub async fn create(
    pool: &PgPool,
    entity_type: EntityType,
    params: NewEntity<'_>,
) -> Result<EntityVersionRow, AppError> {
    let logical_id = Uuid::new_v4();
    let row = insert_version(
        pool,
        entity_type,
        params.user_id,
        logical_id,
        1,
        true,
        params.source,
        params.source_confidence,
        params.data,
    )
    .await?;
    info!(
        "Created {} entity {} for user {}",
        entity_type.as_str(),
        logical_id,
        params.user_id
    );
    Ok(row)
}

/// Merges `partial_data` over the current latest active version and inserts
/// it as `version = current + 1`. `NotFound` when no active version exists.
pub async fn update(
    pool: &PgPool,
    entity_type: EntityType,
    user_id: Uuid,
    logical_id: Uuid,
    partial_data: &Value,
    source: Source,
    source_confidence: Option<f64>,
) -> Result<EntityVersionRow, AppError> {
    let current = current_active(pool, entity_type, user_id, logical_id).await?;
    let merged = merge_entity_data(&current.data, partial_data);

    let row = insert_version(
        pool,
        entity_type,
        user_id,
        logical_id,
        current.version + 1,
        true,
        source,
        source_confidence,
        &merged,
    )
    .await?;
    info!(
        "Updated {} entity {} to version {}",
        entity_type.as_str(),
        logical_id,
        row.version
    );
    Ok(row)
}

/// Soft delete: a new version identical to the current latest except
/// `is_active = false`. `get_latest` then excludes the logical entity.
pub async fn soft_delete(
    pool: &PgPool,
    entity_type: EntityType,
    user_id: Uuid,
    logical_id: Uuid,
    source: Source,
) -> Result<EntityVersionRow, AppError> {
    let current = current_active(pool, entity_type, user_id, logical_id).await?;

    let row = insert_version(
        pool,
        entity_type,
        user_id,
        logical_id,
        current.version + 1,
        false,
        source,
        current.source_confidence,
        &current.data,
    )
    .await?;
    info!(
        "Soft-deleted {} entity {} at version {}",
        entity_type.as_str(),
        logical_id,
        row.version
    );
    Ok(row)
}

/// Full version chain, newest first.
pub async fn get_history(
    pool: &PgPool,
    entity_type: EntityType,
    logical_id: Uuid,
) -> Result<Vec<EntityVersionRow>, AppError> {
    let rows = sqlx::query_as::<_, EntityVersionRow>(
        r#"
        SELECT * FROM entity_versions
        WHERE entity_type = $1 AND logical_entity_id = $2
        ORDER BY version DESC
        "#,
    )
    .bind(entity_type.as_str())
    .bind(logical_id)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Err(AppError::NotFound(format!(
            "No versions for {} entity {logical_id}",
            entity_type.as_str()
        )));
    }
    Ok(rows)
}

/// The max-version row for one logical entity, scoped to its owner.
pub async fn latest_version(
    pool: &PgPool,
    entity_type: EntityType,
    user_id: Uuid,
    logical_id: Uuid,
) -> Result<Option<EntityVersionRow>, AppError> {
    Ok(sqlx::query_as::<_, EntityVersionRow>(
        r#"
        SELECT * FROM entity_versions
        WHERE user_id = $1 AND entity_type = $2 AND logical_entity_id = $3
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(entity_type.as_str())
    .bind(logical_id)
    .fetch_optional(pool)
    .await?)
}

async fn current_active(
    pool: &PgPool,
    entity_type: EntityType,
    user_id: Uuid,
    logical_id: Uuid,
) -> Result<EntityVersionRow, AppError> {
    match latest_version(pool, entity_type, user_id, logical_id).await? {
        Some(row) if row.is_active => Ok(row),
        _ => Err(AppError::NotFound(format!(
            "No active {} entity {logical_id}",
            entity_type.as_str()
        ))),
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_version(
    pool: &PgPool,
    entity_type: EntityType,
    user_id: Uuid,
    logical_id: Uuid,
    version: i32,
    is_active: bool,
    source: Source,
    source_confidence: Option<f64>,
    data: &Value,
) -> Result<EntityVersionRow, AppError> {
    // Append-only INSERT; the (logical_entity_id, version) constraint
    // rejects a racing writer.
    Ok(sqlx::query_as::<_, EntityVersionRow>(
        r#"
        INSERT INTO entity_versions
            (id, user_id, logical_entity_id, entity_type, version, is_active,
             source, source_confidence, data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(logical_id)
    .bind(entity_type.as_str())
    .bind(version)
    .bind(is_active)
    .bind(source.as_str())
    .bind(source_confidence)
    .bind(data)
    .fetch_one(pool)
    .await?)
}

/// Merges a partial update over the current data object. Keys in `partial`
/// win; other keys carry over, so the result is the union of both.
pub fn merge_entity_data(base: &Value, partial: &Value) -> Value {
    let mut merged = match base {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Value::Object(partial_map) = partial {
        for (k, v) in partial_map {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overrides_and_unions() {
        let base = json!({"company": "Google", "title": "SWE"});
        let partial = json!({"title": "Senior SWE", "location": "NYC"});
        let merged = merge_entity_data(&base, &partial);
        assert_eq!(
            merged,
            json!({"company": "Google", "title": "Senior SWE", "location": "NYC"})
        );
    }

    #[test]
    fn test_merge_empty_partial_is_identity() {
        let base = json!({"company": "Google"});
        assert_eq!(merge_entity_data(&base, &json!({})), base);
    }

    #[test]
    fn test_merge_over_non_object_base() {
        let merged = merge_entity_data(&Value::Null, &json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn test_merge_keeps_explicit_null() {
        let base = json!({"end_date": "2024-01-01"});
        let merged = merge_entity_data(&base, &json!({"end_date": null}));
        assert_eq!(merged, json!({"end_date": null}));
    }
}
