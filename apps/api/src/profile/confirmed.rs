//! Confirmed profile: the user's currently-accepted scalar value per field.
//! Upserted: at most one row per (user_id, entity_type, entity_id, field_name).

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::entity::ConfirmedFieldRow;

pub async fn get_confirmed(
    pool: &PgPool,
    user_id: Uuid,
    entity_type: &str,
    entity_id: Uuid,
    field_name: &str,
) -> Result<Option<ConfirmedFieldRow>, AppError> {
    Ok(sqlx::query_as::<_, ConfirmedFieldRow>(
        r#"
        SELECT * FROM user_confirmed_profile
        WHERE user_id = $1 AND entity_type = $2 AND entity_id = $3 AND field_name = $4
        "#,
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(field_name)
    .fetch_optional(pool)
    .await?)
}

pub async fn upsert_confirmed(
    pool: &PgPool,
    user_id: Uuid,
    entity_type: &str,
    entity_id: Uuid,
    field_name: &str,
    value: &str,
    confidence_score: Option<f64>,
) -> Result<ConfirmedFieldRow, AppError> {
    Ok(sqlx::query_as::<_, ConfirmedFieldRow>(
        r#"
        INSERT INTO user_confirmed_profile
            (user_id, entity_type, entity_id, field_name, value, confidence_score, last_confirmed_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (user_id, entity_type, entity_id, field_name)
        DO UPDATE SET value = $5, confidence_score = $6, last_confirmed_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(field_name)
    .bind(value)
    .bind(confidence_score)
    .fetch_one(pool)
    .await?)
}
