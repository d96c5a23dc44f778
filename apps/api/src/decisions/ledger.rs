//! Merge decision ledger: the auditable record of how each diffed field was
//! resolved (accept, reject, or override).
//!
//! Creation is idempotent per (parsed_entity_id, field_name): the first
//! decision for a key wins and later attempts get the existing row back.
//! Application is idempotent per decision: once `applied_at` is set,
//! re-applying is a no-op.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::decision::{DecisionType, MergeDecisionRow};
use crate::models::entity::{EntityType, Source};
use crate::models::parsed::ParsedEntityRow;
use crate::profile::confirmed::upsert_confirmed;
use crate::profile::store::{self, NewEntity};

pub struct NewDecision<'a> {
    pub user_id: Uuid,
    pub resume_version_id: Uuid,
    pub parsed_entity_id: Uuid,
    pub field_name: &'a str,
    pub decision_type: DecisionType,
    pub parsed_value: &'a str,
    pub confirmed_value: Option<&'a str>,
    pub override_value: Option<&'a str>,
    pub justification: &'a str,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Accepted,
    Rejected,
    Overridden,
    AlreadyApplied,
}

#[derive(Debug, Serialize)]
pub struct DecisionError {
    pub decision_id: Uuid,
    pub field_name: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApplySummary {
    pub resume_version_id: Uuid,
    pub applied: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub overridden: usize,
    pub errors: Vec<DecisionError>,
}

/// An override must carry a non-empty replacement value; other decision
/// types must not carry one.
pub fn validate_decision(
    decision_type: DecisionType,
    override_value: Option<&str>,
) -> Result<(), AppError> {
    match decision_type {
        DecisionType::Override => match override_value {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err(AppError::Validation(
                "Override decisions require a non-empty override_value".to_string(),
            )),
        },
        _ => {
            if override_value.is_some() {
                return Err(AppError::Validation(format!(
                    "override_value is only valid for override decisions, not '{}'",
                    decision_type.as_str()
                )));
            }
            Ok(())
        }
    }
}

/// Records a decision. If one already exists for this
/// (parsed_entity_id, field_name), the existing row is returned unchanged.
pub async fn create_decision(
    pool: &PgPool,
    params: NewDecision<'_>,
) -> Result<MergeDecisionRow, AppError> {
    validate_decision(params.decision_type, params.override_value)?;

    if let Some(existing) =
        find_by_key(pool, params.parsed_entity_id, params.field_name).await?
    {
        return Ok(existing);
    }

    let inserted = sqlx::query_as::<_, MergeDecisionRow>(
        r#"
        INSERT INTO merge_decisions
            (id, user_id, resume_version_id, parsed_entity_id, field_name,
             decision_type, parsed_value, confirmed_value, override_value,
             justification, confidence_score)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (parsed_entity_id, field_name) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(params.user_id)
    .bind(params.resume_version_id)
    .bind(params.parsed_entity_id)
    .bind(params.field_name)
    .bind(params.decision_type.as_str())
    .bind(params.parsed_value)
    .bind(params.confirmed_value)
    .bind(params.override_value)
    .bind(params.justification)
    .bind(params.confidence_score)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(row) => Ok(row),
        // Lost a create race; the winner's row is the decision of record.
        None => find_by_key(pool, params.parsed_entity_id, params.field_name)
            .await?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "Decision insert conflicted but no existing row found"
                ))
            }),
    }
}

/// Applies one decision: accept/override write the resolved value into the
/// confirmed profile (and version the backing entity when the field is
/// structural); reject touches nothing. Already-applied decisions no-op.
pub async fn apply_decision(
    pool: &PgPool,
    decision_id: Uuid,
) -> Result<ApplyOutcome, AppError> {
    let decision = sqlx::query_as::<_, MergeDecisionRow>(
        "SELECT * FROM merge_decisions WHERE id = $1",
    )
    .bind(decision_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Decision {decision_id} not found")))?;

    if decision.applied_at.is_some() {
        return Ok(ApplyOutcome::AlreadyApplied);
    }

    let decision_type = DecisionType::parse(&decision.decision_type)?;
    let outcome = match decision_type {
        DecisionType::Reject => ApplyOutcome::Rejected,
        DecisionType::Accept => {
            write_resolved_value(pool, &decision, &decision.parsed_value).await?;
            ApplyOutcome::Accepted
        }
        DecisionType::Override => {
            let value = decision.override_value.as_deref().ok_or_else(|| {
                AppError::Validation(
                    "Override decision is missing its override_value".to_string(),
                )
            })?;
            write_resolved_value(pool, &decision, value).await?;
            ApplyOutcome::Overridden
        }
    };

    // Claim only after the writes landed; a concurrent applier winning the
    // claim means the work was done once either way.
    sqlx::query("UPDATE merge_decisions SET applied_at = NOW() WHERE id = $1 AND applied_at IS NULL")
        .bind(decision_id)
        .execute(pool)
        .await?;

    info!(
        "Applied decision {} ({}) for field '{}'",
        decision_id, decision.decision_type, decision.field_name
    );
    Ok(outcome)
}

/// Applies every unapplied decision for a resume version. One decision's
/// failure is recorded and never blocks the rest; the summary carries counts
/// so partial progress is visible.
pub async fn apply_all(
    pool: &PgPool,
    resume_version_id: Uuid,
) -> Result<ApplySummary, AppError> {
    let pending = sqlx::query_as::<_, MergeDecisionRow>(
        r#"
        SELECT * FROM merge_decisions
        WHERE resume_version_id = $1 AND applied_at IS NULL
        ORDER BY created_at
        "#,
    )
    .bind(resume_version_id)
    .fetch_all(pool)
    .await?;

    let mut summary = ApplySummary {
        resume_version_id,
        applied: 0,
        accepted: 0,
        rejected: 0,
        overridden: 0,
        errors: Vec::new(),
    };

    for decision in &pending {
        match apply_decision(pool, decision.id).await {
            Ok(ApplyOutcome::Accepted) => {
                summary.applied += 1;
                summary.accepted += 1;
            }
            Ok(ApplyOutcome::Rejected) => {
                summary.applied += 1;
                summary.rejected += 1;
            }
            Ok(ApplyOutcome::Overridden) => {
                summary.applied += 1;
                summary.overridden += 1;
            }
            Ok(ApplyOutcome::AlreadyApplied) => {}
            Err(e) => summary.errors.push(DecisionError {
                decision_id: decision.id,
                field_name: decision.field_name.clone(),
                message: e.to_string(),
            }),
        }
    }

    info!(
        "Applied {} of {} pending decisions for resume version {} ({} errors)",
        summary.applied,
        pending.len(),
        resume_version_id,
        summary.errors.len()
    );
    Ok(summary)
}

/// Upserts the confirmed value, then versions the backing entity when the
/// decided field is structural (present in the entity's data object). A
/// field with no backing entity yet gets one, so accepted `new` diffs land
/// in the version store too.
async fn write_resolved_value(
    pool: &PgPool,
    decision: &MergeDecisionRow,
    value: &str,
) -> Result<(), AppError> {
    let parsed = sqlx::query_as::<_, ParsedEntityRow>(
        "SELECT * FROM parsed_entities WHERE id = $1",
    )
    .bind(decision.parsed_entity_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "Parsed entity {} backing decision {} not found",
            decision.parsed_entity_id, decision.id
        ))
    })?;

    let entity_type = EntityType::parse(&parsed.entity_type)?;

    let entity_id = match parsed.profile_entity_id {
        Some(profile_entity_id) => {
            let latest = store::latest_version(
                pool,
                entity_type,
                decision.user_id,
                profile_entity_id,
            )
            .await?;

            let structural = latest
                .as_ref()
                .map(|row| row.data.get(&decision.field_name).is_some())
                .unwrap_or(false);

            if structural {
                store::update(
                    pool,
                    entity_type,
                    decision.user_id,
                    profile_entity_id,
                    &single_field(&decision.field_name, value),
                    Source::UserAcceptance,
                    decision.confidence_score,
                )
                .await?;
            }
            profile_entity_id
        }
        None => {
            // Accepted value for a field with no profile target yet: start a
            // fresh version chain for it.
            let row = store::create(
                pool,
                entity_type,
                NewEntity {
                    user_id: decision.user_id,
                    data: &single_field(&decision.field_name, value),
                    source: Source::UserAcceptance,
                    source_confidence: decision.confidence_score,
                },
            )
            .await?;
            row.logical_entity_id
        }
    };

    upsert_confirmed(
        pool,
        decision.user_id,
        &parsed.entity_type,
        entity_id,
        &decision.field_name,
        value,
        decision.confidence_score,
    )
    .await?;
    Ok(())
}

fn single_field(field_name: &str, value: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(
        field_name.to_string(),
        serde_json::Value::String(value.to_string()),
    );
    serde_json::Value::Object(map)
}

async fn find_by_key(
    pool: &PgPool,
    parsed_entity_id: Uuid,
    field_name: &str,
) -> Result<Option<MergeDecisionRow>, AppError> {
    Ok(sqlx::query_as::<_, MergeDecisionRow>(
        "SELECT * FROM merge_decisions WHERE parsed_entity_id = $1 AND field_name = $2",
    )
    .bind(parsed_entity_id)
    .bind(field_name)
    .fetch_optional(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_without_value_is_invalid() {
        // Scenario: override decision with no replacement value.
        let result = validate_decision(DecisionType::Override, None);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_override_with_empty_value_is_invalid() {
        let result = validate_decision(DecisionType::Override, Some("   "));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_override_with_value_is_valid() {
        assert!(validate_decision(DecisionType::Override, Some("Staff Engineer")).is_ok());
    }

    #[test]
    fn test_accept_with_override_value_is_invalid() {
        let result = validate_decision(DecisionType::Accept, Some("surplus"));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_accept_and_reject_without_value_are_valid() {
        assert!(validate_decision(DecisionType::Accept, None).is_ok());
        assert!(validate_decision(DecisionType::Reject, None).is_ok());
    }
}
