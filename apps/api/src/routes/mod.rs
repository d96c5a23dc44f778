pub mod health;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::decisions::handlers as decision_handlers;
use crate::diff::handlers as diff_handlers;
use crate::normalize::handlers as normalize_handlers;
use crate::pipeline::handlers as pipeline_handlers;
use crate::profile::handlers as profile_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Versioned entity store
        .route(
            "/api/v1/profile/:entity_type",
            get(profile_handlers::handle_get_latest).post(profile_handlers::handle_create),
        )
        .route(
            "/api/v1/profile/:entity_type/:logical_id",
            patch(profile_handlers::handle_update).delete(profile_handlers::handle_delete),
        )
        .route(
            "/api/v1/profile/:entity_type/:logical_id/history",
            get(profile_handlers::handle_history),
        )
        // Reconciliation pipeline per resume version
        .route(
            "/api/v1/resumes/:version_id/parsed",
            post(pipeline_handlers::handle_register_parsed),
        )
        .route(
            "/api/v1/resumes/:version_id/diff",
            post(diff_handlers::handle_run_diff),
        )
        .route(
            "/api/v1/resumes/:version_id/diffs",
            get(diff_handlers::handle_list_diffs),
        )
        .route(
            "/api/v1/resumes/:version_id/normalize",
            post(normalize_handlers::handle_run_normalize),
        )
        .route(
            "/api/v1/resumes/:version_id/timeline",
            get(pipeline_handlers::handle_get_timeline),
        )
        .route(
            "/api/v1/resumes/:version_id/stages/:stage/report",
            post(pipeline_handlers::handle_report_stage),
        )
        // Canonical entity graph
        .route(
            "/api/v1/normalized/resolve",
            post(normalize_handlers::handle_resolve),
        )
        .route(
            "/api/v1/normalized/similar",
            get(normalize_handlers::handle_find_similar),
        )
        .route(
            "/api/v1/normalized/:id/merge",
            post(normalize_handlers::handle_merge),
        )
        .route(
            "/api/v1/normalized/:id/review-status",
            patch(normalize_handlers::handle_set_review_status),
        )
        .route(
            "/api/v1/normalized/:id",
            delete(normalize_handlers::handle_delete),
        )
        // Merge decision ledger
        .route(
            "/api/v1/decisions",
            post(decision_handlers::handle_create_decision),
        )
        .route(
            "/api/v1/decisions/:id/apply",
            post(decision_handlers::handle_apply_decision),
        )
        .route(
            "/api/v1/resumes/:version_id/decisions",
            get(decision_handlers::handle_list_decisions),
        )
        .route(
            "/api/v1/resumes/:version_id/decisions/apply-all",
            post(decision_handlers::handle_apply_all),
        )
        .with_state(state)
}
