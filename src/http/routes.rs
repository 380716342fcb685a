//! Route table for the trigger/control REST surface.

use axum::routing::{get, patch, post};
use axum::Router;

use super::handlers;
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/definitions", post(handlers::create_task_definition).get(handlers::list_task_definitions))
        .route("/api/v1/definitions/:def_id/trigger", post(handlers::manual_trigger))
        .route("/api/v1/ad-hoc-tasks", post(handlers::submit_ad_hoc_task))
        .route("/api/v1/traces/:trace_id/cancel", post(handlers::cancel_trace_tasks))
        .route("/api/v1/traces/:trace_id/pause", post(handlers::pause_trace_tasks))
        .route("/api/v1/traces/:trace_id/resume", post(handlers::resume_trace_tasks))
        .route("/api/v1/traces/:trace_id/modify", patch(handlers::modify_trace_tasks))
        .route("/api/v1/request-id-to-trace/:request_id", get(handlers::request_id_to_trace))
        .with_state(state)
}
