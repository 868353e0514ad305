//! Run API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use hookship_core::dto::run::ActiveRun;

use crate::api::error::{ApiError, ApiResult};
use crate::pipeline::TriggerDispatcher;

/// GET /runs
/// List active and pending runs
pub async fn list_runs(State(dispatcher): State<TriggerDispatcher>) -> Json<Vec<ActiveRun>> {
    tracing::debug!("Listing active runs");
    Json(dispatcher.active())
}

/// DELETE /runs/{name}
/// Cancel the active run for a repository
pub async fn cancel_run(
    State(dispatcher): State<TriggerDispatcher>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    if dispatcher.cancel(&name) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::NotFound(format!("No active run for {}", name)))
    }
}
