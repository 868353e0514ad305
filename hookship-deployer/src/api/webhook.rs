//! Push Event API Handler
//!
//! Accepts push notifications from the source host and hands them to the
//! dispatcher. The response only acknowledges scheduling; the run itself
//! continues in the background.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hookship_core::dto::run::TriggerAccepted;
use hookship_core::dto::webhook::PushEvent;

use crate::api::error::{ApiError, ApiResult};
use crate::pipeline::TriggerDispatcher;

/// Header carrying the event type
pub const EVENT_HEADER: &str = "x-github-event";

/// POST / and POST /webhook
/// Schedule a run for the pushed repository
pub async fn receive_push(
    State(dispatcher): State<TriggerDispatcher>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("push");

    if event == "ping" {
        tracing::debug!("Answering webhook ping");
        return Ok((StatusCode::OK, Json(serde_json::json!({ "message": "pong" }))).into_response());
    }

    let push: PushEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid push event: {}", e)))?;
    let repository = push.repository_ref()?;

    tracing::info!("Push received for {}", repository);

    let handle = dispatcher.submit(repository)?;
    let accepted = TriggerAccepted {
        repository: handle.repository().to_string(),
        admission: handle.admission(),
    };

    // Outcomes are reported through logs; nobody waits on this handle
    drop(handle);

    Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
}
