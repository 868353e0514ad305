//! API Module
//!
//! HTTP ingress for the deployer.
//! Each submodule handles endpoints for a specific concern.

pub mod error;
pub mod health;
pub mod runs;
pub mod webhook;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::pipeline::TriggerDispatcher;

/// Create the main API router with all endpoints
pub fn create_router(dispatcher: TriggerDispatcher) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Push event endpoints
        .route("/", post(webhook::receive_push))
        .route("/webhook", post(webhook::receive_push))
        // Run endpoints
        .route("/runs", get(runs::list_runs))
        .route("/runs/{name}", delete(runs::cancel_run))
        // Add state and middleware
        .with_state(dispatcher)
        .layer(TraceLayer::new_for_http())
}
