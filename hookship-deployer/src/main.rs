//! Hookship Deployer
//!
//! Turns source pushes into running services.
//!
//! Architecture:
//! - Configuration: Load settings once from the environment
//! - Services: External capabilities (git, container CLI, update authority)
//! - Pipeline: Per-run state machine and trigger scheduling
//! - API: Webhook ingress and run inspection
//!
//! Each push is fetched into a private workspace, versioned by its commit
//! count, built into an image, pushed to the registry and handed to the
//! update authority for rollout.

mod api;
mod config;
mod pipeline;
mod process;
mod service;
mod workspace;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use hookship_client::UpdateClient;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::pipeline::{PipelineOrchestrator, PipelineServices, TriggerDispatcher};
use crate::service::{DockerImageBuilder, GitSourceService, GitVersionResolver};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hookship_deployer=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hookship Deployer");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: registry_user={}, source_host={}, update_url={}",
        config.registry.username, config.source_host, config.update_url
    );
    info!(
        "Workspaces under {}, trigger policy {}",
        config.workspace_root.display(),
        config.trigger_policy
    );

    // External tools must be present before any trigger is accepted
    process::check_available("git").await?;
    process::check_available("docker").await?;

    // Initialize services
    let services = PipelineServices {
        source: Arc::new(GitSourceService::new(config.source_host.clone())),
        versions: Arc::new(GitVersionResolver::new()),
        images: Arc::new(DockerImageBuilder::new(config.auth_ttl)),
        updates: Arc::new(UpdateClient::new(config.update_url.clone())),
    };

    info!("Services initialized");

    let bind_addr = config.bind_addr.clone();
    let policy = config.trigger_policy;
    let max_parallel_runs = config.max_parallel_runs;
    let shutdown_grace = config.shutdown_grace;

    let orchestrator = PipelineOrchestrator::new(Arc::new(config), services);
    let dispatcher = TriggerDispatcher::new(orchestrator, policy, max_parallel_runs);

    // Build router with all API endpoints
    let app = api::create_router(dispatcher.clone());

    info!("Listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(dispatcher.clone()))
        .await
        .context("Server error")?;

    info!("Waiting for cancelled runs to release their workspaces");
    if !dispatcher.shutdown(shutdown_grace).await {
        warn!(
            "Runs still active after {:?}; their workspaces may be left behind",
            shutdown_grace
        );
    }

    info!("Deployer stopped");
    Ok(())
}

/// Loads and validates configuration from environment variables
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

/// Resolves on Ctrl-C, cancelling in-flight runs before their next stage
async fn shutdown_signal(dispatcher: TriggerDispatcher) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    info!("Shutdown requested, cancelling active runs");
    dispatcher.cancel_all();
}
