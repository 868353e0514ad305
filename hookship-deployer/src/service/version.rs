//! Version resolution
//!
//! The version of a checkout is the number of commits reachable from HEAD by
//! following first parents only. Merges of side branches add one, so the
//! number grows by exactly one per commit on the mainline and never shrinks
//! under fast-forward history.

use async_trait::async_trait;
use hookship_core::PipelineError;
use hookship_core::domain::image::VersionNumber;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::process;

/// Service trait for deriving a version number from a checkout
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Resolves the version of the repository checked out at `workspace`
    async fn resolve(&self, workspace: &Path) -> Result<VersionNumber, PipelineError>;
}

/// `git rev-list` implementation of VersionResolver
#[derive(Default)]
pub struct GitVersionResolver {}

impl GitVersionResolver {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl VersionResolver for GitVersionResolver {
    async fn resolve(&self, workspace: &Path) -> Result<VersionNumber, PipelineError> {
        let output = process::run(
            Command::new("git")
                .arg("-C")
                .arg(workspace)
                .args(["rev-list", "--count", "--first-parent", "HEAD"]),
            None,
        )
        .await
        .map_err(|e| PipelineError::HistoryUnavailable(e.to_string()))?;

        let version = parse_count(&output.stdout)?;
        debug!("Resolved version {} for {}", version, workspace.display());

        Ok(version)
    }
}

fn parse_count(raw: &str) -> Result<VersionNumber, PipelineError> {
    let count: u64 = raw.trim().parse().map_err(|_| {
        PipelineError::HistoryUnavailable(format!("unexpected rev-list output '{}'", raw.trim()))
    })?;

    if count == 0 {
        return Err(PipelineError::HistoryUnavailable(
            "repository has no commits".to_string(),
        ));
    }

    Ok(VersionNumber::new(count))
}
