//! Pipeline orchestrator
//!
//! Runs one trigger through the stage sequence:
//!
//! 1. Fetching: allocate a workspace and clone the repository into it
//! 2. Versioning: count first-parent commits
//! 3. Authenticating: log in to the registry
//! 4. Building: pull the current image as a warm cache, then build
//! 5. Pushing: publish the image, retrying transient failures
//! 6. Deploying: hand the instruction to the update authority
//!
//! A stage starts only after the previous one succeeded. The first fatal
//! error ends the run; the workspace is released on every exit path and no
//! completed side effect is undone.

use hookship_core::PipelineError;
use hookship_core::domain::deploy::DeployInstruction;
use hookship_core::domain::image::ImageRef;
use hookship_core::domain::repository::RepositoryRef;
use hookship_core::domain::run::{RunOutcome, Stage};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::pipeline::run::PipelineRun;
use crate::service::{ImageBuilder, SourceService, UpdateService, VersionResolver};
use crate::workspace::WorkspaceRoot;

/// External capabilities used by the stages
#[derive(Clone)]
pub struct PipelineServices {
    pub source: Arc<dyn SourceService>,
    pub versions: Arc<dyn VersionResolver>,
    pub images: Arc<dyn ImageBuilder>,
    pub updates: Arc<dyn UpdateService>,
}

/// Failure of a single stage
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    cause: PipelineError,
}

impl StageFailure {
    fn new(stage: Stage, cause: PipelineError) -> Self {
        Self { stage, cause }
    }
}

/// Sequences the stages of one run
pub struct PipelineOrchestrator {
    config: Arc<Config>,
    workspaces: WorkspaceRoot,
    services: PipelineServices,
}

impl PipelineOrchestrator {
    pub fn new(config: Arc<Config>, services: PipelineServices) -> Self {
        let workspaces = WorkspaceRoot::new(config.workspace_root.clone());
        Self {
            config,
            workspaces,
            services,
        }
    }

    /// Runs the pipeline for one repository to completion
    pub async fn run(&self, repository: RepositoryRef) -> RunOutcome {
        self.execute(PipelineRun::new(repository), &CancellationToken::new())
            .await
    }

    /// Runs a prepared run, checking `cancel` between stages
    ///
    /// A cancelled run lets the in-flight external call finish, skips the
    /// next stage and fails with [`PipelineError::Cancelled`] at that stage.
    pub async fn execute(&self, mut run: PipelineRun, cancel: &CancellationToken) -> RunOutcome {
        info!("Starting run {} for {}", run.id(), run.repository());

        match self.drive(&mut run, cancel).await {
            Ok(image) => {
                run.succeed();
                info!(
                    "Run {} for {} succeeded: deployed {}",
                    run.id(),
                    run.repository().name(),
                    image
                );
                RunOutcome::Succeeded(image)
            }
            Err(StageFailure { stage, cause }) => {
                let published = run.published().cloned();
                let completed: Vec<&str> =
                    run.completed_stages().iter().map(|s| s.as_str()).collect();
                error!(
                    "Run {} for {} failed at {} (completed: [{}]): {}",
                    run.id(),
                    run.repository().name(),
                    stage,
                    completed.join(", "),
                    cause
                );
                if let Some(image) = &published {
                    warn!(
                        "{} was pushed but not deployed; it remains in the registry",
                        image
                    );
                }
                run.fail(stage, cause.clone());
                RunOutcome::Failed {
                    stage,
                    cause,
                    published,
                }
            }
        }
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<ImageRef, StageFailure> {
        let config = &self.config;
        let timeouts = config.timeouts;
        let repository = run.repository().clone();

        // Fetching
        enter(run, Stage::Fetching, cancel)?;
        let workspace = self
            .workspaces
            .allocate(&repository, run.id())
            .map_err(|e| {
                StageFailure::new(
                    Stage::Fetching,
                    PipelineError::FetchFailed(format!("failed to create workspace: {}", e)),
                )
            })?;
        let path: PathBuf = workspace.path().to_path_buf();
        run.attach_workspace(workspace);

        within(
            Stage::Fetching,
            timeouts.fetch,
            self.services
                .source
                .fetch(repository.source_url(), &config.source, &path),
        )
        .await?;

        // Versioning
        enter(run, Stage::Versioning, cancel)?;
        let version = within(
            Stage::Versioning,
            timeouts.version,
            self.services.versions.resolve(&path),
        )
        .await?;
        info!("{} resolved to version {}", repository.name(), version);

        // Authenticating
        enter(run, Stage::Authenticating, cancel)?;
        within(
            Stage::Authenticating,
            timeouts.auth,
            self.services.images.authenticate(&config.registry),
        )
        .await?;

        // Building
        enter(run, Stage::Building, cancel)?;
        let candidate = ImageRef::versioned(&config.registry.username, repository.name(), version);
        let cache_from = self.warm_cache(&repository).await;
        let image = within(
            Stage::Building,
            timeouts.build,
            self.services
                .images
                .build(&path, &candidate, cache_from.as_ref()),
        )
        .await?;

        // Pushing
        enter(run, Stage::Pushing, cancel)?;
        self.push(&image).await?;
        run.record_published(image.clone());

        // Deploying
        enter(run, Stage::Deploying, cancel)?;
        let instruction = DeployInstruction::for_repository(&repository, image.clone());
        self.deploy(&instruction).await?;

        Ok(image)
    }

    /// Pulls the currently deployed image; any failure only costs the cache
    async fn warm_cache(&self, repository: &RepositoryRef) -> Option<ImageRef> {
        let latest = ImageRef::latest(&self.config.registry.username, repository.name());

        let pulled = match tokio::time::timeout(
            self.config.timeouts.pull,
            self.services.images.pull(&latest),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PipelineError::PullFailed(format!(
                "timed out after {:?}",
                self.config.timeouts.pull
            ))),
        };

        match pulled {
            Ok(()) => Some(latest),
            Err(e) => {
                warn!("{}; building {} without a warm cache", e, repository.name());
                None
            }
        }
    }

    /// Pushes with bounded retries; the build is never repeated
    async fn push(&self, image: &ImageRef) -> Result<(), StageFailure> {
        let limit = self.config.timeouts.push;
        let label = format!("Push of {}", image);

        self.config
            .push_retry
            .run(&label, |_| async move {
                match tokio::time::timeout(limit, self.services.images.push(image)).await {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::PushFailed {
                        attempts: 1,
                        cause: format!("timed out after {:?}", limit),
                    }),
                }
            })
            .await
            .map_err(|(attempts, e)| {
                let cause = match e {
                    PipelineError::PushFailed { cause, .. } => cause,
                    other => other.to_string(),
                };
                StageFailure::new(Stage::Pushing, PipelineError::PushFailed { attempts, cause })
            })
    }

    /// Sends the deploy instruction
    ///
    /// Retried once only when the request never left the client. Any other
    /// failure, including a timeout, leaves the remote outcome unknown and
    /// is reported as is.
    async fn deploy(&self, instruction: &DeployInstruction) -> Result<(), StageFailure> {
        let limit = self.config.timeouts.deploy;
        let fail = |cause| StageFailure::new(Stage::Deploying, cause);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result =
                tokio::time::timeout(limit, self.services.updates.deploy(instruction, limit)).await;

            match result {
                Err(_) => return Err(fail(PipelineError::UpdateTimedOut(limit))),
                Ok(Ok(ack)) if ack.accepted => {
                    info!(
                        "Update authority accepted {} for {}: {}",
                        instruction.image(),
                        instruction.service_name(),
                        ack.detail
                    );
                    return Ok(());
                }
                Ok(Ok(ack)) => return Err(fail(PipelineError::UpdateRejected(ack.detail))),
                Ok(Err(e)) if e.is_not_sent() && attempt == 1 => {
                    warn!("Deploy request was not sent ({}), retrying once", e);
                }
                Ok(Err(e)) if e.is_timeout() => {
                    return Err(fail(PipelineError::UpdateTimedOut(limit)));
                }
                Ok(Err(e)) => return Err(fail(PipelineError::UpdateFailed(e.to_string()))),
            }
        }
    }
}

/// Advances the run into `stage` unless the run was cancelled
fn enter(
    run: &mut PipelineRun,
    stage: Stage,
    cancel: &CancellationToken,
) -> Result<(), StageFailure> {
    if cancel.is_cancelled() {
        warn!("Run {} cancelled before {}", run.id(), stage);
        return Err(StageFailure::new(stage, PipelineError::Cancelled));
    }

    info!("Run {} for {}: {}", run.id(), run.repository().name(), stage);
    run.enter(stage);
    Ok(())
}

/// Bounds a stage's external call by `limit`
async fn within<T>(
    stage: Stage,
    limit: Duration,
    call: impl Future<Output = Result<T, PipelineError>>,
) -> Result<T, StageFailure> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => Err(StageFailure::new(stage, cause)),
        Err(_) => Err(StageFailure::new(stage, timed_out(stage, limit))),
    }
}

/// Error a stage reports when its call outlives the limit
fn timed_out(stage: Stage, limit: Duration) -> PipelineError {
    let cause = format!("timed out after {:?}", limit);
    match stage {
        Stage::Fetching => PipelineError::FetchFailed(cause),
        Stage::Versioning => PipelineError::HistoryUnavailable(cause),
        Stage::Authenticating => PipelineError::AuthFailed(cause),
        Stage::Building => PipelineError::BuildFailed(cause),
        Stage::Pushing => PipelineError::PushFailed { attempts: 1, cause },
        Stage::Deploying => PipelineError::UpdateTimedOut(limit),
    }
}
