//! Image build and publish service
//!
//! Wraps the container engine CLI:
//! - Logging in to the registry (cached process-wide with an expiry)
//! - Pulling the currently deployed image to warm the build cache
//! - Building a tagged image from a workspace
//! - Pushing the built image

use async_trait::async_trait;
use hookship_core::PipelineError;
use hookship_core::domain::image::ImageRef;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::process::{self, CommandError};

/// Service trait for building and publishing images
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Logs in to the registry
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), PipelineError>;

    /// Pulls an image into the local cache
    async fn pull(&self, image: &ImageRef) -> Result<(), PipelineError>;

    /// Builds `image` from the build description at the workspace root
    ///
    /// `cache_from` names a locally available image to reuse layers from.
    async fn build(
        &self,
        workspace: &Path,
        image: &ImageRef,
        cache_from: Option<&ImageRef>,
    ) -> Result<ImageRef, PipelineError>;

    /// Publishes a previously built image
    async fn push(&self, image: &ImageRef) -> Result<(), PipelineError>;
}

/// Docker CLI implementation of ImageBuilder
pub struct DockerImageBuilder {
    program: String,
    /// Arguments placed before every subcommand (e.g., `sudo docker`)
    prefix: Vec<String>,
    auth_ttl: Duration,

    /// When the last successful login happened
    session: Mutex<Option<Instant>>,
}

impl DockerImageBuilder {
    /// Creates a builder driving the `docker` CLI
    ///
    /// # Arguments
    /// * `auth_ttl` - How long a successful login is reused
    pub fn new(auth_ttl: Duration) -> Self {
        Self::with_command("docker", Vec::<String>::new(), auth_ttl)
    }

    /// Creates a builder driving a compatible CLI
    ///
    /// # Arguments
    /// * `program` - Executable to run (e.g., "podman", "sudo")
    /// * `prefix` - Arguments placed before every subcommand (e.g., ["docker"])
    /// * `auth_ttl` - How long a successful login is reused
    pub fn with_command<I, S>(program: impl Into<String>, prefix: I, auth_ttl: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            prefix: prefix.into_iter().map(Into::into).collect(),
            auth_ttl,
            session: Mutex::new(None),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.prefix);
        command
    }

    fn session_is_fresh(&self) -> bool {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session.is_some_and(|at| at.elapsed() < self.auth_ttl)
    }

    fn set_session(&self, at: Option<Instant>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    /// Forgets the cached login so the next run logs in again
    pub fn invalidate_session(&self) {
        self.set_session(None);
    }
}

#[async_trait]
impl ImageBuilder for DockerImageBuilder {
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), PipelineError> {
        if self.session_is_fresh() {
            debug!("Reusing cached registry login for {}", credentials.username);
            return Ok(());
        }

        info!("Logging in to registry as {}", credentials.username);

        let result = process::run(
            self.command().args([
                "login",
                "--username",
                &credentials.username,
                "--password-stdin",
            ]),
            Some(credentials.password.as_bytes()),
        )
        .await;

        match result {
            Ok(_) => {
                self.set_session(Some(Instant::now()));
                Ok(())
            }
            Err(e) => {
                self.invalidate_session();
                Err(PipelineError::AuthFailed(e.to_string()))
            }
        }
    }

    async fn pull(&self, image: &ImageRef) -> Result<(), PipelineError> {
        info!("Pulling {}", image);

        process::run(self.command().arg("pull").arg(image.render()), None)
            .await
            .map_err(|e| PipelineError::PullFailed(e.to_string()))?;

        Ok(())
    }

    async fn build(
        &self,
        workspace: &Path,
        image: &ImageRef,
        cache_from: Option<&ImageRef>,
    ) -> Result<ImageRef, PipelineError> {
        info!("Building {} from {}", image, workspace.display());

        let mut command = self.command();
        command.arg("build").arg("--tag").arg(image.render());
        if let Some(cache) = cache_from {
            command.arg("--cache-from").arg(cache.render());
        }
        command.arg(workspace);

        process::run(&mut command, None)
            .await
            .map_err(|e| PipelineError::BuildFailed(e.to_string()))?;

        info!("Built {}", image);
        Ok(image.clone())
    }

    async fn push(&self, image: &ImageRef) -> Result<(), PipelineError> {
        info!("Pushing {}", image);

        let result = process::run(self.command().arg("push").arg(image.render()), None).await;

        if let Err(e) = result {
            if is_auth_rejection(&e) {
                warn!("Registry rejected credentials during push, dropping cached login");
                self.invalidate_session();
            }
            return Err(PipelineError::PushFailed {
                attempts: 1,
                cause: e.to_string(),
            });
        }

        Ok(())
    }
}

/// Whether a failed command looks like an expired or refused registry login
fn is_auth_rejection(err: &CommandError) -> bool {
    match err {
        CommandError::Failed { detail, .. } => {
            let detail = detail.to_lowercase();
            detail.contains("unauthorized")
                || detail.contains("authentication required")
                || detail.contains("denied")
        }
        CommandError::Spawn { .. } => false,
    }
}
