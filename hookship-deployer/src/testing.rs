//! Test helpers: scratch git repositories and recording service fakes

use async_trait::async_trait;
use hookship_client::ClientError;
use hookship_core::PipelineError;
use hookship_core::domain::deploy::DeployInstruction;
use hookship_core::domain::image::{ImageRef, VersionNumber};
use hookship_core::dto::deploy::DeployResponse;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Credentials};
use crate::pipeline::{PipelineOrchestrator, PipelineServices, RetryPolicy};
use crate::service::{ImageBuilder, SourceService, UpdateService, VersionResolver};

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Runs git in `repo` with a fixed identity, panicking on failure
pub fn git(repo: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["-c", "user.name=Hookship Test", "-c", "user.email=test@hookship.local"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Commits a new file named after `message`
pub fn commit(repo: &Path, message: &str) {
    let file = format!("{}.txt", message.replace(' ', "-"));
    std::fs::write(repo.join(&file), message).unwrap();
    git(repo, &["add", &file]);
    git(repo, &["commit", "-q", "-m", message]);
}

/// Creates a repository with a Dockerfile and `commits` linear commits
pub fn init_repo(path: &Path, commits: usize) {
    std::fs::create_dir_all(path).unwrap();
    git(path, &["init", "-q"]);
    std::fs::write(path.join("Dockerfile"), "FROM scratch\n").unwrap();
    git(path, &["add", "Dockerfile"]);

    for i in 1..=commits {
        if i == 1 {
            git(path, &["commit", "-q", "-m", "commit 1"]);
        } else {
            commit(path, &format!("commit {}", i));
        }
    }
}

/// Stage a [`Harness`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Fetch,
    Version,
    Auth,
    Build,
    Push,
    Deploy,
}

#[derive(Default)]
pub struct FakeSource {
    fetches: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl FakeSource {
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fail(&self, cause: &str) {
        *self.failure.lock().unwrap() = Some(cause.to_string());
    }
}

#[async_trait]
impl SourceService for FakeSource {
    async fn fetch(
        &self,
        source_url: &str,
        _credentials: &Credentials,
        dest: &Path,
    ) -> Result<(), PipelineError> {
        if let Some(cause) = self.failure.lock().unwrap().clone() {
            return Err(PipelineError::FetchFailed(cause));
        }

        std::fs::write(dest.join("Dockerfile"), "FROM scratch\n").unwrap();
        self.fetches.lock().unwrap().push(source_url.to_string());
        Ok(())
    }
}

pub struct FakeVersions {
    version: u64,
    failure: Mutex<Option<String>>,
}

impl FakeVersions {
    pub fn fail(&self, cause: &str) {
        *self.failure.lock().unwrap() = Some(cause.to_string());
    }
}

#[async_trait]
impl VersionResolver for FakeVersions {
    async fn resolve(&self, workspace: &Path) -> Result<VersionNumber, PipelineError> {
        if let Some(cause) = self.failure.lock().unwrap().clone() {
            return Err(PipelineError::HistoryUnavailable(cause));
        }

        assert!(workspace.join("Dockerfile").is_file(), "resolved before fetch");
        Ok(VersionNumber::new(self.version))
    }
}

#[derive(Default)]
struct ImagesState {
    auth_failure: Option<String>,
    pull_failure: Option<String>,
    build_failure: Option<String>,
    build_delay: Option<Duration>,
    cancel_on_build: Option<CancellationToken>,
    push_failures_left: u32,

    builds: usize,
    cache_sources: Vec<Option<ImageRef>>,
    push_attempts: usize,
    pushes: Vec<ImageRef>,
}

#[derive(Default)]
pub struct FakeImages {
    state: Mutex<ImagesState>,
    building: AtomicUsize,
    max_building: AtomicUsize,
}

impl FakeImages {
    pub fn fail_auth(&self, cause: &str) {
        self.state.lock().unwrap().auth_failure = Some(cause.to_string());
    }

    pub fn fail_pull(&self, cause: &str) {
        self.state.lock().unwrap().pull_failure = Some(cause.to_string());
    }

    pub fn fail_build(&self, cause: &str) {
        self.state.lock().unwrap().build_failure = Some(cause.to_string());
    }

    /// Fails the next `count` push attempts
    pub fn fail_pushes(&self, count: u32) {
        self.state.lock().unwrap().push_failures_left = count;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.auth_failure = None;
        state.pull_failure = None;
        state.build_failure = None;
        state.push_failures_left = 0;
    }

    /// Holds every build for `delay` so concurrent builds overlap
    pub fn delay_build(&self, delay: Duration) {
        self.state.lock().unwrap().build_delay = Some(delay);
    }

    /// Cancels `token` while a build is in flight
    pub fn cancel_during_build(&self, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on_build = Some(token);
    }

    pub fn builds(&self) -> usize {
        self.state.lock().unwrap().builds
    }

    pub fn cache_sources(&self) -> Vec<Option<ImageRef>> {
        self.state.lock().unwrap().cache_sources.clone()
    }

    pub fn push_attempts(&self) -> usize {
        self.state.lock().unwrap().push_attempts
    }

    pub fn pushes(&self) -> Vec<ImageRef> {
        self.state.lock().unwrap().pushes.clone()
    }

    /// Most builds ever in flight at once
    pub fn max_concurrent_builds(&self) -> usize {
        self.max_building.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBuilder for FakeImages {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<(), PipelineError> {
        match self.state.lock().unwrap().auth_failure.clone() {
            Some(cause) => Err(PipelineError::AuthFailed(cause)),
            None => Ok(()),
        }
    }

    async fn pull(&self, _image: &ImageRef) -> Result<(), PipelineError> {
        match self.state.lock().unwrap().pull_failure.clone() {
            Some(cause) => Err(PipelineError::PullFailed(cause)),
            None => Ok(()),
        }
    }

    async fn build(
        &self,
        _workspace: &Path,
        image: &ImageRef,
        cache_from: Option<&ImageRef>,
    ) -> Result<ImageRef, PipelineError> {
        let in_flight = self.building.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_building.fetch_max(in_flight, Ordering::SeqCst);

        let (delay, cancel, failure) = {
            let mut state = self.state.lock().unwrap();
            state.builds += 1;
            state.cache_sources.push(cache_from.cloned());
            (
                state.build_delay,
                state.cancel_on_build.clone(),
                state.build_failure.clone(),
            )
        };

        if let Some(token) = cancel {
            token.cancel();
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.building.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(cause) => Err(PipelineError::BuildFailed(cause)),
            None => Ok(image.clone()),
        }
    }

    async fn push(&self, image: &ImageRef) -> Result<(), PipelineError> {
        let mut state = self.state.lock().unwrap();
        state.push_attempts += 1;

        if state.push_failures_left > 0 {
            state.push_failures_left -= 1;
            return Err(PipelineError::PushFailed {
                attempts: 1,
                cause: "connection reset by peer".to_string(),
            });
        }

        state.pushes.push(image.clone());
        Ok(())
    }
}

#[derive(Default)]
struct UpdatesState {
    errors: VecDeque<ClientError>,
    rejection: Option<String>,
    delay: Option<Duration>,
    attempts: usize,
    instructions: Vec<DeployInstruction>,
}

#[derive(Default)]
pub struct FakeUpdates {
    state: Mutex<UpdatesState>,
}

impl FakeUpdates {
    /// Answers the next calls with `errors`, in order
    pub fn fail_with(&self, errors: Vec<ClientError>) {
        self.state.lock().unwrap().errors = errors.into();
    }

    pub fn reject(&self, detail: &str) {
        self.state.lock().unwrap().rejection = Some(detail.to_string());
    }

    pub fn delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    /// Instructions that reached the authority
    pub fn instructions(&self) -> Vec<DeployInstruction> {
        self.state.lock().unwrap().instructions.clone()
    }
}

#[async_trait]
impl UpdateService for FakeUpdates {
    async fn deploy(
        &self,
        instruction: &DeployInstruction,
        _timeout: Duration,
    ) -> Result<DeployResponse, ClientError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.attempts += 1;
            if let Some(err) = state.errors.pop_front() {
                return Err(err);
            }
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.instructions.push(instruction.clone());

        Ok(match state.rejection.clone() {
            Some(detail) => DeployResponse {
                accepted: false,
                detail,
            },
            None => DeployResponse {
                accepted: true,
                detail: format!("{} updated", instruction.service_name()),
            },
        })
    }
}

/// Orchestrator wiring over recording fakes and a scratch workspace root
pub struct Harness {
    root: tempfile::TempDir,
    pub source: Arc<FakeSource>,
    pub versions: Arc<FakeVersions>,
    pub images: Arc<FakeImages>,
    pub updates: Arc<FakeUpdates>,
}

impl Harness {
    /// Harness whose repositories all resolve to `version`
    pub fn new(version: u64) -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            source: Arc::new(FakeSource::default()),
            versions: Arc::new(FakeVersions {
                version,
                failure: Mutex::new(None),
            }),
            images: Arc::new(FakeImages::default()),
            updates: Arc::new(FakeUpdates::default()),
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::new(
            Credentials::new("acme", "registry-secret"),
            Credentials::new("acme-bot", "source-secret"),
            "http://update.invalid".to_string(),
        );
        config.workspace_root = self.workspace_root();
        config.push_retry = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        config
    }

    pub fn services(&self) -> PipelineServices {
        PipelineServices {
            source: self.source.clone(),
            versions: self.versions.clone(),
            images: self.images.clone(),
            updates: self.updates.clone(),
        }
    }

    pub fn orchestrator(&self) -> PipelineOrchestrator {
        self.orchestrator_with(|_| {})
    }

    pub fn orchestrator_with(&self, adjust: impl FnOnce(&mut Config)) -> PipelineOrchestrator {
        let mut config = self.config();
        adjust(&mut config);
        PipelineOrchestrator::new(Arc::new(config), self.services())
    }

    pub fn inject(&self, failure: FakeFailure) {
        match failure {
            FakeFailure::Fetch => self.source.fail("repository not found"),
            FakeFailure::Version => self.versions.fail("no commits"),
            FakeFailure::Auth => self.images.fail_auth("unauthorized"),
            FakeFailure::Build => self.images.fail_build("exit status 1"),
            FakeFailure::Push => self.images.fail_pushes(u32::MAX),
            FakeFailure::Deploy => self
                .updates
                .fail_with(vec![ClientError::api_error(500, "internal error")]),
        }
    }

    pub fn workspace_root(&self) -> std::path::PathBuf {
        self.root.path().join("workspaces")
    }

    /// True when no run left a workspace behind
    pub fn workspace_root_is_empty(&self) -> bool {
        match std::fs::read_dir(self.workspace_root()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}
