//! Pipeline run state
//!
//! A [`PipelineRun`] exists for the lifetime of one trigger's execution. It
//! owns the run's workspace and releases it as soon as the run reaches a
//! terminal state. The current state is published on a watch channel so run
//! listings can observe it without locking the run.

use chrono::{DateTime, Utc};
use hookship_core::PipelineError;
use hookship_core::domain::image::ImageRef;
use hookship_core::domain::repository::RepositoryRef;
use hookship_core::domain::run::{RunState, Stage};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::workspace::Workspace;

/// State of one in-flight pipeline run
#[derive(Debug)]
pub struct PipelineRun {
    id: Uuid,
    repository: RepositoryRef,
    started_at: DateTime<Utc>,
    state: watch::Sender<RunState>,
    completed: Vec<Stage>,
    workspace: Option<Workspace>,
    published: Option<ImageRef>,
}

impl PipelineRun {
    pub fn new(repository: RepositoryRef) -> Self {
        let (state, _) = watch::channel(RunState::Idle);

        Self {
            id: Uuid::new_v4(),
            repository,
            started_at: Utc::now(),
            state,
            completed: Vec::new(),
            workspace: None,
            published: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repository
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Stages that finished successfully, in order
    pub fn completed_stages(&self) -> &[Stage] {
        &self.completed
    }

    /// Image that reached the registry, if any
    pub fn published(&self) -> Option<&ImageRef> {
        self.published.as_ref()
    }

    pub fn attach_workspace(&mut self, workspace: Workspace) {
        self.workspace = Some(workspace);
    }

    pub fn record_published(&mut self, image: ImageRef) {
        self.published = Some(image);
    }

    /// Moves into `stage`, marking the previous stage as completed
    pub fn enter(&mut self, stage: Stage) {
        if let RunState::Running(previous) = self.state() {
            self.completed.push(previous);
        }
        self.transition(RunState::Running(stage));
    }

    /// Marks the run as succeeded and releases its workspace
    pub fn succeed(&mut self) {
        if let RunState::Running(previous) = self.state() {
            self.completed.push(previous);
        }
        self.release_workspace();
        self.transition(RunState::Succeeded);
    }

    /// Marks the run as failed at `stage` and releases its workspace
    pub fn fail(&mut self, stage: Stage, cause: PipelineError) {
        self.release_workspace();
        self.transition(RunState::Failed { stage, cause });
    }

    fn transition(&mut self, next: RunState) {
        let current = self.state();
        if !current.can_transition_to(&next) {
            // The orchestrator only drives legal transitions
            warn!(
                "Run {} ignored illegal transition {} -> {}",
                self.id, current, next
            );
            return;
        }

        debug!("Run {}: {} -> {}", self.id, current, next);
        self.state.send_replace(next);
    }

    fn release_workspace(&mut self) {
        if let Some(workspace) = self.workspace.take() {
            let path = workspace.path().display().to_string();
            if let Err(e) = workspace.release() {
                warn!("Failed to remove workspace {}: {}", path, e);
            }
        }
    }
}
