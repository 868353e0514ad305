//! Trigger dispatcher
//!
//! Every accepted trigger is driven by its own tokio task. A semaphore bounds
//! how many runs execute at once across repositories, and a per-name slot
//! keeps runs for the same repository strictly sequential: the next run for a
//! name starts only after the previous one ended and released its workspace.

use chrono::{DateTime, Utc};
use hookship_core::PipelineError;
use hookship_core::domain::repository::RepositoryRef;
use hookship_core::domain::run::{RunOutcome, RunState};
use hookship_core::dto::run::{ActiveRun, Admission};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::pipeline::run::PipelineRun;

/// What to do with a trigger for a repository that already has a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerPolicy {
    /// Keep at most one pending trigger; later ones coalesce into it
    #[default]
    Queue,
    /// Refuse the trigger with [`PipelineError::RunInProgress`]
    Reject,
}

impl FromStr for TriggerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown trigger policy '{}'", other)),
        }
    }
}

impl fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => f.write_str("queue"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Handle to a submitted trigger
#[derive(Debug)]
pub struct RunHandle {
    repository: String,
    admission: Admission,
    outcome: oneshot::Receiver<RunOutcome>,
}

impl RunHandle {
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Waits for the run that serves this trigger to finish
    ///
    /// Returns `None` only if the driving task went away without reporting.
    pub async fn outcome(self) -> Option<RunOutcome> {
        self.outcome.await.ok()
    }
}

struct ActiveSlot {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
}

struct Pending {
    repository: RepositoryRef,
    waiters: Vec<oneshot::Sender<RunOutcome>>,
}

/// Scheduling state for one repository name
///
/// The slot exists from the first accepted trigger until the last run for
/// the name finished with nothing pending.
#[derive(Default)]
struct Slot {
    current: Option<ActiveSlot>,
    pending: Option<Pending>,
}

struct Inner {
    orchestrator: PipelineOrchestrator,
    policy: TriggerPolicy,
    permits: Semaphore,
    slots: Mutex<HashMap<String, Slot>>,
    tasks: TaskTracker,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Schedules triggers onto pipeline runs
#[derive(Clone)]
pub struct TriggerDispatcher {
    inner: Arc<Inner>,
}

impl TriggerDispatcher {
    /// Creates a dispatcher
    ///
    /// # Arguments
    /// * `orchestrator` - Runs each scheduled trigger
    /// * `policy` - Same-repository supersession policy
    /// * `max_parallel_runs` - Max runs executing at once
    pub fn new(
        orchestrator: PipelineOrchestrator,
        policy: TriggerPolicy,
        max_parallel_runs: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                policy,
                permits: Semaphore::new(max_parallel_runs.max(1)),
                slots: Mutex::new(HashMap::new()),
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Accepts a trigger and schedules it
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, repository: RepositoryRef) -> Result<RunHandle, PipelineError> {
        let name = repository.name().to_string();
        let (tx, rx) = oneshot::channel();

        let mut slots = self.inner.slots();
        let admission = match slots.get_mut(&name) {
            Some(_) if self.inner.policy == TriggerPolicy::Reject => {
                warn!("Rejecting trigger for {}: a run is in progress", name);
                return Err(PipelineError::RunInProgress(name));
            }
            Some(slot) => match slot.pending.as_mut() {
                Some(pending) => {
                    pending.repository = repository;
                    pending.waiters.push(tx);
                    Admission::Coalesced
                }
                None => {
                    slot.pending = Some(Pending {
                        repository,
                        waiters: vec![tx],
                    });
                    Admission::Queued
                }
            },
            None => {
                slots.insert(name.clone(), Slot::default());
                self.inner
                    .tasks
                    .spawn(drive(self.inner.clone(), repository, vec![tx]));
                Admission::Started
            }
        };
        drop(slots);

        info!("Trigger for {} accepted ({:?})", name, admission);

        Ok(RunHandle {
            repository: name,
            admission,
            outcome: rx,
        })
    }

    /// Cancels the active run for `name`
    ///
    /// The run stops before its next stage. A pending trigger for the same
    /// name still runs afterwards. Returns false when no run is active.
    pub fn cancel(&self, name: &str) -> bool {
        let slots = self.inner.slots();
        match slots.get(name).and_then(|slot| slot.current.as_ref()) {
            Some(active) => {
                info!("Cancelling run {} for {}", active.run_id, name);
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every active run and drops pending triggers
    pub fn cancel_all(&self) {
        let mut slots = self.inner.slots();
        for (name, slot) in slots.iter_mut() {
            if slot.pending.take().is_some() {
                info!("Dropping pending trigger for {}", name);
            }
            if let Some(active) = &slot.current {
                active.cancel.cancel();
            }
        }
    }

    /// Cancels every run and waits for the driving tasks to finish
    ///
    /// Each run releases its workspace before its task ends. Returns false
    /// when `grace` elapsed first.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.cancel_all();
        self.inner.tasks.close();
        tokio::time::timeout(grace, self.inner.tasks.wait())
            .await
            .is_ok()
    }

    /// Active and pending runs, ordered by repository name
    pub fn active(&self) -> Vec<ActiveRun> {
        let slots = self.inner.slots();
        let mut runs: Vec<ActiveRun> = slots
            .iter()
            .map(|(name, slot)| ActiveRun {
                repository: name.clone(),
                run_id: slot.current.as_ref().map(|a| a.run_id),
                state: slot
                    .current
                    .as_ref()
                    .map(|a| a.state.borrow().to_string())
                    .unwrap_or_else(|| RunState::Idle.to_string()),
                started_at: slot.current.as_ref().map(|a| a.started_at),
                pending: slot.pending.is_some(),
            })
            .collect();

        runs.sort_by(|a, b| a.repository.cmp(&b.repository));
        runs
    }
}

/// Runs triggers for one repository name until none is pending
async fn drive(
    inner: Arc<Inner>,
    mut repository: RepositoryRef,
    mut waiters: Vec<oneshot::Sender<RunOutcome>>,
) {
    let name = repository.name().to_string();

    loop {
        let run = PipelineRun::new(repository);
        let cancel = CancellationToken::new();

        {
            let mut slots = inner.slots();
            if let Some(slot) = slots.get_mut(&name) {
                slot.current = Some(ActiveSlot {
                    run_id: run.id(),
                    started_at: run.started_at(),
                    cancel: cancel.clone(),
                    state: run.subscribe(),
                });
            }
        }

        let outcome = match inner.permits.acquire().await {
            Ok(_permit) => inner.orchestrator.execute(run, &cancel).await,
            Err(_) => {
                warn!("Run permits closed, abandoning runs for {}", name);
                break;
            }
        };

        // Release the slot before reporting so a caller reacting to the
        // outcome sees the name as free
        let next = {
            let mut slots = inner.slots();
            let pending = slots.get_mut(&name).and_then(|slot| {
                slot.current = None;
                slot.pending.take()
            });
            if pending.is_none() {
                slots.remove(&name);
            }
            pending
        };

        for waiter in waiters.drain(..) {
            // The submitter may have stopped listening
            let _ = waiter.send(outcome.clone());
        }

        match next {
            Some(pending) => {
                info!("Starting queued run for {}", name);
                repository = pending.repository;
                waiters = pending.waiters;
            }
            None => break,
        }
    }
}
