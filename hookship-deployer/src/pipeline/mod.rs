//! Deployment pipeline
//!
//! - [`PipelineOrchestrator`] runs one trigger through every stage
//! - [`TriggerDispatcher`] schedules triggers: one task per trigger, bounded
//!   parallelism, and at most one active run per repository
//! - [`PipelineRun`] tracks a single run's state machine and owns its
//!   workspace
//! - [`RetryPolicy`] bounds retries of transient failures

mod dispatcher;
mod orchestrator;
mod retry;
mod run;

pub use dispatcher::{RunHandle, TriggerDispatcher, TriggerPolicy};
pub use orchestrator::{PipelineOrchestrator, PipelineServices};
pub use retry::RetryPolicy;
pub use run::PipelineRun;
