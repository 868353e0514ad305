//! Pipeline error taxonomy
//!
//! Every stage reports failures through [`PipelineError`]. Causes are carried
//! as rendered strings so a single outcome can be handed to every caller
//! waiting on the same run.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while configuring or running a deployment pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// One or more required configuration values are absent
    #[error("missing required configuration: {}", .0.join(", "))]
    ConfigMissing(Vec<String>),

    /// One or more optional configuration values could not be parsed
    #[error("invalid configuration: {}", .0.join(", "))]
    ConfigInvalid(Vec<String>),

    /// The trigger named a repository that fails validation
    #[error("invalid repository: {0}")]
    InvalidRepository(String),

    /// The source checkout could not be fetched
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// The commit history could not be turned into a version number
    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),

    /// Registry login was refused
    #[error("registry authentication failed: {0}")]
    AuthFailed(String),

    /// The warm-cache pull failed (never fatal)
    #[error("pull failed: {0}")]
    PullFailed(String),

    /// The image build exited unsuccessfully
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// Publishing the image failed after every allowed attempt
    #[error("push failed after {attempts} attempt(s): {cause}")]
    PushFailed { attempts: u32, cause: String },

    /// The update authority did not answer within the deadline
    #[error("update timed out after {0:?}")]
    UpdateTimedOut(Duration),

    /// The update authority answered but refused the instruction
    #[error("update rejected: {0}")]
    UpdateRejected(String),

    /// The deploy request failed after it left the client
    #[error("update failed: {0}")]
    UpdateFailed(String),

    /// A run for the same repository is already active
    #[error("a run for '{0}' is already in progress")]
    RunInProgress(String),

    /// The run was cancelled between stages
    #[error("run cancelled")]
    Cancelled,
}
