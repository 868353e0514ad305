//! Pipeline run domain types
//!
//! A run walks a strict forward sequence of stages:
//!
//! ```text
//! Idle -> Fetching -> Versioning -> Authenticating -> Building
//!      -> Pushing -> Deploying -> Succeeded
//! ```
//!
//! `Failed` is reachable from every non-terminal state. No state is revisited.

use serde::Serialize;
use std::fmt;

use crate::domain::image::ImageRef;
use crate::error::PipelineError;

/// A pipeline stage that performs external work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Fetching,
    Versioning,
    Authenticating,
    Building,
    Pushing,
    Deploying,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 6] = [
        Stage::Fetching,
        Stage::Versioning,
        Stage::Authenticating,
        Stage::Building,
        Stage::Pushing,
        Stage::Deploying,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetching => "Fetching",
            Stage::Versioning => "Versioning",
            Stage::Authenticating => "Authenticating",
            Stage::Building => "Building",
            Stage::Pushing => "Pushing",
            Stage::Deploying => "Deploying",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(Stage),
    Succeeded,
    Failed { stage: Stage, cause: PipelineError },
}

impl RunState {
    /// Position in the forward sequence; `None` for `Failed`
    fn position(&self) -> Option<usize> {
        match self {
            RunState::Idle => Some(0),
            RunState::Running(stage) => Stage::ALL.iter().position(|s| s == stage).map(|i| i + 1),
            RunState::Succeeded => Some(Stage::ALL.len() + 1),
            RunState::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed { .. })
    }

    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// Non-failure transitions advance exactly one step. `Failed` may follow
    /// any non-terminal state. Terminal states accept nothing.
    pub fn can_transition_to(&self, next: &RunState) -> bool {
        if self.is_terminal() {
            return false;
        }

        match (self.position(), next.position()) {
            (_, None) => true,
            (Some(current), Some(following)) => following == current + 1,
            (None, Some(_)) => false,
        }
    }

    /// Stage currently executing, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RunState::Running(stage) => Some(*stage),
            RunState::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("Idle"),
            RunState::Running(stage) => write!(f, "{}", stage),
            RunState::Succeeded => f.write_str("Succeeded"),
            RunState::Failed { stage, cause } => write!(f, "Failed({}: {})", stage, cause),
        }
    }
}

/// Terminal result of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The image was built, pushed and accepted by the update authority
    Succeeded(ImageRef),

    /// The run stopped at `stage`
    ///
    /// `published` carries an image that reached the registry before the
    /// failure; it is left in place for manual deployment.
    Failed {
        stage: Stage,
        cause: PipelineError,
        published: Option<ImageRef>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded(_))
    }

    /// Stage the run failed in, if it failed
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            RunOutcome::Failed { stage, .. } => Some(*stage),
            RunOutcome::Succeeded(_) => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Succeeded(image) => write!(f, "Succeeded({})", image),
            RunOutcome::Failed {
                stage,
                cause,
                published,
            } => {
                write!(f, "Failed({}: {})", stage, cause)?;
                if let Some(image) = published {
                    write!(f, " [published {}]", image)?;
                }
                Ok(())
            }
        }
    }
}
