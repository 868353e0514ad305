//! Run status DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a submitted trigger was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// No run was active; a new run started
    Started,
    /// A run is active; this trigger runs after it
    Queued,
    /// A trigger was already pending; this one was merged into it
    Coalesced,
}

/// Response to an accepted trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerAccepted {
    pub repository: String,
    pub admission: Admission,
}

/// Summary of an active run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRun {
    pub repository: String,
    pub run_id: Option<Uuid>,
    pub state: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub pending: bool,
}
