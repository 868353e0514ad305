//! Webhook DTOs
//!
//! Only the fields of a push event the pipeline needs are decoded; everything
//! else in the payload is ignored.

use serde::{Deserialize, Serialize};

use crate::domain::repository::RepositoryRef;
use crate::error::PipelineError;

/// Push event delivered by the source host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub repository: PushRepository,
}

/// Repository section of a push event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRepository {
    pub name: String,
    pub html_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_url: Option<String>,
}

impl PushEvent {
    /// Builds a push event for a repository name and source URL
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            repository: PushRepository {
                name: name.into(),
                html_url: url.into(),
                clone_url: None,
            },
        }
    }

    /// Decodes the event into a validated repository reference
    ///
    /// The clone URL is preferred when present.
    pub fn repository_ref(&self) -> Result<RepositoryRef, PipelineError> {
        let url = self
            .repository
            .clone_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.repository.html_url);

        RepositoryRef::new(self.repository.name.clone(), url)
    }
}
