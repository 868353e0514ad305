//! Deployer API client
//!
//! Talks to the deployer's webhook ingress and run control endpoints.

use hookship_core::dto::run::{ActiveRun, TriggerAccepted};
use hookship_core::dto::webhook::PushEvent;
use reqwest::Client;

use crate::error::Result;
use crate::{handle_empty_response, handle_response, normalize_base_url};

/// HTTP client for the Hookship deployer API
#[derive(Debug, Clone)]
pub struct DeployerClient {
    base_url: String,
    client: Client,
}

impl DeployerClient {
    /// Create a new deployer client
    ///
    /// # Example
    /// ```
    /// use hookship_client::DeployerClient;
    ///
    /// let client = DeployerClient::new("http://localhost:8080/");
    /// assert_eq!(client.base_url(), "http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Triggers
    // =============================================================================

    /// Submit a push event as if the source host had sent it
    pub async fn trigger(&self, event: &PushEvent) -> Result<TriggerAccepted> {
        let url = format!("{}/webhook", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-GitHub-Event", "push")
            .json(event)
            .send()
            .await?;

        handle_response(response).await
    }

    // =============================================================================
    // Runs
    // =============================================================================

    /// List active runs
    pub async fn list_runs(&self) -> Result<Vec<ActiveRun>> {
        let url = format!("{}/runs", self.base_url);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    /// Cancel the active run for a repository
    ///
    /// The run stops before its next stage starts.
    pub async fn cancel_run(&self, repository: &str) -> Result<()> {
        let url = format!("{}/runs/{}", self.base_url, repository);
        let response = self.client.delete(&url).send().await?;

        handle_empty_response(response).await
    }
}
