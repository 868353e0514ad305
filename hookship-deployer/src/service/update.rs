//! Update authority service
//!
//! Seam between the orchestrator and the deploy RPC client.

use async_trait::async_trait;
use hookship_client::{ClientError, UpdateClient};
use hookship_core::domain::deploy::DeployInstruction;
use hookship_core::dto::deploy::DeployResponse;
use std::time::Duration;

/// Service trait for handing deploy instructions to the update authority
///
/// Implementations must be safe to call concurrently from several runs.
#[async_trait]
pub trait UpdateService: Send + Sync {
    /// Sends one instruction and waits up to `timeout` for the acknowledgement
    async fn deploy(
        &self,
        instruction: &DeployInstruction,
        timeout: Duration,
    ) -> Result<DeployResponse, ClientError>;
}

#[async_trait]
impl UpdateService for UpdateClient {
    async fn deploy(
        &self,
        instruction: &DeployInstruction,
        timeout: Duration,
    ) -> Result<DeployResponse, ClientError> {
        UpdateClient::deploy(self, instruction, timeout).await
    }
}
