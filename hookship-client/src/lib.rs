//! Hookship HTTP Clients
//!
//! Type-safe HTTP clients for the two remote services the pipeline talks to:
//!
//! - [`UpdateClient`]: the update authority that switches a running service
//!   to a new image (deploy RPC)
//! - [`DeployerClient`]: the deployer's own API (trigger submission and run
//!   control), used by the CLI
//!
//! # Example
//!
//! ```no_run
//! use hookship_client::UpdateClient;
//! use hookship_core::domain::deploy::DeployInstruction;
//! use hookship_core::domain::image::ImageRef;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = UpdateClient::new("http://localhost:9090");
//!     let instruction = DeployInstruction::new("svc-a", ImageRef::new("acme", "svc-a", "7"));
//!
//!     let ack = client.deploy(&instruction, Duration::from_secs(30)).await?;
//!     println!("accepted: {}", ack.accepted);
//!     Ok(())
//! }
//! ```

mod deployer;
pub mod error;
mod update;

// Re-export commonly used types
pub use deployer::DeployerClient;
pub use error::{ClientError, Result};
pub use update::UpdateClient;

use serde::de::DeserializeOwned;

/// Normalizes a base URL by dropping trailing slashes
fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Handle an API response and deserialize JSON
///
/// This checks the status code and returns an appropriate error if the
/// request failed, or deserializes the response body if successful.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Handle an API response that returns no content
async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}
