//! Update authority client
//!
//! Issues deploy instructions over a JSON request/response call. One
//! instruction per request, no streaming. The shared `reqwest::Client` pools
//! connections, so one `UpdateClient` can be cloned into every run.

use hookship_core::domain::deploy::DeployInstruction;
use hookship_core::dto::deploy::{DeployRequest, DeployResponse};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::{handle_response, normalize_base_url};

/// HTTP client for the remote update authority
#[derive(Debug, Clone)]
pub struct UpdateClient {
    /// Base URL of the update authority (e.g., "http://localhost:9090")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl UpdateClient {
    /// Create a new update client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new update client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client,
        }
    }

    /// Get the base URL of the update authority
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one deploy instruction
    ///
    /// The whole exchange is bounded by `timeout`. A refusal from the
    /// authority is returned as an acknowledgement with `accepted: false`,
    /// not as an error.
    ///
    /// # Errors
    /// * [`ClientError::NotSent`](crate::ClientError::NotSent) when no
    ///   connection could be made
    /// * [`ClientError::Timeout`](crate::ClientError::Timeout) when the
    ///   deadline passed after the request was sent
    pub async fn deploy(
        &self,
        instruction: &DeployInstruction,
        timeout: Duration,
    ) -> Result<DeployResponse> {
        let url = format!("{}/deploy", self.base_url);
        let request = DeployRequest::from(instruction);

        debug!(
            "Sending deploy instruction: service={} image={}",
            request.service_name, request.image_name
        );

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await?;

        handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientError;
    use axum::{Json, Router, routing::post};
    use hookship_core::domain::image::ImageRef;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn instruction() -> DeployInstruction {
        DeployInstruction::new("svc-a", ImageRef::new("acme", "svc-a", "7"))
    }

    #[tokio::test]
    async fn test_deploy_round_trip() {
        let app = Router::new().route(
            "/deploy",
            post(|Json(req): Json<DeployRequest>| async move {
                Json(DeployResponse {
                    accepted: req.service_name == "svc-a" && req.image_name == "acme/svc-a:7",
                    detail: format!("updating {}", req.service_name),
                })
            }),
        );
        let client = UpdateClient::new(serve(app).await);

        let ack = client
            .deploy(&instruction(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(ack.accepted);
        assert_eq!(ack.detail, "updating svc-a");
    }

    #[tokio::test]
    async fn test_rejection_is_an_acknowledgement() {
        let app = Router::new().route(
            "/deploy",
            post(|| async {
                Json(DeployResponse {
                    accepted: false,
                    detail: "no such service".to_string(),
                })
            }),
        );
        let client = UpdateClient::new(serve(app).await);

        let ack = client
            .deploy(&instruction(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!ack.accepted);
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_sent() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = UpdateClient::new(format!("http://{}", addr));
        let err = client
            .deploy(&instruction(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_not_sent(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_slow_authority_times_out() {
        let app = Router::new().route(
            "/deploy",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(DeployResponse {
                    accepted: true,
                    detail: String::new(),
                })
            }),
        );
        let client = UpdateClient::new(serve(app).await);

        let err = client
            .deploy(&instruction(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let app = Router::new().route(
            "/deploy",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "swarm unavailable") }),
        );
        let client = UpdateClient::new(serve(app).await);

        let err = client
            .deploy(&instruction(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_server_error());
    }
}
