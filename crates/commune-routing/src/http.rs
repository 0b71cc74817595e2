//! JSON-over-HTTP travel-time service client.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use commune_core::config::RoutingSettings;
use commune_core::error::TransportError;
use commune_core::traits::{MatrixRequest, MatrixResponse, TravelTimeService};

/// Posts `MatrixRequest` bodies to a single endpoint.
pub struct HttpTravelTimeService {
    client: Client,
    endpoint: String,
}

impl HttpTravelTimeService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn from_settings(settings: &RoutingSettings) -> anyhow::Result<Self> {
        Self::new(settings.endpoint.clone(), Duration::from_secs(settings.timeout_secs))
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }

    async fn post(&self, request: &MatrixRequest) -> Result<MatrixResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let body = response.bytes().await.map_err(|e| TransportError::Network(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl TravelTimeService for HttpTravelTimeService {
    async fn matrix(
        &self,
        request: &MatrixRequest,
        cancel: &CancellationToken,
    ) -> Result<MatrixResponse, TransportError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            outcome = self.post(request) => outcome,
        }
    }
}
