use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::types::{LatLng, TravelMode};

/// Body of a travel-matrix request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRequest {
    pub origins: Vec<LatLng>,
    pub destinations: Vec<LatLng>,
    /// RFC 3339 departure instant.
    pub departure_time: String,
    pub mode: TravelMode,
}

/// `durations[origin][destination]` in seconds; `None` when unreachable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixResponse {
    pub durations: Vec<Vec<Option<f64>>>,
}

/// Remote travel-time service.
///
/// Implementations should abort in-flight work when `cancel` fires and
/// report it as `TransportError::Cancelled`.
#[async_trait]
pub trait TravelTimeService: Send + Sync {
    async fn matrix(
        &self,
        request: &MatrixRequest,
        cancel: &CancellationToken,
    ) -> Result<MatrixResponse, TransportError>;
}
