use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid dataset: {0}")]
    Dataset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single remote travel-time call.
///
/// These never escape the batch orchestrator: a failed call only removes the
/// affected chunk's communes from the result map.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("travel-time service returned HTTP {0}")]
    Status(u16),

    #[error("malformed travel-time response: {0}")]
    Malformed(String),

    #[error("request cancelled")]
    Cancelled,
}
