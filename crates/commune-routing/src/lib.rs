//! Travel-time resolution: the batch orchestrator and its HTTP transport.

pub mod http;
pub mod orchestrator;

pub use commune_core::types::TravelTimes;
pub use http::HttpTravelTimeService;
pub use orchestrator::{BatchRoutingOrchestrator, RoutingRun, BATCH_SIZE, MAX_CONCURRENT};
