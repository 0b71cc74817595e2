//! Concurrency-bounded batch resolution of travel times.
//!
//! Origins are split into fixed-size batches. Batches are dispatched in
//! windows of at most `max_concurrent`; a window must fully settle before the
//! next one starts. A failed batch only removes its own communes from the
//! result map, so callers observe missing data rather than errors.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use commune_core::config::RoutingSettings;
use commune_core::traits::{MatrixRequest, MatrixResponse, TravelTimeService};
use commune_core::types::{Commune, LatLng, SearchProgress, TravelMode, TravelTimes};

pub const BATCH_SIZE: usize = 10;
pub const MAX_CONCURRENT: usize = 3;

/// Outcome of one orchestration run.
#[derive(Debug, Clone, Default)]
pub struct RoutingRun {
    pub travel_times: TravelTimes,
    pub progress: SearchProgress,
    /// Cancellation was observed before the run finished.
    pub cancelled: bool,
}

impl RoutingRun {
    /// Share of requested communes that received a travel time.
    pub fn coverage(&self) -> f64 {
        if self.progress.total_communes == 0 { return 1.0; }
        self.travel_times.len() as f64 / self.progress.total_communes as f64
    }
}

pub struct BatchRoutingOrchestrator {
    service: Arc<dyn TravelTimeService>,
    batch_size: usize,
    max_concurrent: usize,
    departure: Option<DateTime<Utc>>,
}

impl BatchRoutingOrchestrator {
    pub fn new(service: Arc<dyn TravelTimeService>) -> Self {
        Self { service, batch_size: BATCH_SIZE, max_concurrent: MAX_CONCURRENT, departure: None }
    }

    pub fn from_settings(service: Arc<dyn TravelTimeService>, settings: &RoutingSettings) -> commune_core::error::Result<Self> {
        Ok(Self::new(service)
            .with_batch_size(settings.batch_size)
            .with_max_concurrency(settings.max_concurrent)
            .with_departure_time(settings.departure()?))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Fixed departure instant; `None` uses the clock at the start of each run.
    pub fn with_departure_time(mut self, departure: Option<DateTime<Utc>>) -> Self {
        self.departure = departure;
        self
    }

    pub fn batch_size(&self) -> usize { self.batch_size }

    pub fn max_concurrent(&self) -> usize { self.max_concurrent }

    /// Resolve travel times from every commune to `destination`.
    pub async fn execute<F>(
        &self,
        communes: &[Commune],
        destination: LatLng,
        mode: TravelMode,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> TravelTimes
    where
        F: FnMut(&SearchProgress),
    {
        self.run(communes, destination, mode, cancel, on_progress).await.travel_times
    }

    /// Same as `execute`, returning the final counters alongside the map.
    pub async fn run<F>(
        &self,
        communes: &[Commune],
        destination: LatLng,
        mode: TravelMode,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> RoutingRun
    where
        F: FnMut(&SearchProgress),
    {
        let batches: Vec<&[Commune]> = communes.chunks(self.batch_size).collect();
        let mut progress = SearchProgress {
            total_batches: batches.len(),
            total_communes: communes.len(),
            ..SearchProgress::default()
        };
        let departure_time = self.departure.unwrap_or_else(Utc::now).to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut travel_times = TravelTimes::with_capacity(communes.len());

        for (window_index, window) in batches.chunks(self.max_concurrent).enumerate() {
            if cancel.is_cancelled() {
                info!(
                    window = window_index,
                    completed = progress.completed_batches,
                    total = progress.total_batches,
                    "routing cancelled, no further windows dispatched"
                );
                break;
            }
            debug!(window = window_index, batches = window.len(), mode = mode.as_str(), "dispatching window");

            let mut in_flight: FuturesUnordered<_> = window
                .iter()
                .map(|batch| {
                    let request = MatrixRequest {
                        origins: batch.iter().map(Commune::position).collect(),
                        destinations: vec![destination],
                        departure_time: departure_time.clone(),
                        mode,
                    };
                    async move {
                        let outcome = self.service.matrix(&request, cancel).await;
                        (*batch, outcome)
                    }
                })
                .collect();

            while let Some((batch, outcome)) = in_flight.next().await {
                progress.completed_batches += 1;
                match outcome {
                    Ok(response) => {
                        progress.analyzed_communes += batch.len();
                        merge_durations(&mut travel_times, batch, &response);
                    }
                    Err(e) => {
                        warn!(batch_size = batch.len(), error = %e, "travel-time batch failed, communes excluded");
                    }
                }
                on_progress(&progress);
            }
        }

        RoutingRun { travel_times, progress, cancelled: cancel.is_cancelled() }
    }
}

/// Copy `durations[i][0]` for each origin; null, negative or non-finite values are skipped.
fn merge_durations(travel_times: &mut TravelTimes, batch: &[Commune], response: &MatrixResponse) {
    for (i, commune) in batch.iter().enumerate() {
        let seconds = response.durations.get(i).and_then(|row| row.first()).copied().flatten();
        if let Some(s) = seconds.filter(|s| s.is_finite() && *s >= 0.0) {
            travel_times.insert(commune.insee_code.clone(), s);
        }
    }
}
