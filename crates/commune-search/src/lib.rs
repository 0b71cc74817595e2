//! Search coordinator: drives filter → routing → scoring and publishes state.
//!
//! One search is active at a time. State lives in a `watch` channel and is
//! only mutated by the coordinator's own methods; presentation layers read
//! it through `subscribe()` or `state()`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use commune_core::dataset::{CommuneIndex, SafetyIndex};
use commune_core::types::{SearchCriteria, SearchProgress, SearchResult, TravelTimes};
use commune_geo::GeoFilter;
use commune_routing::BatchRoutingOrchestrator;
use commune_scoring::ScoringEngine;

pub const CANCELLED_MESSAGE: &str = "search cancelled";
pub const PARTIAL_COVERAGE_MESSAGE: &str = "travel times could not be retrieved for some communes";
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "travel-time service unavailable";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPhase {
    #[default]
    Idle,
    Form,
    Computing,
    Results,
}

/// User-facing problem report attached to the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchErrorInfo {
    pub message: String,
    pub has_partial_results: bool,
}

impl SearchErrorInfo {
    fn new(message: impl Into<String>, has_partial_results: bool) -> Self {
        Self { message: message.into(), has_partial_results }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub phase: SearchPhase,
    pub criteria: Option<SearchCriteria>,
    pub results: Vec<SearchResult>,
    pub progress: SearchProgress,
    pub error: Option<SearchErrorInfo>,
}

/// Conditions under which a search cannot start at all.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("no destination: set a destination or at least one travel target")]
    NoDestination,

    #[error("invalid search radius: {0} km")]
    InvalidRadius(f64),
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
}

/// Terminal state of one run, before it is published.
struct Completion {
    phase: SearchPhase,
    results: Vec<SearchResult>,
    error: Option<SearchErrorInfo>,
}

pub struct SearchCoordinator {
    communes: Arc<CommuneIndex>,
    safety: Arc<SafetyIndex>,
    geo: GeoFilter,
    orchestrator: BatchRoutingOrchestrator,
    scoring: ScoringEngine,
    state: watch::Sender<SearchState>,
    active: Mutex<Option<ActiveRun>>,
    next_run_id: AtomicU64,
}

impl SearchCoordinator {
    pub fn new(communes: Arc<CommuneIndex>, safety: Arc<SafetyIndex>, orchestrator: BatchRoutingOrchestrator) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            communes,
            safety,
            geo: GeoFilter::default(),
            orchestrator,
            scoring: ScoringEngine::default(),
            state,
            active: Mutex::new(None),
            next_run_id: AtomicU64::new(1),
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringEngine) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> { self.state.subscribe() }

    pub fn state(&self) -> SearchState { self.state.borrow().clone() }

    /// `idle → form`. From `results` this behaves like `reset`.
    pub fn open_form(&self) {
        let phase = self.state.borrow().phase;
        if matches!(phase, SearchPhase::Idle | SearchPhase::Results) {
            self.reset();
        }
    }

    /// Run a search to completion and return the terminal state.
    ///
    /// A search already computing is cancelled and its late updates are dropped.
    pub async fn start_search(&self, criteria: SearchCriteria) -> SearchState {
        let cancel = CancellationToken::new();
        let run_id = self.begin_run(&criteria, cancel.clone());

        let completion = match self.execute(run_id, &criteria, &cancel).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "search rejected");
                Completion { phase: SearchPhase::Form, results: Vec::new(), error: Some(SearchErrorInfo::new(e.to_string(), false)) }
            }
        };
        self.finish_run(run_id, completion);
        self.state()
    }

    /// Re-run the last submitted criteria.
    pub async fn retry(&self) -> SearchState {
        let criteria = self.state.borrow().criteria.clone();
        match criteria {
            Some(criteria) => self.start_search(criteria).await,
            None => self.state(),
        }
    }

    /// Signal the active run to stop. Returns whether a computing search was signalled.
    ///
    /// The run itself publishes the resulting `results`/`form` state once the
    /// orchestrator has stopped dispatching.
    pub fn cancel_search(&self) -> bool {
        if self.state.borrow().phase != SearchPhase::Computing {
            return false;
        }
        match self.active.lock().as_ref() {
            Some(run) => {
                info!(run = run.id, "cancelling search");
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop everything and return to an empty form.
    pub fn reset(&self) {
        let mut active = self.active.lock();
        if let Some(run) = active.take() {
            run.cancel.cancel();
        }
        self.state.send_replace(SearchState { phase: SearchPhase::Form, ..SearchState::default() });
    }

    fn begin_run(&self, criteria: &SearchCriteria, cancel: CancellationToken) -> u64 {
        let id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let mut active = self.active.lock();
        if let Some(previous) = active.replace(ActiveRun { id, cancel }) {
            debug!(run = previous.id, "superseded by a new search");
            previous.cancel.cancel();
        }
        self.state.send_modify(|s| {
            s.phase = SearchPhase::Computing;
            s.criteria = Some(criteria.clone());
            s.results.clear();
            s.progress = SearchProgress::default();
            s.error = None;
        });
        id
    }

    fn finish_run(&self, run_id: u64, completion: Completion) {
        let mut active = self.active.lock();
        if active.as_ref().map(|r| r.id) != Some(run_id) {
            debug!(run = run_id, "stale run finished, state left untouched");
            return;
        }
        *active = None;
        info!(
            run = run_id,
            phase = ?completion.phase,
            results = completion.results.len(),
            error = completion.error.as_ref().map(|e| e.message.as_str()),
            "search finished"
        );
        self.state.send_modify(|s| {
            s.phase = completion.phase;
            s.results = completion.results;
            s.error = completion.error;
        });
    }

    fn publish_progress(&self, run_id: u64, progress: &SearchProgress) {
        let active = self.active.lock();
        if active.as_ref().map(|r| r.id) == Some(run_id) {
            self.state.send_modify(|s| s.progress = *progress);
        }
    }

    async fn execute(
        &self,
        run_id: u64,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<Completion, CoordinatorError> {
        let anchor = criteria.anchor().ok_or(CoordinatorError::NoDestination)?;
        if !criteria.radius_km.is_finite() || criteria.radius_km <= 0.0 {
            return Err(CoordinatorError::InvalidRadius(criteria.radius_km));
        }

        let candidates = self.geo.filter(
            &self.communes,
            anchor.position(),
            criteria.radius_km,
            criteria.min_security_level,
            criteria.living_preference,
            &self.safety,
        );
        info!(
            run = run_id,
            candidates = candidates.len(),
            targets = criteria.travel_time_targets.len(),
            "search started"
        );

        if criteria.skips_travel_filter() {
            let results = self.scoring.score(&[], &candidates, &self.safety, criteria, true);
            return Ok(Completion { phase: SearchPhase::Results, results, error: None });
        }

        // One full pass per target; intersection needs every map complete.
        let mut per_target: Vec<TravelTimes> = Vec::with_capacity(criteria.travel_time_targets.len());
        let mut cancelled = false;
        let mut incomplete = false;
        let mut analyzed_any = false;
        let fresh = SearchProgress {
            total_batches: candidates.len().div_ceil(self.orchestrator.batch_size()),
            total_communes: candidates.len(),
            ..SearchProgress::default()
        };
        for (index, target) in criteria.travel_time_targets.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            self.publish_progress(run_id, &fresh);
            let run = self
                .orchestrator
                .run(&candidates, target.destination.position(), target.mode, cancel, |p| {
                    self.publish_progress(run_id, p)
                })
                .await;
            debug!(run = run_id, target = index, coverage = run.coverage(), "target resolved");
            incomplete |= run.progress.analyzed_communes < candidates.len();
            analyzed_any |= run.progress.analyzed_communes > 0;
            per_target.push(run.travel_times);
            if run.cancelled {
                cancelled = true;
                break;
            }
        }

        // Targets that never ran have no map; scoring then admits no commune.
        let collected = per_target.iter().any(|m| !m.is_empty());
        let results = if collected {
            self.scoring.score(&per_target, &candidates, &self.safety, criteria, false)
        } else {
            Vec::new()
        };

        let completion = if cancelled {
            if collected {
                Completion { phase: SearchPhase::Results, results, error: Some(SearchErrorInfo::new(CANCELLED_MESSAGE, true)) }
            } else {
                Completion { phase: SearchPhase::Form, results, error: None }
            }
        } else if !candidates.is_empty() && !analyzed_any {
            Completion { phase: SearchPhase::Results, results, error: Some(SearchErrorInfo::new(SERVICE_UNAVAILABLE_MESSAGE, false)) }
        } else if incomplete {
            let has_partial_results = !results.is_empty();
            Completion { phase: SearchPhase::Results, results, error: Some(SearchErrorInfo::new(PARTIAL_COVERAGE_MESSAGE, has_partial_results)) }
        } else {
            Completion { phase: SearchPhase::Results, results, error: None }
        };
        Ok(completion)
    }
}
