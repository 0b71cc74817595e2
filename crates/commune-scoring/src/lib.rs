//! Multi-criteria ranking of candidate communes.
//!
//! Pure: the same inputs always produce the same ranked list. Travel targets
//! combine conjunctively, so a commune must be reachable within every
//! target's limit and is scored by its weakest leg.

use serde::Deserialize;
use std::cmp::Ordering;

use commune_core::dataset::SafetyIndex;
use commune_core::types::{
    Commune, LivingPreference, SearchCriteria, SearchResult, TravelTarget, TravelTimes, MAX_SAFETY_LEVEL,
};

/// Population at which the urban density score saturates.
pub const URBAN_REFERENCE_POPULATION: f64 = 200_000.0;
/// Population at which the rural density score reaches zero.
pub const RURAL_REFERENCE_POPULATION: f64 = 50_000.0;
/// Score used when a signal is unknown or irrelevant.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Weights read from the `[scoring]` config section; missing keys keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub travel: f64,
    pub safety: f64,
    pub density: f64,
    /// Used instead of `safety`/`density` when no travel target is set.
    pub untimed_safety: f64,
    pub untimed_density: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { travel: 0.5, safety: 0.3, density: 0.2, untimed_safety: 0.55, untimed_density: 0.45 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self { Self { weights } }

    pub fn weights(&self) -> &ScoringWeights { &self.weights }

    /// Rank `communes`.
    ///
    /// `travel_times_per_target[i]` belongs to `criteria.travel_time_targets[i]`.
    /// A target without a map admits no commune, so in travel mode the result
    /// is empty unless every target has one. Extra maps are ignored.
    pub fn score(
        &self,
        travel_times_per_target: &[TravelTimes],
        communes: &[Commune],
        safety: &SafetyIndex,
        criteria: &SearchCriteria,
        skip_travel_filter: bool,
    ) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = if skip_travel_filter {
            communes
                .iter()
                .map(|c| {
                    let level = safety.level(&c.insee_code);
                    let score = self.weights.untimed_safety * safety_score(level)
                        + self.weights.untimed_density * density_score(c.population, criteria.living_preference);
                    result(c, 0.0, level, score)
                })
                .collect()
        } else {
            let targets = &criteria.travel_time_targets;
            if targets.is_empty() || travel_times_per_target.len() < targets.len() {
                return Vec::new();
            }
            let legs: Vec<(&TravelTarget, &TravelTimes)> = targets.iter().zip(travel_times_per_target).collect();
            communes
                .iter()
                .filter_map(|c| {
                    let (travel_score, worst_seconds) = weakest_leg(&c.insee_code, &legs)?;
                    let level = safety.level(&c.insee_code);
                    let score = self.weights.travel * travel_score
                        + self.weights.safety * safety_score(level)
                        + self.weights.density * density_score(c.population, criteria.living_preference);
                    Some(result(c, worst_seconds, level, score))
                })
                .collect()
        };
        results.sort_by(rank_order);
        results
    }
}

/// Minimum leg score and maximum leg duration, or `None` if any leg fails.
fn weakest_leg(insee_code: &str, legs: &[(&TravelTarget, &TravelTimes)]) -> Option<(f64, f64)> {
    let mut min_score = f64::INFINITY;
    let mut max_seconds = 0.0f64;
    for (target, times) in legs {
        let seconds = *times.get(insee_code)?;
        let limit = target.max_seconds();
        if seconds > limit {
            return None;
        }
        min_score = min_score.min(travel_score(seconds, limit));
        max_seconds = max_seconds.max(seconds);
    }
    Some((min_score, max_seconds))
}

/// `1.0` for an instantaneous trip, `0.0` at the limit.
pub fn travel_score(seconds: f64, max_seconds: f64) -> f64 {
    if max_seconds <= 0.0 { return 1.0; }
    clamp01(1.0 - seconds / max_seconds)
}

pub fn safety_score(level_category: Option<u8>) -> f64 {
    match level_category {
        Some(level) => {
            let max = f64::from(MAX_SAFETY_LEVEL);
            clamp01((max - f64::from(level)) / max)
        }
        None => NEUTRAL_SCORE,
    }
}

pub fn density_score(population: Option<u64>, preference: LivingPreference) -> f64 {
    match (preference, population) {
        (LivingPreference::Urban, Some(pop)) => clamp01(pop as f64 / URBAN_REFERENCE_POPULATION),
        (LivingPreference::Rural, Some(pop)) => clamp01(1.0 - pop as f64 / RURAL_REFERENCE_POPULATION),
        _ => NEUTRAL_SCORE,
    }
}

/// Round to three decimals.
pub fn round_score(score: f64) -> f64 { (score * 1000.0).round() / 1000.0 }

fn clamp01(value: f64) -> f64 { value.clamp(0.0, 1.0) }

fn result(commune: &Commune, travel_seconds: f64, level: Option<u8>, score: f64) -> SearchResult {
    SearchResult {
        insee_code: commune.insee_code.clone(),
        commune_name: commune.name.clone(),
        travel_seconds,
        security_level: level,
        population: commune.population,
        score: round_score(score),
    }
}

/// Score descending, then INSEE code ascending.
fn rank_order(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.insee_code.cmp(&b.insee_code))
}
