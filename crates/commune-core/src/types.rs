//! Domain types shared by the filtering, routing, scoring and coordination crates.
//!
//! Field names serialize in camelCase so datasets, criteria files and the
//! travel-time wire format can be read and written without adapters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// INSEE code: the unique key of a commune.
pub type InseeCode = String;

/// Travel time in seconds per commune, for one travel target.
pub type TravelTimes = HashMap<InseeCode, f64>;

/// A WGS84 point. `lng` is the longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self { Self { lat, lng } }

    /// Finite and inside the WGS84 coordinate ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A French commune as supplied by the commune dataset.
///
/// Read-only for the duration of a search. `population` is `None` when the
/// census figure is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commune {
    pub insee_code: InseeCode,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub population: Option<u64>,
    #[serde(default)]
    pub department_code: String,
    #[serde(default)]
    pub region_code: String,
}

impl Commune {
    pub fn position(&self) -> LatLng { LatLng::new(self.lat, self.lon) }
}

/// Safety level of a commune, `0` (safest) to `4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyMetric {
    pub level_category: u8,
}

/// Highest valid `SafetyMetric::level_category`.
pub const MAX_SAFETY_LEVEL: u8 = 4;

/// A place the user travels to, as picked in the search form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub label: String,
}

impl Destination {
    pub fn new(lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self { lat, lng, label: label.into() }
    }

    pub fn position(&self) -> LatLng { LatLng::new(self.lat, self.lng) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Car,
    Transit,
    Walk,
    Bike,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Car => "car",
            TravelMode::Transit => "transit",
            TravelMode::Walk => "walk",
            TravelMode::Bike => "bike",
        }
    }
}

/// One travel constraint. All targets of a search must hold at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelTarget {
    pub destination: Destination,
    pub max_minutes: u32,
    #[serde(default)]
    pub mode: TravelMode,
}

impl TravelTarget {
    pub fn max_seconds(&self) -> f64 { f64::from(self.max_minutes) * 60.0 }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivingPreference {
    Urban,
    Rural,
    #[default]
    Any,
}

/// What the user asked for.
///
/// `destination` is the legacy single-destination field; when it is absent
/// the first travel target anchors the geographic pre-filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(default)]
    pub destination: Option<Destination>,
    #[serde(default)]
    pub travel_time_targets: Vec<TravelTarget>,
    #[serde(default)]
    pub min_security_level: Option<u8>,
    #[serde(default)]
    pub living_preference: LivingPreference,
    pub radius_km: f64,
}

impl SearchCriteria {
    /// Centre of the geographic pre-filter.
    pub fn anchor(&self) -> Option<&Destination> {
        self.destination
            .as_ref()
            .or_else(|| self.travel_time_targets.first().map(|t| &t.destination))
    }

    /// No travel targets means ranking by safety and density only.
    pub fn skips_travel_filter(&self) -> bool { self.travel_time_targets.is_empty() }
}

/// Live counters of one orchestration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchProgress {
    pub total_batches: usize,
    pub completed_batches: usize,
    pub total_communes: usize,
    pub analyzed_communes: usize,
}

impl SearchProgress {
    /// Completion in `[0, 1]`, independent of how many batches failed.
    pub fn fraction(&self) -> f64 {
        if self.total_batches == 0 { return 0.0; }
        self.completed_batches as f64 / self.total_batches as f64
    }
}

/// One ranked commune. `score` is rounded to three decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub insee_code: InseeCode,
    pub commune_name: String,
    pub travel_seconds: f64,
    pub security_level: Option<u8>,
    pub population: Option<u64>,
    pub score: f64,
}
