//! Geographic pre-filter: bounding box around a destination, then safety and
//! density cuts.
//!
//! Pure and O(n) over the commune dataset. Unknown data never rejects a
//! commune; invalid coordinates silently exclude it.

use tracing::debug;

use commune_core::dataset::{CommuneIndex, SafetyIndex};
use commune_core::types::{Commune, LatLng, LivingPreference};

/// Kilometres per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.0;
/// Urban preference keeps communes at or above this population.
pub const URBAN_MIN_POPULATION: u64 = 50_000;
/// Rural preference keeps communes at or below this population.
pub const RURAL_MAX_POPULATION: u64 = 10_000;

/// A WGS84 bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self { Self { west, south, east, north } }

    /// Box of half-size `radius_km` around `center`.
    ///
    /// The longitude span widens by `1 / cos(lat)`. When the cosine is zero
    /// (at a pole) the span degenerates to a full 360 degrees.
    pub fn around(center: LatLng, radius_km: f64) -> Self {
        let delta_lat = radius_km / KM_PER_DEGREE;
        let cos_lat = center.lat.to_radians().cos();
        let delta_lng = if cos_lat.abs() < f64::EPSILON {
            360.0
        } else {
            radius_km / (KM_PER_DEGREE * cos_lat.abs())
        };
        Self::new(center.lng - delta_lng, center.lat - delta_lat, center.lng + delta_lng, center.lat + delta_lat)
    }

    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south && point.lat <= self.north && point.lng >= self.west && point.lng <= self.east
    }
}

/// Candidate selection around a destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoFilter;

impl GeoFilter {
    pub fn new() -> Self { Self }

    pub fn filter(
        &self,
        communes: &CommuneIndex,
        destination: LatLng,
        radius_km: f64,
        min_security_level: Option<u8>,
        living_preference: LivingPreference,
        safety: &SafetyIndex,
    ) -> Vec<Commune> {
        let bbox = BoundingBox::around(destination, radius_km);
        let candidates: Vec<Commune> = communes
            .iter()
            .filter(|c| {
                let position = c.position();
                position.is_valid() && bbox.contains(position)
            })
            .filter(|c| self.passes_safety(c, min_security_level, safety))
            .filter(|c| self.passes_density(c, living_preference))
            .cloned()
            .collect();
        debug!(
            dataset = communes.len(),
            candidates = candidates.len(),
            radius_km,
            "geo filter applied"
        );
        candidates
    }

    fn passes_safety(&self, commune: &Commune, min_security_level: Option<u8>, safety: &SafetyIndex) -> bool {
        match (min_security_level, safety.level(&commune.insee_code)) {
            (Some(max_allowed), Some(level)) => level <= max_allowed,
            _ => true,
        }
    }

    fn passes_density(&self, commune: &Commune, preference: LivingPreference) -> bool {
        match (preference, commune.population) {
            (LivingPreference::Urban, Some(pop)) => pop >= URBAN_MIN_POPULATION,
            (LivingPreference::Rural, Some(pop)) => pop <= RURAL_MAX_POPULATION,
            _ => true,
        }
    }
}
