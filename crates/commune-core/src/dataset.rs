//! Read contract for the commune and safety datasets.
//!
//! Both datasets are produced by an external export pipeline as JSON and
//! loaded once per process. Nothing in the search pipeline mutates them.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Commune, InseeCode, SafetyMetric, MAX_SAFETY_LEVEL};

/// Communes keyed by INSEE code, iterated in ascending code order.
#[derive(Debug, Clone, Default)]
pub struct CommuneIndex {
    communes: BTreeMap<InseeCode, Commune>,
}

impl CommuneIndex {
    pub fn new() -> Self { Self::default() }

    /// Parse a JSON array of communes. Later duplicates replace earlier ones.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let communes: Vec<Commune> = serde_json::from_str(json)?;
        Ok(communes.into_iter().collect())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("commune dataset {}", path.display())));
        }
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn insert(&mut self, commune: Commune) {
        self.communes.insert(commune.insee_code.clone(), commune);
    }

    pub fn get(&self, insee_code: &str) -> Option<&Commune> { self.communes.get(insee_code) }

    pub fn iter(&self) -> impl Iterator<Item = &Commune> { self.communes.values() }

    pub fn len(&self) -> usize { self.communes.len() }

    pub fn is_empty(&self) -> bool { self.communes.is_empty() }
}

impl FromIterator<Commune> for CommuneIndex {
    fn from_iter<I: IntoIterator<Item = Commune>>(iter: I) -> Self {
        let mut index = Self::new();
        for commune in iter { index.insert(commune); }
        index
    }
}

/// Safety levels keyed by INSEE code for one reporting year.
///
/// A commune absent from the index has an unknown level.
#[derive(Debug, Clone, Default)]
pub struct SafetyIndex {
    year: Option<u16>,
    metrics: HashMap<InseeCode, SafetyMetric>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SafetyFile {
    Envelope { year: Option<u16>, metrics: HashMap<InseeCode, SafetyMetric> },
    Plain(HashMap<InseeCode, SafetyMetric>),
}

impl SafetyIndex {
    pub fn new() -> Self { Self::default() }

    /// Parse either `{code: {levelCategory}}` or `{year, metrics: {...}}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let (year, metrics) = match serde_json::from_str::<SafetyFile>(json)? {
            SafetyFile::Envelope { year, metrics } => (year, metrics),
            SafetyFile::Plain(metrics) => (None, metrics),
        };
        if let Some((code, metric)) = metrics.iter().find(|(_, m)| m.level_category > MAX_SAFETY_LEVEL) {
            return Err(Error::Dataset(format!(
                "commune {} has level category {} (expected 0..={})",
                code, metric.level_category, MAX_SAFETY_LEVEL
            )));
        }
        Ok(Self { year, metrics })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Like `from_json_file`, but a missing file yields an empty index.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_json_file(p),
            _ => Ok(Self::new()),
        }
    }

    pub fn insert(&mut self, insee_code: impl Into<InseeCode>, level_category: u8) {
        self.metrics.insert(insee_code.into(), SafetyMetric { level_category: level_category.min(MAX_SAFETY_LEVEL) });
    }

    pub fn level(&self, insee_code: &str) -> Option<u8> {
        self.metrics.get(insee_code).map(|m| m.level_category)
    }

    pub fn year(&self) -> Option<u16> { self.year }

    pub fn len(&self) -> usize { self.metrics.len() }

    pub fn is_empty(&self) -> bool { self.metrics.is_empty() }
}
