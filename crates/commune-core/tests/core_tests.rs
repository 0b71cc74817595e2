use std::fs;
use std::path::Path;
use tempfile::TempDir;

use commune_core::config::{resolve_with_base, Config};
use commune_core::dataset::{CommuneIndex, SafetyIndex};
use commune_core::types::{LivingPreference, SearchCriteria, TravelMode};
use figment::providers::{Format, Toml};
use figment::Figment;

const COMMUNES_JSON: &str = r#"[
  {"inseeCode": "69123", "name": "Lyon", "lat": 45.758, "lon": 4.835, "population": 522250, "departmentCode": "69", "regionCode": "84"},
  {"inseeCode": "01004", "name": "Ambérieu-en-Bugey", "lat": 45.959, "lon": 5.372, "population": null, "departmentCode": "01", "regionCode": "84"},
  {"inseeCode": "38185", "name": "Grenoble", "lat": 45.188, "lon": 5.724, "population": 156389, "departmentCode": "38", "regionCode": "84"}
]"#;

#[test]
fn commune_index_iterates_in_code_order() {
    let index = CommuneIndex::from_json_str(COMMUNES_JSON).expect("parse communes");
    assert_eq!(index.len(), 3);
    let codes: Vec<&str> = index.iter().map(|c| c.insee_code.as_str()).collect();
    assert_eq!(codes, vec!["01004", "38185", "69123"]);
    assert_eq!(index.get("01004").and_then(|c| c.population), None, "null population stays unknown");
    assert_eq!(index.get("69123").map(|c| c.name.as_str()), Some("Lyon"));
}

#[test]
fn commune_index_missing_file_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = CommuneIndex::from_json_file(&tmp.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().starts_with("Not found"), "got {err}");
}

#[test]
fn safety_index_accepts_plain_and_envelope_shapes() {
    let plain = SafetyIndex::from_json_str(r#"{"69123": {"levelCategory": 3}}"#).expect("plain");
    assert_eq!(plain.level("69123"), Some(3));
    assert_eq!(plain.level("38185"), None);
    assert_eq!(plain.year(), None);

    let envelope = SafetyIndex::from_json_str(r#"{"year": 2023, "metrics": {"38185": {"levelCategory": 1}}}"#)
        .expect("envelope");
    assert_eq!(envelope.year(), Some(2023));
    assert_eq!(envelope.level("38185"), Some(1));
}

#[test]
fn safety_index_rejects_out_of_range_levels() {
    let err = SafetyIndex::from_json_str(r#"{"69123": {"levelCategory": 7}}"#).unwrap_err();
    assert!(err.to_string().contains("level category 7"), "got {err}");
}

#[test]
fn safety_index_optional_file_may_be_absent() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("insecurity.json");
    let index = SafetyIndex::load_optional(Some(&missing)).expect("missing file is fine");
    assert!(index.is_empty());

    fs::write(&missing, r#"{"01004": {"levelCategory": 0}}"#).unwrap();
    let index = SafetyIndex::load_optional(Some(&missing)).expect("load");
    assert_eq!(index.level("01004"), Some(0));
}

#[test]
fn criteria_parse_with_defaults() {
    let criteria: SearchCriteria = serde_json::from_str(
        r#"{"radiusKm": 30, "travelTimeTargets": [{"destination": {"lat": 45.76, "lng": 4.84, "label": "Work"}, "maxMinutes": 20}]}"#,
    )
    .expect("criteria");
    assert_eq!(criteria.living_preference, LivingPreference::Any);
    assert_eq!(criteria.travel_time_targets[0].mode, TravelMode::Car);
    assert_eq!(criteria.travel_time_targets[0].max_seconds(), 1200.0);
    assert!(!criteria.skips_travel_filter());
    assert_eq!(criteria.anchor().map(|d| d.label.as_str()), Some("Work"), "first target anchors the filter");
}

#[test]
fn routing_settings_defaults_and_validation() {
    let figment = Figment::from(Toml::string(
        r#"
        [routing]
        endpoint = "http://localhost:8080/matrix"
        departure_time = "2024-03-04T08:30:00Z"

        [data]
        communes_path = "data/communes.json"
        "#,
    ));
    let config = Config::from_figment(figment, Path::new("/srv/app"));
    let routing = config.routing().expect("routing");
    assert_eq!(routing.batch_size, 10);
    assert_eq!(routing.max_concurrent, 3);
    assert_eq!(routing.timeout_secs, 30);
    assert!(routing.departure().expect("departure").is_some());

    let data = config.data().expect("data");
    assert_eq!(data.communes_path(config.base_dir()), Path::new("/srv/app/data/communes.json"));
    assert!(data.safety_path(config.base_dir()).is_none());
    assert!(config.search().max_results.is_none(), "search section is optional");
}

#[test]
fn routing_settings_reject_zero_batch_and_bad_departure() {
    let zero = Figment::from(Toml::string("[routing]\nendpoint = \"http://x\"\nbatch_size = 0\n"));
    assert!(Config::from_figment(zero, Path::new(".")).routing().is_err());

    let bad = Figment::from(Toml::string("[routing]\nendpoint = \"http://x\"\ndeparture_time = \"tomorrow\"\n"));
    assert!(Config::from_figment(bad, Path::new(".")).routing().is_err());
}

#[test]
fn absolute_paths_are_not_rebased() {
    assert_eq!(resolve_with_base(Path::new("/base"), "/abs/file.json"), Path::new("/abs/file.json"));
    assert_eq!(resolve_with_base(Path::new("/base"), "rel.json"), Path::new("/base/rel.json"));
}
