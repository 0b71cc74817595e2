use commune_core::dataset::SafetyIndex;
use commune_core::types::{
    Commune, Destination, LivingPreference, SearchCriteria, TravelMode, TravelTarget, TravelTimes,
};
use commune_scoring::{density_score, round_score, safety_score, travel_score, ScoringEngine, ScoringWeights};

fn commune(code: &str, population: Option<u64>) -> Commune {
    Commune {
        insee_code: code.to_string(),
        name: format!("Commune {code}"),
        lat: 45.76,
        lon: 4.84,
        population,
        department_code: "69".to_string(),
        region_code: "84".to_string(),
    }
}

fn target(max_minutes: u32) -> TravelTarget {
    TravelTarget { destination: Destination::new(45.764, 4.8357, "Work"), max_minutes, mode: TravelMode::Car }
}

fn criteria(targets: Vec<TravelTarget>, living_preference: LivingPreference) -> SearchCriteria {
    SearchCriteria {
        destination: Some(Destination::new(45.764, 4.8357, "Work")),
        travel_time_targets: targets,
        min_security_level: None,
        living_preference,
        radius_km: 30.0,
    }
}

fn times(entries: &[(&str, f64)]) -> TravelTimes {
    entries.iter().map(|(code, secs)| (code.to_string(), *secs)).collect()
}

#[test]
fn component_scores() {
    assert_eq!(travel_score(0.0, 1200.0), 1.0);
    assert_eq!(travel_score(1200.0, 1200.0), 0.0);
    assert_eq!(travel_score(600.0, 1200.0), 0.5);

    assert_eq!(safety_score(Some(0)), 1.0);
    assert_eq!(safety_score(Some(4)), 0.0);
    assert_eq!(safety_score(Some(1)), 0.75);
    assert_eq!(safety_score(None), 0.5, "unknown is neutral");

    assert_eq!(density_score(Some(100_000), LivingPreference::Urban), 0.5);
    assert_eq!(density_score(Some(400_000), LivingPreference::Urban), 1.0, "clamped");
    assert_eq!(density_score(Some(5_000), LivingPreference::Rural), 0.9);
    assert_eq!(density_score(Some(80_000), LivingPreference::Rural), 0.0, "clamped");
    assert_eq!(density_score(None, LivingPreference::Urban), 0.5);
    assert_eq!(density_score(Some(10), LivingPreference::Any), 0.5);

    assert_eq!(round_score(0.333_333), 0.333);
    assert_eq!(round_score(0.666_666), 0.667);
}

#[test]
fn untimed_mode_uses_safety_and_density_only() {
    let communes = vec![commune("69001", Some(100_000)), commune("69002", None)];
    let mut safety = SafetyIndex::new();
    safety.insert("69001", 0);
    let results = ScoringEngine::default().score(
        &[],
        &communes,
        &safety,
        &criteria(vec![], LivingPreference::Urban),
        true,
    );

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].insee_code, "69001");
    assert_eq!(results[0].score, 0.775, "0.55 * 1.0 + 0.45 * 0.5");
    assert_eq!(results[0].travel_seconds, 0.0);
    assert_eq!(results[0].security_level, Some(0));
    assert_eq!(results[1].score, 0.5, "both signals neutral");
    assert_eq!(results[1].security_level, None);
}

#[test]
fn twelve_commune_scenario() {
    // Chunk one: 600 s, 1500 s, then 900 s for the rest; chunk two: 1100 s and unreachable.
    let communes: Vec<Commune> = (0..12).map(|i| commune(&format!("69{:03}", i), None)).collect();
    let mut entries: Vec<(String, f64)> = vec![("69000".into(), 600.0), ("69001".into(), 1500.0)];
    entries.extend((2..10).map(|i| (format!("69{:03}", i), 900.0)));
    entries.push(("69010".into(), 1100.0));
    let map: TravelTimes = entries.into_iter().collect();

    let results = ScoringEngine::default().score(
        &[map],
        &communes,
        &SafetyIndex::new(),
        &criteria(vec![target(20)], LivingPreference::Any),
        false,
    );

    let codes: Vec<&str> = results.iter().map(|r| r.insee_code.as_str()).collect();
    assert_eq!(results.len(), 10);
    assert!(!codes.contains(&"69001"), "25 minutes exceeds the 20 minute cap");
    assert!(!codes.contains(&"69011"), "null duration is unreachable");
    assert_eq!(results[0].insee_code, "69000");
    assert_eq!(results[0].score, 0.5, "0.5 * 0.5 + 0.3 * 0.5 + 0.2 * 0.5");
    assert_eq!(results[0].travel_seconds, 600.0);
    let last = results.last().expect("results");
    assert_eq!(last.insee_code, "69010");
    assert_eq!(last.score, round_score(0.5 * (1.0 - 1100.0 / 1200.0) + 0.25));
}

#[test]
fn targets_combine_conjunctively() {
    let communes = vec![commune("A", None), commune("B", None), commune("C", None), commune("D", None)];
    let first = times(&[("A", 600.0), ("B", 300.0), ("C", 1300.0), ("D", 100.0)]);
    let second = times(&[("A", 1500.0), ("B", 2000.0), ("C", 100.0)]);
    let targets = vec![target(20), target(30)];

    let results = ScoringEngine::default().score(
        &[first, second],
        &communes,
        &SafetyIndex::new(),
        &criteria(targets, LivingPreference::Any),
        false,
    );

    assert_eq!(results.len(), 1, "B breaks target two, C breaks target one, D missing from target two");
    let a = &results[0];
    assert_eq!(a.insee_code, "A");
    assert_eq!(a.travel_seconds, 1500.0, "worst leg is reported");
    // Legs score 0.5 and 1 - 1500/1800; the weaker one counts.
    let weakest = 1.0 - 1500.0 / 1800.0;
    assert_eq!(a.score, round_score(0.5 * weakest + 0.25));
}

#[test]
fn travel_mode_without_maps_ranks_nothing() {
    let communes = vec![commune("A", None)];
    let results = ScoringEngine::default().score(
        &[],
        &communes,
        &SafetyIndex::new(),
        &criteria(vec![target(20)], LivingPreference::Any),
        false,
    );
    assert!(results.is_empty());
}

#[test]
fn target_without_a_map_admits_no_commune() {
    // The second target never produced travel times (the search stopped during the first).
    let communes = vec![commune("A", None), commune("B", None)];
    let first = times(&[("A", 600.0), ("B", 300.0)]);
    let results = ScoringEngine::default().score(
        &[first],
        &communes,
        &SafetyIndex::new(),
        &criteria(vec![target(20), target(20)], LivingPreference::Any),
        false,
    );
    assert!(results.is_empty(), "every target must be satisfied");
}

#[test]
fn weights_fall_back_to_defaults_per_key() {
    let weights: ScoringWeights = serde_json::from_str(r#"{"travel": 0.7, "safety": 0.2, "density": 0.1}"#)
        .expect("weights");
    assert_eq!(weights.travel, 0.7);
    assert_eq!(weights.untimed_safety, ScoringWeights::default().untimed_safety);

    let engine = ScoringEngine::new(weights);
    assert_eq!(engine.weights(), &weights);
    let communes = vec![commune("A", None)];
    let results = engine.score(
        &[times(&[("A", 600.0)])],
        &communes,
        &SafetyIndex::new(),
        &criteria(vec![target(20)], LivingPreference::Any),
        false,
    );
    assert_eq!(results[0].score, round_score(0.7 * 0.5 + 0.2 * 0.5 + 0.1 * 0.5));
}

#[test]
fn equal_scores_break_ties_by_code() {
    let communes = vec![commune("69300", None), commune("01100", None), commune("38200", None)];
    let map = times(&[("69300", 600.0), ("01100", 600.0), ("38200", 600.0)]);
    let results = ScoringEngine::default().score(
        &[map],
        &communes,
        &SafetyIndex::new(),
        &criteria(vec![target(20)], LivingPreference::Any),
        false,
    );
    let codes: Vec<&str> = results.iter().map(|r| r.insee_code.as_str()).collect();
    assert_eq!(codes, vec!["01100", "38200", "69300"]);
}

#[test]
fn scoring_is_deterministic() {
    let communes: Vec<Commune> = (0..50).map(|i| commune(&format!("{:05}", i), Some(i * 3_000))).collect();
    let map: TravelTimes = communes.iter().enumerate().map(|(i, c)| (c.insee_code.clone(), (i * 37 % 1800) as f64)).collect();
    let mut safety = SafetyIndex::new();
    for (i, c) in communes.iter().enumerate() { safety.insert(c.insee_code.clone(), (i % 5) as u8); }
    let crit = criteria(vec![target(30)], LivingPreference::Rural);
    let engine = ScoringEngine::default();

    let first = engine.score(&[map.clone()], &communes, &safety, &crit, false);
    let second = engine.score(&[map], &communes, &safety, &crit, false);
    assert_eq!(first, second);
    for pair in first.windows(2) { assert!(pair[0].score >= pair[1].score); }
}
