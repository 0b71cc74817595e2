use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use commune_core::config::Config;
use commune_core::dataset::{CommuneIndex, SafetyIndex};
use commune_core::types::SearchCriteria;
use commune_routing::{BatchRoutingOrchestrator, HttpTravelTimeService};
use commune_scoring::{ScoringEngine, ScoringWeights};
use commune_search::{SearchCoordinator, SearchPhase, SearchState};

fn parse_args() -> PathBuf {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    match args.first() {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Usage: {} <criteria.json>", prog);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn render_progress(pb: &ProgressBar, state: &SearchState) {
    let p = state.progress;
    pb.set_length(p.total_batches as u64);
    pb.set_position(p.completed_batches as u64);
    pb.set_message(format!("{}/{} communes analysed", p.analyzed_communes, p.total_communes));
}

fn print_results(state: &SearchState, max_results: Option<usize>) {
    let shown = max_results.unwrap_or(state.results.len()).min(state.results.len());
    println!(
        "{:>4}  {:<6} {:<32} {:>7} {:>6} {:>10} {:>6}",
        "rank", "insee", "commune", "minutes", "safety", "population", "score"
    );
    for (rank, r) in state.results.iter().take(shown).enumerate() {
        let safety = r.security_level.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string());
        let population = r.population.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<6} {:<32} {:>7.0} {:>6} {:>10} {:>6.3}",
            rank + 1,
            r.insee_code,
            r.commune_name,
            r.travel_seconds / 60.0,
            safety,
            population,
            r.score
        );
    }
    if shown < state.results.len() {
        println!("… {} more", state.results.len() - shown);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let criteria_path = parse_args();
    let criteria: SearchCriteria = serde_json::from_str(&std::fs::read_to_string(&criteria_path)?)?;

    let data = config.data()?;
    let communes = CommuneIndex::from_json_file(&data.communes_path(config.base_dir()))?;
    let safety = SafetyIndex::load_optional(data.safety_path(config.base_dir()).as_deref())?;
    info!(communes = communes.len(), safety = safety.len(), year = ?safety.year(), "datasets loaded");

    let routing = config.routing()?;
    let service = Arc::new(HttpTravelTimeService::from_settings(&routing)?);
    info!(endpoint = service.endpoint(), "travel-time service configured");
    let orchestrator = BatchRoutingOrchestrator::from_settings(service, &routing)?;
    let scoring = ScoringEngine::new(config.get::<ScoringWeights>("scoring").unwrap_or_default());
    info!(weights = ?scoring.weights(), "scoring configured");
    let coordinator =
        SearchCoordinator::new(Arc::new(communes), Arc::new(safety), orchestrator).with_scoring(scoring);
    coordinator.open_form();

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}")?
            .progress_chars("#>-"),
    );
    let mut rx = coordinator.subscribe();
    let search = coordinator.start_search(criteria);
    tokio::pin!(search);
    let mut cancel_requested = false;
    let state = loop {
        tokio::select! {
            state = &mut search => break state,
            changed = rx.changed() => {
                if changed.is_ok() { render_progress(&pb, &rx.borrow()); }
            }
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                cancel_requested = true;
                pb.set_message("cancelling…");
                coordinator.cancel_search();
            }
        }
    };
    pb.finish_and_clear();

    if let Some(error) = &state.error {
        let suffix = if error.has_partial_results { " (partial results)" } else { "" };
        eprintln!("⚠️  {}{}", error.message, suffix);
    }
    if state.phase == SearchPhase::Results {
        print_results(&state, config.search().max_results);
        println!("✅ {} communes ranked", state.results.len());
    }
    Ok(())
}
