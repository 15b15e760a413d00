#![forbid(unsafe_code)]

//! End-to-end orchestrator flows against in-process services.
//!
//! Tasks are deferred so each test decides the order responses arrive in.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use transitflow::{AppConfig, Msg, Services, TripModel};
use transitflow_client::{
    DirectionsProvider, PlacesError, PlacesProvider, PredictionService, RoutingError,
    ServiceError,
};
use transitflow_core::{
    ArrivalEstimate, CyclePhase, HISTORY_CAPACITY, HISTORY_KEY, LatLng, LocationPair,
    PredictionResult, RouteAlternative, RouteLeg, TransitAgency, Trend, TrendPoint,
    TripParameters,
};
use transitflow_runtime::{CmdRecord, Event, ProgramSimulator, StateRegistry};

// ─────────────────────────────────────────────────────────────────────────────
// Fakes
// ─────────────────────────────────────────────────────────────────────────────

/// Delay model whose point delay is `hour + 0.6`.
#[derive(Default)]
struct FakeModel {
    failure: Mutex<Option<String>>,
    catalog_down: bool,
}

impl FakeModel {
    fn fail_with(&self, detail: &str) {
        *self.failure.lock().unwrap() = Some(detail.to_string());
    }
}

impl PredictionService for FakeModel {
    fn routes(&self) -> Result<Vec<String>, ServiceError> {
        if self.catalog_down {
            return Err(ServiceError::Rejected {
                endpoint: "routes",
                status: 503,
                detail: None,
            });
        }
        Ok(vec!["10H".into(), "218C".into()])
    }

    fn predict(&self, params: &TripParameters) -> Result<PredictionResult, ServiceError> {
        if let Some(detail) = self.failure.lock().unwrap().clone() {
            return Err(ServiceError::Rejected {
                endpoint: "predict-trip",
                status: 500,
                detail: Some(detail),
            });
        }
        Ok(PredictionResult::new(
            f64::from(params.hour) + 0.6,
            55.0,
            None,
            None,
        ))
    }

    fn predict_trend(&self, _: &TripParameters) -> Result<Trend, ServiceError> {
        let points = (0..24)
            .map(|hour| TrendPoint {
                hour,
                delay: f64::from(hour) / 2.0,
            })
            .collect();
        Ok(Trend::try_from_points(points).unwrap())
    }
}

/// Two alternatives named after the origin.
struct FakeDirections;

impl DirectionsProvider for FakeDirections {
    fn directions(&self, pair: &LocationPair) -> Result<Vec<RouteAlternative>, RoutingError> {
        let route = |summary: String, base: u64, traffic: u64| RouteAlternative {
            summary,
            legs: vec![RouteLeg {
                duration_seconds: base,
                duration_in_traffic_seconds: Some(traffic),
            }],
        };
        Ok(vec![
            route(format!("{} main", pair.origin), 1400, 1800),
            route(format!("{} bypass", pair.origin), 1600, 1650),
        ])
    }
}

struct FakePlaces;

impl PlacesProvider for FakePlaces {
    fn text_search(&self, query: &str) -> Result<Vec<TransitAgency>, PlacesError> {
        Ok(vec![TransitAgency {
            name: query.to_string(),
            address: None,
            rating: Some(4.0),
            location: LatLng::default(),
        }])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

fn config() -> AppConfig {
    AppConfig {
        debounce: Duration::from_millis(50),
        ..AppConfig::default()
    }
}

fn services(model: &Arc<FakeModel>) -> Services {
    Services {
        prediction: model.clone(),
        directions: Arc::new(FakeDirections),
        places: Arc::new(FakePlaces),
    }
}

fn simulator(model: &Arc<FakeModel>) -> ProgramSimulator<TripModel> {
    let mut sim = ProgramSimulator::new(TripModel::new(config(), services(model), None)).defer_tasks();
    sim.init();
    sim.discard_tasks();
    sim
}

fn persistent_simulator(
    model: &Arc<FakeModel>,
    registry: &Arc<StateRegistry>,
) -> ProgramSimulator<TripModel> {
    let trip = TripModel::new(config(), services(model), Some(registry.clone()));
    let mut sim = ProgramSimulator::with_registry(trip, registry.clone()).defer_tasks();
    sim.init();
    sim.discard_tasks();
    sim
}

fn settle(sim: &mut ProgramSimulator<TripModel>) {
    sim.send(Msg::Tick(Instant::now() + Duration::from_secs(1)));
}

fn lines(sim: &mut ProgramSimulator<TripModel>, input: &[&str]) {
    for line in input {
        sim.inject_line(*line);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prediction cycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn superseded_point_response_changes_nothing() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Secunderabad", "to Gachibowli", "calc", "hour 9", "calc"]);
    assert_eq!(
        sim.pending_tasks(),
        vec!["directions", "places", "predict", "trend", "predict", "trend"]
    );

    assert!(sim.run_task_named("predict"));
    assert!(sim.run_task_named("trend"));
    let cycle = sim.model().cycle();
    assert!(cycle.result().is_none());
    assert!(cycle.trend().is_none());
    assert_eq!(cycle.phase(), CyclePhase::Pending);
    assert_eq!(cycle.stale_discards(), 2);
    assert!(sim.model().history().is_empty());

    sim.run_all_tasks();
    let cycle = sim.model().cycle();
    assert_eq!(cycle.phase(), CyclePhase::Settled);
    assert_eq!(cycle.result().unwrap().predicted_extra_delay, 9.6);
    assert!(cycle.trend().is_some());
    assert_eq!(sim.model().history().len(), 1);
    assert_eq!(sim.model().history().get(0).unwrap().params.hour, 9);
}

#[test]
fn late_trend_does_not_block_point_result() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameerpet", "to Kukatpally"]);
    settle(&mut sim);
    assert!(sim.run_task_named("predict"));
    assert!(sim.model().cycle().result().is_some());
    assert!(sim.model().cycle().trend().is_none());

    assert!(sim.run_task_named("trend"));
    assert_eq!(sim.model().cycle().trend().unwrap().points().len(), 24);
}

#[test]
fn automatic_failure_is_silent_manual_failure_is_shown() {
    let model = Arc::new(FakeModel::default());
    model.fail_with("Model not trained");
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Secunderabad", "to Gachibowli"]);
    settle(&mut sim);
    sim.run_all_tasks();
    assert_eq!(sim.model().cycle().phase(), CyclePhase::Failed);
    assert_eq!(sim.model().cycle().visible_error(), None);
    assert!(!sim.capture_frame(80).contains("Error:"));

    sim.inject_line("calc");
    sim.run_all_tasks();
    assert_eq!(
        sim.model().cycle().visible_error(),
        Some("Model not trained")
    );
    assert!(sim.capture_frame(80).contains("Error: Model not trained"));
    assert!(sim.model().history().is_empty());
}

#[test]
fn self_trip_never_triggers() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameerpet", "to  Ameerpet "]);
    settle(&mut sim);
    assert!(sim.pending_tasks().is_empty());

    sim.inject_line("calc");
    assert!(sim.pending_tasks().is_empty());
    assert_eq!(sim.model().cycle().generation().get(), 0);
    assert_eq!(sim.model().cycle().phase(), CyclePhase::Idle);
}

#[test]
fn cleared_origin_suppresses_prediction() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameerpet", "to Kukatpally"]);
    settle(&mut sim);
    sim.run_all_tasks();
    assert_eq!(sim.model().cycle().generation().get(), 1);

    sim.inject_line("from -");
    assert_eq!(sim.model().params().origin, "");
    settle(&mut sim);
    assert!(sim.pending_tasks().is_empty());

    sim.inject_line("calc");
    assert!(sim.pending_tasks().is_empty());
    assert_eq!(sim.model().cycle().generation().get(), 1);
    assert_eq!(
        sim.model().cycle().result().unwrap().predicted_extra_delay,
        8.6
    );
}

#[test]
fn rapid_edits_settle_once_with_last_values() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameer", "from Ameerpet", "to Kuk", "to Kukatpally"]);
    sim.send(Msg::Tick(Instant::now()));
    assert!(sim.pending_tasks().is_empty());

    settle(&mut sim);
    settle(&mut sim);
    assert_eq!(
        sim.pending_tasks(),
        vec!["directions", "places", "predict", "trend"]
    );
    sim.run_all_tasks();
    let entry = sim.model().history().get(0).unwrap();
    assert_eq!(entry.params.origin, "Ameerpet");
    assert_eq!(entry.params.destination, "Kukatpally");
}

#[test]
fn scenario_edit_alone_does_not_trigger() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameerpet", "to Kukatpally"]);
    settle(&mut sim);
    sim.run_all_tasks();

    lines(&mut sim, &["weather rainy", "event festival"]);
    settle(&mut sim);
    assert!(sim.pending_tasks().is_empty());
    assert!(sim.subscription_ids().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Routes, arrival, agencies, catalog
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn arrival_combines_route_and_prediction() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["hour 4", "from Secunderabad", "to Gachibowli", "calc"]);
    sim.run_all_tasks();

    // 1800 s in traffic + 4.6 min predicted
    assert_eq!(sim.model().arrival(), ArrivalEstimate::Routed { minutes: 35 });
    let traffic = sim.model().traffic().unwrap();
    assert!(traffic.has_traffic);
    assert_eq!(traffic.delay_minutes, 7);

    let frame = sim.capture_frame(80);
    assert!(frame.contains("Arrival: 35 min"));
    assert!(frame.contains("> [1] Secunderabad main  30 min"));
    assert!(frame.contains("Traffic: +7 min"));

    sim.inject_line("alt 2");
    assert_eq!(sim.model().routes().selected_index(), 1);
    // 1650 s + 4.6 min
    assert_eq!(sim.model().arrival(), ArrivalEstimate::Routed { minutes: 32 });
    assert!(!sim.model().traffic().unwrap().has_traffic);

    sim.inject_line("alt 3");
    assert_eq!(sim.model().routes().selected_index(), 1);
}

#[test]
fn new_directions_reset_selection_and_stale_ones_are_ignored() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameerpet", "to Kukatpally"]);
    settle(&mut sim);
    sim.run_all_tasks();
    sim.inject_line("alt 2");
    assert_eq!(sim.model().routes().selected_index(), 1);

    sim.inject_line("from Begumpet");
    settle(&mut sim);
    assert!(sim.model().routes().is_empty());
    sim.inject_line("from Miyapur");
    settle(&mut sim);

    // Miyapur's answer lands first, then Begumpet's late one.
    let pending = sim.pending_tasks();
    let first = pending.iter().position(|t| *t == "directions").unwrap();
    let last = pending.iter().rposition(|t| *t == "directions").unwrap();
    assert_ne!(first, last);
    assert!(sim.run_task(last));
    assert!(sim.run_task(first));

    let routes = sim.model().routes();
    assert_eq!(routes.selected_index(), 0);
    assert_eq!(routes.selected().unwrap().summary, "Miyapur main");
}

#[test]
fn agencies_follow_latest_origin() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameerpet", "to Kukatpally"]);
    settle(&mut sim);
    lines(&mut sim, &["from Begumpet"]);
    settle(&mut sim);
    sim.run_all_tasks();

    let names: Vec<&str> = sim
        .model()
        .agencies()
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["RTC bus station in Begumpet", "bus travels in Begumpet"]
    );
}

#[test]
fn catalog_preselects_route_unless_chosen() {
    let model = Arc::new(FakeModel::default());
    let trip = TripModel::new(config(), services(&model), None);
    let mut sim = ProgramSimulator::new(trip).defer_tasks();
    sim.init();
    sim.inject_line("route 47L");
    assert!(sim.run_task_named("routes"));
    assert_eq!(sim.model().catalog(), ["10H", "218C"]);
    assert_eq!(sim.model().params().route_id.as_deref(), Some("47L"));

    let mut sim = ProgramSimulator::new(TripModel::new(config(), services(&model), None));
    sim.init();
    assert_eq!(sim.model().params().route_id.as_deref(), Some("10H"));
}

#[test]
fn catalog_failure_leaves_catalog_empty() {
    let model = Arc::new(FakeModel {
        catalog_down: true,
        ..FakeModel::default()
    });
    let mut sim = ProgramSimulator::new(TripModel::new(config(), services(&model), None));
    sim.init();
    assert!(sim.model().catalog().is_empty());
    assert_eq!(sim.model().params().route_id, None);
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn history_is_capped_newest_first() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);
    lines(&mut sim, &["from Ameerpet", "to Kukatpally"]);

    for hour in 0..=HISTORY_CAPACITY {
        sim.inject_line(format!("hour {hour}"));
        sim.inject_line("calc");
        sim.run_all_tasks();
    }
    let history = sim.model().history();
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history.get(0).unwrap().params.hour, HISTORY_CAPACITY as u8);
    assert_eq!(history.get(HISTORY_CAPACITY - 1).unwrap().params.hour, 1);
}

#[test]
fn history_select_restores_and_rearms_gate() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);

    lines(&mut sim, &["from Ameerpet", "to Kukatpally", "weather rainy", "calc"]);
    sim.run_all_tasks();
    lines(&mut sim, &["from Begumpet", "to Miyapur", "weather sunny", "calc"]);
    sim.run_all_tasks();

    sim.inject_line("history 2");
    let params = sim.model().params();
    assert_eq!(params.origin, "Ameerpet");
    assert_eq!(params.weather_condition.as_str(), "Rainy");
    assert!(sim.model().gate().has_pending());
    assert!(sim.pending_tasks().is_empty());
    assert_eq!(sim.subscription_ids().len(), 1);

    settle(&mut sim);
    assert!(sim.pending_tasks().contains(&"predict"));
    sim.run_all_tasks();
    assert_eq!(sim.model().history().get(0).unwrap().params.origin, "Ameerpet");
}

#[test]
fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let model = Arc::new(FakeModel::default());

    {
        let registry = StateRegistry::with_file(&path).shared();
        registry.load().unwrap();
        let mut sim = persistent_simulator(&model, &registry);
        lines(&mut sim, &["from Ameerpet", "to Kukatpally", "calc"]);
        sim.run_all_tasks();
        assert!(sim.command_log().contains(&CmdRecord::SaveState));
    }

    let registry = StateRegistry::with_file(&path).shared();
    registry.load().unwrap();
    let sim = persistent_simulator(&model, &registry);
    let history = sim.model().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history.get(0).unwrap().params.destination, "Kukatpally");
}

#[test]
fn clear_history_persists_empty_ledger() {
    let model = Arc::new(FakeModel::default());
    let registry = StateRegistry::in_memory().shared();
    let mut sim = persistent_simulator(&model, &registry);

    lines(&mut sim, &["from Ameerpet", "to Kukatpally", "calc"]);
    sim.run_all_tasks();
    sim.inject_line("clear-history");
    assert!(sim.model().history().is_empty());

    let stored = registry.get(HISTORY_KEY).unwrap();
    assert_eq!(stored.data, b"[]");
}

#[test]
fn malformed_history_loads_empty() {
    let model = Arc::new(FakeModel::default());
    let registry = StateRegistry::in_memory().shared();
    registry.set(HISTORY_KEY, 1, b"{\"not\": \"a list\"}".to_vec());

    let sim = persistent_simulator(&model, &registry);
    assert!(sim.model().history().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Input handling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn bad_lines_show_a_notice_and_change_nothing() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);
    let before = sim.model().params().clone();

    sim.inject_line("weather hail");
    assert!(sim.model().notice().is_some());
    sim.inject_line("hour 31");
    assert_eq!(sim.model().notice(), None);
    assert_eq!(sim.model().params(), &before);
}

#[test]
fn end_of_input_quits() {
    let model = Arc::new(FakeModel::default());
    let mut sim = simulator(&model);
    sim.inject_event(Event::Closed);
    assert!(!sim.is_running());
}
