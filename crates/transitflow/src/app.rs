#![forbid(unsafe_code)]

//! The trip prediction orchestrator.
//!
//! [`TripModel`] turns edits into queries. Location edits go through the
//! [`DebounceGate`]; when a pair settles (or the user asks with `calc`) a
//! [`PredictionCycle`] starts and two tasks race for it: the point estimate
//! and the 24-hour trend. Directions, nearby agencies and the route catalog
//! are fetched by their own tasks. Every response carries the generation it
//! was issued under and is dropped if a newer request of its family has
//! started since.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use transitflow_client::{
    DirectionsProvider, PlacesProvider, PredictionService, RoutingError, ServiceError,
    nearby_agencies,
};
use transitflow_core::{
    ArrivalEstimate, CycleOutcome, CycleTicket, DebounceConfig, DebounceGate, GateAction,
    Generation, HISTORY_KEY, HistoryEntry, HistoryLedger, InputError, InputStore, LocationPair,
    PredictionCycle, PredictionResult, RequestGeneration, RouteAlternative, RouteSet,
    TrafficInfo, TransitAgency, Trend, TripEdit, TripParameters, Trigger, estimate_arrival,
    traffic_info,
};
use transitflow_runtime::{
    Cmd, Event, Every, Frame, Model, StateRegistry, StorageError, Subscription,
};

use crate::command::{self, Command, CommandError};
use crate::error::TripError;
use crate::view;

/// Schema version of the persisted history blob.
pub const HISTORY_FORMAT_VERSION: u32 = 1;

const DEBOUNCE_TICK_ID: u64 = 0x7472_6970;

/// Orchestrator tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Quiet period before a location edit counts as settled.
    pub debounce: Duration,
    /// How often the gate is polled while an edit is pending.
    pub tick_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debounce: DebounceConfig::default().quiet_period(),
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// The external collaborators, shared with background tasks.
#[derive(Clone)]
pub struct Services {
    pub prediction: Arc<dyn PredictionService>,
    pub directions: Arc<dyn DirectionsProvider>,
    pub places: Arc<dyn PlacesProvider>,
}

impl Services {
    pub fn new(
        prediction: impl PredictionService + 'static,
        directions: impl DirectionsProvider + 'static,
        places: impl PlacesProvider + 'static,
    ) -> Self {
        Self {
            prediction: Arc::new(prediction),
            directions: Arc::new(directions),
            places: Arc::new(places),
        }
    }
}

/// Messages driving [`TripModel`].
#[derive(Debug)]
pub enum Msg {
    /// A parsed input line.
    Command(Command),
    /// An input line that did not parse.
    Rejected(CommandError),
    /// A blank line.
    Refresh,
    /// Debounce poll.
    Tick(Instant),
    /// Input stream ended.
    InputClosed,
    CatalogLoaded(Result<Vec<String>, ServiceError>),
    PointArrived {
        generation: Generation,
        result: Result<PredictionResult, ServiceError>,
    },
    TrendArrived {
        generation: Generation,
        result: Result<Trend, ServiceError>,
    },
    RoutesArrived {
        generation: Generation,
        result: Result<Vec<RouteAlternative>, RoutingError>,
    },
    AgenciesArrived {
        generation: Generation,
        agencies: Vec<TransitAgency>,
    },
}

impl From<Event> for Msg {
    fn from(event: Event) -> Self {
        match event {
            Event::Line(line) => match command::parse(&line) {
                Ok(Some(command)) => Self::Command(command),
                Ok(None) => Self::Refresh,
                Err(e) => Self::Rejected(e),
            },
            Event::Closed => Self::InputClosed,
        }
    }
}

/// Application state.
pub struct TripModel {
    config: AppConfig,
    services: Services,
    registry: Option<Arc<StateRegistry>>,

    store: InputStore,
    gate: DebounceGate,
    cycle: PredictionCycle,
    history: HistoryLedger,

    catalog: Vec<String>,
    routes: RouteSet,
    route_generation: RequestGeneration,
    last_settled: Option<LocationPair>,
    agencies: Vec<TransitAgency>,
    agency_generation: RequestGeneration,
    agencies_origin: Option<String>,

    notice: Option<String>,
    show_help: bool,
}

impl TripModel {
    /// Without a registry history lives only in memory.
    pub fn new(
        config: AppConfig,
        services: Services,
        registry: Option<Arc<StateRegistry>>,
    ) -> Self {
        let gate = DebounceGate::new(DebounceConfig::default().with_quiet_period(config.debounce));
        Self {
            config,
            services,
            registry,
            store: InputStore::new(),
            gate,
            cycle: PredictionCycle::new(),
            history: HistoryLedger::new(),
            catalog: Vec::new(),
            routes: RouteSet::default(),
            route_generation: RequestGeneration::new(),
            last_settled: None,
            agencies: Vec::new(),
            agency_generation: RequestGeneration::new(),
            agencies_origin: None,
            notice: None,
            show_help: false,
        }
    }

    // ── accessors used by the view and tests ────────────────────────────

    #[must_use]
    pub fn params(&self) -> &TripParameters {
        self.store.params()
    }

    #[must_use]
    pub fn cycle(&self) -> &PredictionCycle {
        &self.cycle
    }

    #[must_use]
    pub fn gate(&self) -> &DebounceGate {
        &self.gate
    }

    #[must_use]
    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    #[must_use]
    pub fn routes(&self) -> &RouteSet {
        &self.routes
    }

    #[must_use]
    pub fn agencies(&self) -> &[TransitAgency] {
        &self.agencies
    }

    #[must_use]
    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    #[must_use]
    pub fn show_help(&self) -> bool {
        self.show_help
    }

    /// Arrival figure for the selected route and the published prediction.
    #[must_use]
    pub fn arrival(&self) -> ArrivalEstimate {
        estimate_arrival(self.routes.selected(), self.cycle.result())
    }

    /// Live traffic on the selected route, if one is loaded.
    #[must_use]
    pub fn traffic(&self) -> Option<TrafficInfo> {
        self.routes
            .selected()
            .and_then(RouteAlternative::first_leg)
            .map(traffic_info)
    }

    // ── commands ────────────────────────────────────────────────────────

    fn on_command(&mut self, command: Command) -> Cmd<Msg> {
        self.notice = None;
        match command {
            Command::Edit(edit) => {
                self.apply_edit(edit);
                Cmd::none()
            }
            Command::Calculate => self.calculate(),
            Command::SelectRoute(index) => {
                match self.routes.select(index) {
                    Ok(()) => debug!(index, "route alternative selected"),
                    Err(e) => self.input_rejected(e),
                }
                Cmd::none()
            }
            Command::SelectHistory(index) => {
                self.restore_history(index);
                Cmd::none()
            }
            Command::ClearHistory => {
                self.history.clear();
                info!("history cleared");
                self.persist_history()
            }
            Command::Help => {
                self.show_help = !self.show_help;
                Cmd::none()
            }
            Command::Quit => Cmd::quit(),
        }
    }

    fn apply_edit(&mut self, edit: TripEdit) {
        match self.store.set(edit) {
            Ok(report) => {
                if report.location_changed {
                    self.gate
                        .observe_at(self.store.params().location_pair(), Instant::now());
                }
            }
            Err(e) => self.input_rejected(e),
        }
    }

    fn input_rejected(&self, e: InputError) {
        let err = TripError::from(e);
        info!(error = %err, "input rejected");
    }

    /// Manual trigger. A pending location edit is settled on the spot.
    fn calculate(&mut self) -> Cmd<Msg> {
        let mut cmds = Vec::new();
        if let Some(pair) = self.gate.flush() {
            if pair.validate().is_ok() {
                cmds.push(self.refresh_surroundings(&pair));
            }
        }
        cmds.push(self.start_cycle(Trigger::Manual));
        Cmd::batch(cmds)
    }

    /// Restore a past search and let the gate settle it like a fresh edit.
    fn restore_history(&mut self, index: usize) {
        let Some(snapshot) = self.history.select(index) else {
            info!(index, len = self.history.len(), "no such history entry");
            return;
        };
        let report = self.store.restore(snapshot);
        self.gate
            .observe_at(self.store.params().location_pair(), Instant::now());
        info!(
            index,
            location_changed = report.location_changed,
            "history entry restored"
        );
    }

    // ── triggering ──────────────────────────────────────────────────────

    fn on_tick(&mut self, now: Instant) -> Cmd<Msg> {
        match self.gate.poll_at(now) {
            GateAction::None => Cmd::none(),
            GateAction::Suppressed { pair, reason } => {
                debug!(
                    origin = %pair.origin,
                    destination = %pair.destination,
                    %reason,
                    "settled pair is not a query"
                );
                Cmd::none()
            }
            GateAction::Settled(pair) => {
                let surroundings = self.refresh_surroundings(&pair);
                let cycle = self.start_cycle(Trigger::Auto);
                Cmd::batch(vec![surroundings, cycle])
            }
        }
    }

    fn start_cycle(&mut self, trigger: Trigger) -> Cmd<Msg> {
        match self.cycle.begin(self.store.snapshot(), trigger) {
            Ok(ticket) => self.spawn_cycle(ticket),
            Err(e) => {
                self.input_rejected(e);
                Cmd::none()
            }
        }
    }

    fn spawn_cycle(&self, ticket: CycleTicket) -> Cmd<Msg> {
        let CycleTicket {
            generation, params, ..
        } = ticket;
        let params = Arc::new(params);

        let service = Arc::clone(&self.services.prediction);
        let query = Arc::clone(&params);
        let point = Cmd::task_named("predict", move || Msg::PointArrived {
            generation,
            result: service.predict(&query),
        });

        let service = Arc::clone(&self.services.prediction);
        let trend = Cmd::task_named("trend", move || Msg::TrendArrived {
            generation,
            result: service.predict_trend(&params),
        });

        Cmd::batch(vec![point, trend])
    }

    /// Directions and agencies for a newly settled pair.
    fn refresh_surroundings(&mut self, pair: &LocationPair) -> Cmd<Msg> {
        if self.last_settled.as_ref() == Some(pair) {
            return Cmd::none();
        }
        self.last_settled = Some(pair.clone());

        let mut cmds = vec![self.fetch_routes(pair.clone())];
        if self.agencies_origin.as_deref() != Some(pair.origin.as_str()) {
            cmds.push(self.fetch_agencies(pair.origin.clone()));
        }
        Cmd::batch(cmds)
    }

    fn fetch_routes(&mut self, pair: LocationPair) -> Cmd<Msg> {
        let generation = self.route_generation.advance();
        self.routes = RouteSet::default();
        let directions = Arc::clone(&self.services.directions);
        Cmd::task_named("directions", move || Msg::RoutesArrived {
            generation,
            result: directions.directions(&pair),
        })
    }

    fn fetch_agencies(&mut self, origin: String) -> Cmd<Msg> {
        let generation = self.agency_generation.advance();
        self.agencies.clear();
        self.agencies_origin = Some(origin.clone());
        let places = Arc::clone(&self.services.places);
        Cmd::task_named("places", move || Msg::AgenciesArrived {
            generation,
            agencies: nearby_agencies(places.as_ref(), &origin),
        })
    }

    // ── responses ───────────────────────────────────────────────────────

    fn on_point(
        &mut self,
        generation: Generation,
        result: Result<PredictionResult, ServiceError>,
    ) -> Cmd<Msg> {
        let err = match result {
            Ok(prediction) => {
                return match self.cycle.accept_point(generation, prediction) {
                    CycleOutcome::Published(snapshot) => {
                        self.history.append(HistoryEntry::now(snapshot));
                        self.persist_history()
                    }
                    _ => Cmd::none(),
                };
            }
            Err(e) => TripError::Prediction(e),
        };

        let message = err.user_message();
        match self.cycle.point_failed(generation, message) {
            CycleOutcome::Stale => debug!(%generation, error = %err, "stale prediction failure"),
            _ => {
                let visible = self
                    .cycle
                    .trigger()
                    .is_some_and(|trigger| err.is_user_visible(trigger));
                warn!(%generation, error = %err, visible, "prediction failed");
            }
        }
        Cmd::none()
    }

    fn on_trend(&mut self, generation: Generation, result: Result<Trend, ServiceError>) {
        match result {
            Ok(trend) => {
                self.cycle.accept_trend(generation, trend);
            }
            Err(e) => {
                if self.cycle.trend_failed(generation) == CycleOutcome::TrendOmitted {
                    info!(%generation, error = %TripError::Trend(e), "trend omitted");
                }
            }
        }
    }

    fn on_routes(
        &mut self,
        generation: Generation,
        result: Result<Vec<RouteAlternative>, RoutingError>,
    ) {
        if !self.route_generation.is_current(generation) {
            debug!(%generation, "stale directions discarded");
            return;
        }
        match result {
            Ok(routes) => {
                info!(%generation, count = routes.len(), "routes loaded");
                self.routes = RouteSet::new(routes);
            }
            Err(e) => {
                warn!(%generation, error = %TripError::from(e), "directions unavailable");
                self.routes = RouteSet::default();
            }
        }
    }

    fn on_agencies(&mut self, generation: Generation, agencies: Vec<TransitAgency>) {
        if !self.agency_generation.is_current(generation) {
            debug!(%generation, "stale agency list discarded");
            return;
        }
        debug!(%generation, count = agencies.len(), "agencies loaded");
        self.agencies = agencies;
    }

    fn on_catalog(&mut self, result: Result<Vec<String>, ServiceError>) {
        match result {
            Ok(catalog) => {
                info!(count = catalog.len(), "route catalog loaded");
                if self.store.params().route_id.is_none() {
                    if let Some(first) = catalog.first() {
                        if let Err(e) = self.store.set(TripEdit::Route(Some(first.clone()))) {
                            self.input_rejected(e);
                        }
                    }
                }
                self.catalog = catalog;
            }
            Err(e) => warn!(error = %TripError::Catalog(e), "route catalog unavailable"),
        }
    }

    // ── persistence ─────────────────────────────────────────────────────

    fn load_history(&mut self) {
        let Some(registry) = &self.registry else {
            return;
        };
        if let Some(entry) = registry.get(HISTORY_KEY) {
            if entry.version != HISTORY_FORMAT_VERSION {
                warn!(
                    found = entry.version,
                    expected = HISTORY_FORMAT_VERSION,
                    "history format changed; starting empty"
                );
                return;
            }
            self.history = HistoryLedger::from_json(&entry.data);
            info!(entries = self.history.len(), "history loaded");
        }
    }

    fn persist_history(&self) -> Cmd<Msg> {
        let Some(registry) = &self.registry else {
            return Cmd::none();
        };
        match self.history.to_json() {
            Ok(data) => {
                registry.set(HISTORY_KEY, HISTORY_FORMAT_VERSION, data);
                Cmd::save_state()
            }
            Err(e) => {
                let err = TripError::from(StorageError::Serialization(e.to_string()));
                warn!(error = %err, "history not saved");
                Cmd::none()
            }
        }
    }
}

impl Model for TripModel {
    type Message = Msg;

    fn init(&mut self) -> Cmd<Msg> {
        self.load_history();
        let prediction = Arc::clone(&self.services.prediction);
        Cmd::task_named("routes", move || Msg::CatalogLoaded(prediction.routes()))
    }

    fn update(&mut self, msg: Msg) -> Cmd<Msg> {
        match msg {
            Msg::Command(command) => self.on_command(command),
            Msg::Rejected(e) => {
                debug!(error = %e, "line rejected");
                self.notice = Some(e.to_string());
                Cmd::none()
            }
            Msg::Refresh => Cmd::none(),
            Msg::Tick(now) => self.on_tick(now),
            Msg::InputClosed => {
                info!("input closed");
                Cmd::quit()
            }
            Msg::CatalogLoaded(result) => {
                self.on_catalog(result);
                Cmd::none()
            }
            Msg::PointArrived { generation, result } => self.on_point(generation, result),
            Msg::TrendArrived { generation, result } => {
                self.on_trend(generation, result);
                Cmd::none()
            }
            Msg::RoutesArrived { generation, result } => {
                self.on_routes(generation, result);
                Cmd::none()
            }
            Msg::AgenciesArrived {
                generation,
                agencies,
            } => {
                self.on_agencies(generation, agencies);
                Cmd::none()
            }
        }
    }

    fn view(&self, frame: &mut Frame) {
        view::render(self, frame);
    }

    fn subscriptions(&self) -> Vec<Box<dyn Subscription<Msg>>> {
        if !self.gate.has_pending() {
            return vec![];
        }
        vec![Box::new(Every::with_id(
            DEBOUNCE_TICK_ID,
            self.config.tick_interval,
            || Msg::Tick(Instant::now()),
        ))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transitflow_client::{PlacesError, ServiceError};
    use transitflow_core::{LatLng, RouteLeg, Severity};

    struct Canned;

    impl PredictionService for Canned {
        fn routes(&self) -> Result<Vec<String>, ServiceError> {
            Ok(vec!["10H".into(), "218".into()])
        }

        fn predict(&self, _: &TripParameters) -> Result<PredictionResult, ServiceError> {
            Ok(PredictionResult::new(4.6, 40.0, None, None))
        }

        fn predict_trend(&self, _: &TripParameters) -> Result<Trend, ServiceError> {
            Err(ServiceError::Decode {
                endpoint: "predict-trend",
                reason: "short".into(),
            })
        }
    }

    impl DirectionsProvider for Canned {
        fn directions(&self, _: &LocationPair) -> Result<Vec<RouteAlternative>, RoutingError> {
            Ok(vec![RouteAlternative {
                summary: "ORR".into(),
                legs: vec![RouteLeg {
                    duration_seconds: 1500,
                    duration_in_traffic_seconds: Some(1800),
                }],
            }])
        }
    }

    impl PlacesProvider for Canned {
        fn text_search(&self, query: &str) -> Result<Vec<TransitAgency>, PlacesError> {
            Ok(vec![TransitAgency {
                name: query.to_string(),
                address: None,
                rating: None,
                location: LatLng::default(),
            }])
        }
    }

    fn model() -> TripModel {
        TripModel::new(
            AppConfig::default(),
            Services::new(Canned, Canned, Canned),
            None,
        )
    }

    fn run(model: &mut TripModel, line: &str) {
        let cmd = model.update(Msg::from(Event::Line(line.into())));
        drain(model, cmd);
    }

    fn drain(model: &mut TripModel, cmd: Cmd<Msg>) {
        match cmd {
            Cmd::Batch(cmds) | Cmd::Sequence(cmds) => {
                for c in cmds {
                    drain(model, c);
                }
            }
            Cmd::Task(_, f) => {
                let next = model.update(f());
                drain(model, next);
            }
            Cmd::Msg(m) => {
                let next = model.update(m);
                drain(model, next);
            }
            _ => {}
        }
    }

    #[test]
    fn catalog_preselects_first_route() {
        let mut m = model();
        let cmd = m.init();
        drain(&mut m, cmd);
        assert_eq!(m.catalog(), ["10H", "218"]);
        assert_eq!(m.params().route_id.as_deref(), Some("10H"));
    }

    #[test]
    fn manual_calc_runs_full_cycle() {
        let mut m = model();
        run(&mut m, "from Secunderabad");
        run(&mut m, "to Gachibowli");
        assert!(m.gate().has_pending());
        run(&mut m, "calc");

        assert!(!m.gate().has_pending());
        let result = m.cycle().result().unwrap();
        assert_eq!(result.severity, Severity::Low);
        assert!(m.cycle().trend().is_none());
        assert_eq!(m.history().len(), 1);
        assert_eq!(m.routes().len(), 1);
        assert_eq!(m.arrival(), ArrivalEstimate::Routed { minutes: 35 });
        assert_eq!(m.agencies().len(), 2);
    }

    #[test]
    fn rejected_line_sets_notice_until_next_command() {
        let mut m = model();
        run(&mut m, "fly home");
        assert!(m.notice().unwrap().contains("unknown command"));
        run(&mut m, "hour 9");
        assert_eq!(m.notice(), None);
        assert_eq!(m.params().hour, 9);
    }

    #[test]
    fn subscription_only_while_pending() {
        let mut m = model();
        assert!(m.subscriptions().is_empty());
        run(&mut m, "from Ameerpet");
        assert_eq!(m.subscriptions().len(), 1);
        let cmd = m.update(Msg::Tick(Instant::now() + Duration::from_secs(5)));
        drain(&mut m, cmd);
        assert!(m.subscriptions().is_empty());
    }

    #[test]
    fn debounce_timer_comes_from_subscription() {
        let mut m = model();
        run(&mut m, "from Ameerpet");
        let subs = m.subscriptions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id(), DEBOUNCE_TICK_ID);

        assert!(matches!(Msg::from(Event::Line(String::new())), Msg::Refresh));
        assert!(matches!(Msg::from(Event::Closed), Msg::InputClosed));
    }
}
