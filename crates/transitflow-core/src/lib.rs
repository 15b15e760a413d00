#![forbid(unsafe_code)]

//! Core domain model for the TransitFlow trip-delay estimator.
//!
//! Everything in this crate is pure: no network, no clock reads outside the
//! `*_at(now)` style entry points, no storage. The runtime and application
//! crates feed it events and carry out the side effects it asks for.
//!
//! # Modules
//!
//! - [`trip`]: [`TripParameters`] and the [`InputStore`] that owns them
//! - [`scenario`]: weather/event lookup table and synchronization
//! - [`debounce`]: [`DebounceGate`] for origin/destination settling
//! - [`generation`]: monotonic [`RequestGeneration`] counters
//! - [`prediction`]: service results ([`PredictionResult`], [`Trend`])
//! - [`route`]: routing alternatives and transit agencies
//! - [`arrival`]: derived arrival time and traffic flag
//! - [`cycle`]: per-query [`PredictionCycle`] state machine
//! - [`history`]: bounded [`HistoryLedger`] of past queries

pub mod arrival;
pub mod cycle;
pub mod debounce;
pub mod error;
pub mod generation;
pub mod history;
pub mod prediction;
pub mod route;
pub mod scenario;
pub mod trip;

pub use arrival::{ArrivalEstimate, TrafficInfo, estimate_arrival, traffic_info};
pub use cycle::{CycleOutcome, CyclePhase, CycleTicket, PredictionCycle, Trigger};
pub use debounce::{DebounceConfig, DebounceGate, GateAction, GateStats, LocationPair};
pub use error::InputError;
pub use generation::{Generation, RequestGeneration};
pub use history::{HISTORY_CAPACITY, HISTORY_KEY, HistoryEntry, HistoryLedger};
pub use prediction::{PredictionResult, Severity, Trend, TrendPoint, TrendShapeError};
pub use route::{LatLng, RouteAlternative, RouteLeg, RouteSet, TransitAgency};
pub use scenario::{ScenarioDefaults, synchronize};
pub use trip::{
    EditReport, EventType, InputStore, TripEdit, TripParameters, WeatherCondition, WhatIfField,
};
