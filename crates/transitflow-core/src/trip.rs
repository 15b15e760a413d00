#![forbid(unsafe_code)]

//! Trip parameters and the input state store.
//!
//! [`TripParameters`] is the canonical query sent to the prediction service.
//! [`InputStore`] owns the live copy and is the only way to change it: every
//! [`TripEdit`] goes through [`InputStore::set`], which keeps the scenario
//! what-if values in sync with the categorical choices in the same call.
//!
//! # Invariants
//!
//! - `overridden_fields` only grows through explicit numeric edits.
//! - The synchronizer never writes an overridden field and never touches the
//!   override set.
//! - A rejected edit leaves the store unchanged.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::debounce::LocationPair;
use crate::error::InputError;
use crate::scenario::{self, ScenarioDefaults};

/// Latest valid hour of day.
pub const MAX_HOUR: u8 = 23;
/// Latest valid day of week (0 = Monday).
pub const MAX_DAY_OF_WEEK: u8 = 6;
/// Hour selected in a fresh form.
pub const DEFAULT_HOUR: u8 = 8;

/// Weather scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeatherCondition {
    #[default]
    Sunny,
    Clear,
    Cloudy,
    Rainy,
    Foggy,
    Snowy,
}

impl WeatherCondition {
    /// Every weather condition, in menu order.
    pub const ALL: [Self; 6] = [
        Self::Sunny,
        Self::Clear,
        Self::Cloudy,
        Self::Rainy,
        Self::Foggy,
        Self::Snowy,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunny => "Sunny",
            Self::Clear => "Clear",
            Self::Cloudy => "Cloudy",
            Self::Rainy => "Rainy",
            Self::Foggy => "Foggy",
            Self::Snowy => "Snowy",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherCondition {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_choice(s);
        Self::ALL
            .into_iter()
            .find(|w| normalize_choice(w.as_str()) == wanted)
            .ok_or_else(|| InputError::Unrecognized {
                field: "weather",
                value: s.to_string(),
            })
    }
}

/// Event scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventType {
    #[default]
    None,
    Normal,
    Holiday,
    #[serde(rename = "Peak Hours")]
    PeakHours,
    Festival,
    Protest,
    Sports,
    Concert,
}

impl EventType {
    /// Every event type, in menu order.
    pub const ALL: [Self; 8] = [
        Self::None,
        Self::Normal,
        Self::Holiday,
        Self::PeakHours,
        Self::Festival,
        Self::Protest,
        Self::Sports,
        Self::Concert,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Normal => "Normal",
            Self::Holiday => "Holiday",
            Self::PeakHours => "Peak Hours",
            Self::Festival => "Festival",
            Self::Protest => "Protest",
            Self::Sports => "Sports",
            Self::Concert => "Concert",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_choice(s);
        Self::ALL
            .into_iter()
            .find(|e| normalize_choice(e.as_str()) == wanted)
            .ok_or_else(|| InputError::Unrecognized {
                field: "event",
                value: s.to_string(),
            })
    }
}

/// Case-folds and strips separators so "peak-hours" matches "Peak Hours".
fn normalize_choice(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// A numeric what-if parameter the user can pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhatIfField {
    Temperature,
    Precipitation,
    EventAttendance,
}

impl WhatIfField {
    /// Accepted range; edits outside it are clamped.
    #[must_use]
    pub fn range(self) -> RangeInclusive<f64> {
        match self {
            Self::Temperature => -10.0..=50.0,
            Self::Precipitation => 0.0..=100.0,
            Self::EventAttendance => 0.0..=100_000.0,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Precipitation => "precipitation",
            Self::EventAttendance => "eventAttendance",
        }
    }

    /// Clamp a finite value into range. NaN is rejected.
    pub fn clamp(self, value: f64) -> Result<f64, InputError> {
        let range = self.range();
        if value.is_nan() {
            return Err(InputError::OutOfRange {
                field: self.name(),
                value,
                min: *range.start(),
                max: *range.end(),
            });
        }
        Ok(value.clamp(*range.start(), *range.end()))
    }
}

impl fmt::Display for WhatIfField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The canonical trip query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripParameters {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub route_id: Option<String>,
    pub weather_condition: WeatherCondition,
    pub event_type: EventType,
    pub hour: u8,
    pub day_of_week: u8,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Millimetres.
    pub precipitation: f64,
    /// People.
    pub event_attendance: u32,
    /// What-if fields the user pinned; never auto-derived again.
    #[serde(default)]
    pub overridden_fields: BTreeSet<WhatIfField>,
}

impl Default for TripParameters {
    fn default() -> Self {
        let weather_condition = WeatherCondition::default();
        let event_type = EventType::default();
        let defaults = ScenarioDefaults::lookup(weather_condition, event_type);
        Self {
            origin: String::new(),
            destination: String::new(),
            route_id: None,
            weather_condition,
            event_type,
            hour: DEFAULT_HOUR,
            day_of_week: 0,
            temperature: defaults.temperature,
            precipitation: defaults.precipitation,
            event_attendance: defaults.event_attendance,
            overridden_fields: BTreeSet::new(),
        }
    }
}

impl TripParameters {
    /// Origin/destination as a pair, untrimmed.
    #[must_use]
    pub fn location_pair(&self) -> LocationPair {
        LocationPair::new(self.origin.clone(), self.destination.clone())
    }

    #[inline]
    #[must_use]
    pub fn is_overridden(&self, field: WhatIfField) -> bool {
        self.overridden_fields.contains(&field)
    }

    /// Check that the record is a query worth sending.
    pub fn validate_query(&self) -> Result<(), InputError> {
        self.location_pair().validate()?;
        if self.hour > MAX_HOUR {
            return Err(out_of_range("hour", self.hour, MAX_HOUR));
        }
        if self.day_of_week > MAX_DAY_OF_WEEK {
            return Err(out_of_range("dayOfWeek", self.day_of_week, MAX_DAY_OF_WEEK));
        }
        Ok(())
    }
}

fn out_of_range(field: &'static str, value: u8, max: u8) -> InputError {
    InputError::OutOfRange {
        field,
        value: f64::from(value),
        min: 0.0,
        max: f64::from(max),
    }
}

/// One user edit.
#[derive(Debug, Clone, PartialEq)]
pub enum TripEdit {
    Origin(String),
    Destination(String),
    Route(Option<String>),
    Weather(WeatherCondition),
    Event(EventType),
    Hour(u8),
    DayOfWeek(u8),
    Temperature(f64),
    Precipitation(f64),
    EventAttendance(f64),
}

impl TripEdit {
    /// The what-if field this edit pins, if any.
    #[must_use]
    pub fn what_if_field(&self) -> Option<WhatIfField> {
        match self {
            Self::Temperature(_) => Some(WhatIfField::Temperature),
            Self::Precipitation(_) => Some(WhatIfField::Precipitation),
            Self::EventAttendance(_) => Some(WhatIfField::EventAttendance),
            _ => None,
        }
    }
}

/// What a single [`InputStore::set`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditReport {
    /// Origin or destination text differs from before.
    pub location_changed: bool,
    /// Weather or event type differs from before.
    pub scenario_changed: bool,
    /// Fields the synchronizer rewrote.
    pub synchronized: Vec<WhatIfField>,
}

impl EditReport {
    #[must_use]
    pub fn changed_anything(&self) -> bool {
        self.location_changed || self.scenario_changed || !self.synchronized.is_empty()
    }
}

/// Owner of the live [`TripParameters`].
#[derive(Debug, Clone, Default)]
pub struct InputStore {
    params: TripParameters,
}

impl InputStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_params(params: TripParameters) -> Self {
        Self { params }
    }

    /// Current record.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &TripParameters {
        &self.params
    }

    /// Owned copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> TripParameters {
        self.params.clone()
    }

    /// Apply one edit.
    ///
    /// Numeric what-if edits are clamped into range and pin their field.
    /// Weather/event edits that change the value run the scenario
    /// synchronizer before returning. Hour and day edits out of range are
    /// rejected and leave the store untouched.
    pub fn set(&mut self, edit: TripEdit) -> Result<EditReport, InputError> {
        let mut report = EditReport::default();
        match edit {
            TripEdit::Origin(origin) => {
                report.location_changed = self.params.origin != origin;
                self.params.origin = origin;
            }
            TripEdit::Destination(destination) => {
                report.location_changed = self.params.destination != destination;
                self.params.destination = destination;
            }
            TripEdit::Route(route_id) => {
                self.params.route_id = route_id.filter(|r| !r.trim().is_empty());
            }
            TripEdit::Weather(weather) => {
                if self.params.weather_condition != weather {
                    self.params.weather_condition = weather;
                    report.scenario_changed = true;
                }
            }
            TripEdit::Event(event) => {
                if self.params.event_type != event {
                    self.params.event_type = event;
                    report.scenario_changed = true;
                }
            }
            TripEdit::Hour(hour) => {
                if hour > MAX_HOUR {
                    return Err(out_of_range("hour", hour, MAX_HOUR));
                }
                self.params.hour = hour;
            }
            TripEdit::DayOfWeek(day) => {
                if day > MAX_DAY_OF_WEEK {
                    return Err(out_of_range("dayOfWeek", day, MAX_DAY_OF_WEEK));
                }
                self.params.day_of_week = day;
            }
            TripEdit::Temperature(value) => {
                self.params.temperature = WhatIfField::Temperature.clamp(value)?;
                self.params.overridden_fields.insert(WhatIfField::Temperature);
            }
            TripEdit::Precipitation(value) => {
                self.params.precipitation = WhatIfField::Precipitation.clamp(value)?;
                self.params.overridden_fields.insert(WhatIfField::Precipitation);
            }
            TripEdit::EventAttendance(value) => {
                let clamped = WhatIfField::EventAttendance.clamp(value)?;
                self.params.event_attendance = clamped.round() as u32;
                self.params
                    .overridden_fields
                    .insert(WhatIfField::EventAttendance);
            }
        }

        if report.scenario_changed {
            report.synchronized = scenario::synchronize(&mut self.params);
            tracing::debug!(
                weather = %self.params.weather_condition,
                event = %self.params.event_type,
                rewritten = ?report.synchronized,
                "scenario synchronized"
            );
        }
        Ok(report)
    }

    /// Replace the whole record, e.g. from a history snapshot.
    pub fn restore(&mut self, snapshot: TripParameters) -> EditReport {
        let report = EditReport {
            location_changed: self.params.origin != snapshot.origin
                || self.params.destination != snapshot.destination,
            scenario_changed: self.params.weather_condition != snapshot.weather_condition
                || self.params.event_type != snapshot.event_type,
            synchronized: Vec::new(),
        };
        self.params = snapshot;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_uses_sunny_defaults() {
        let p = TripParameters::default();
        assert_eq!(p.weather_condition, WeatherCondition::Sunny);
        assert_eq!(p.event_type, EventType::None);
        assert_eq!(p.hour, 8);
        assert_eq!(p.temperature, 35.0);
        assert_eq!(p.precipitation, 0.0);
        assert_eq!(p.event_attendance, 0);
        assert!(p.overridden_fields.is_empty());
    }

    #[test]
    fn numeric_edit_pins_field() {
        let mut store = InputStore::new();
        store.set(TripEdit::Temperature(12.0)).unwrap();
        assert!(store.params().is_overridden(WhatIfField::Temperature));
        assert!(!store.params().is_overridden(WhatIfField::Precipitation));
        assert_eq!(store.params().temperature, 12.0);
    }

    #[test]
    fn categorical_edit_does_not_pin() {
        let mut store = InputStore::new();
        store.set(TripEdit::Weather(WeatherCondition::Rainy)).unwrap();
        store.set(TripEdit::Origin("Hyderabad".into())).unwrap();
        assert!(store.params().overridden_fields.is_empty());
    }

    #[test]
    fn weather_change_synchronizes_unpinned_fields() {
        let mut store = InputStore::new();
        store.set(TripEdit::Temperature(5.0)).unwrap();
        let report = store.set(TripEdit::Weather(WeatherCondition::Rainy)).unwrap();

        assert!(report.scenario_changed);
        assert_eq!(report.synchronized, vec![WhatIfField::Precipitation, WhatIfField::EventAttendance]);
        assert_eq!(store.params().temperature, 5.0);
        assert_eq!(store.params().precipitation, 20.0);
    }

    #[test]
    fn same_weather_is_not_a_scenario_change() {
        let mut store = InputStore::new();
        let report = store.set(TripEdit::Weather(WeatherCondition::Sunny)).unwrap();
        assert!(!report.scenario_changed);
        assert!(report.synchronized.is_empty());
    }

    #[test]
    fn what_if_edits_are_clamped() {
        let mut store = InputStore::new();
        store.set(TripEdit::Temperature(80.0)).unwrap();
        store.set(TripEdit::Precipitation(-3.0)).unwrap();
        store.set(TripEdit::EventAttendance(250_000.0)).unwrap();
        assert_eq!(store.params().temperature, 50.0);
        assert_eq!(store.params().precipitation, 0.0);
        assert_eq!(store.params().event_attendance, 100_000);
    }

    #[test]
    fn nan_is_rejected_without_mutation() {
        let mut store = InputStore::new();
        let before = store.snapshot();
        assert!(store.set(TripEdit::Precipitation(f64::NAN)).is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn hour_out_of_range_rejected() {
        let mut store = InputStore::new();
        let err = store.set(TripEdit::Hour(24)).unwrap_err();
        assert!(matches!(err, InputError::OutOfRange { field: "hour", .. }));
        assert_eq!(store.params().hour, DEFAULT_HOUR);
        assert!(store.set(TripEdit::DayOfWeek(7)).is_err());
    }

    #[test]
    fn location_change_reported_only_on_difference() {
        let mut store = InputStore::new();
        assert!(store.set(TripEdit::Origin("A".into())).unwrap().location_changed);
        assert!(!store.set(TripEdit::Origin("A".into())).unwrap().location_changed);
    }

    #[test]
    fn blank_route_clears_selection() {
        let mut store = InputStore::new();
        store.set(TripEdit::Route(Some("R-12".into()))).unwrap();
        assert_eq!(store.params().route_id.as_deref(), Some("R-12"));
        store.set(TripEdit::Route(Some("  ".into()))).unwrap();
        assert_eq!(store.params().route_id, None);
    }

    #[test]
    fn restore_replaces_record_including_overrides() {
        let mut pinned = TripParameters::default();
        pinned.origin = "X".into();
        pinned.destination = "Y".into();
        pinned.overridden_fields.insert(WhatIfField::Precipitation);

        let mut store = InputStore::new();
        let report = store.restore(pinned.clone());
        assert!(report.location_changed);
        assert_eq!(store.snapshot(), pinned);
    }

    #[test]
    fn choices_parse_loosely() {
        assert_eq!("rainy".parse::<WeatherCondition>().unwrap(), WeatherCondition::Rainy);
        assert_eq!("peak-hours".parse::<EventType>().unwrap(), EventType::PeakHours);
        assert_eq!("Peak Hours".parse::<EventType>().unwrap(), EventType::PeakHours);
        assert!("hail".parse::<WeatherCondition>().is_err());
    }

    #[test]
    fn validate_query_rejects_self_trip() {
        let mut p = TripParameters::default();
        p.origin = "Pune".into();
        p.destination = " Pune ".into();
        assert!(matches!(p.validate_query(), Err(InputError::SelfTrip { .. })));
    }

    #[test]
    fn parameters_round_trip_through_json() {
        let mut p = TripParameters::default();
        p.event_type = EventType::PeakHours;
        p.overridden_fields.insert(WhatIfField::EventAttendance);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"Peak Hours\""));
        assert!(json.contains("\"eventAttendance\""));
        let back: TripParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
