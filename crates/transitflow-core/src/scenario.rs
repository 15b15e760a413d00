#![forbid(unsafe_code)]

//! Scenario synchronizer.
//!
//! Weather and event choices imply typical what-if values. When either choice
//! changes, [`synchronize`] rewrites the numeric fields from a fixed lookup
//! table, skipping any field the user has pinned.

use crate::trip::{EventType, TripParameters, WeatherCondition, WhatIfField};

/// What-if values implied by a weather/event pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioDefaults {
    pub temperature: f64,
    pub precipitation: f64,
    pub event_attendance: u32,
}

impl ScenarioDefaults {
    #[must_use]
    pub fn lookup(weather: WeatherCondition, event: EventType) -> Self {
        let (temperature, precipitation) = weather_defaults(weather);
        Self {
            temperature,
            precipitation,
            event_attendance: event_attendance(event),
        }
    }
}

/// `(temperature °C, precipitation mm)` for a weather condition.
#[must_use]
pub const fn weather_defaults(weather: WeatherCondition) -> (f64, f64) {
    match weather {
        WeatherCondition::Clear => (30.0, 0.0),
        WeatherCondition::Sunny => (35.0, 0.0),
        WeatherCondition::Cloudy => (28.0, 0.0),
        WeatherCondition::Rainy => (25.0, 20.0),
        WeatherCondition::Foggy => (20.0, 5.0),
        WeatherCondition::Snowy => (-2.0, 10.0),
    }
}

/// Typical attendance for an event type.
#[must_use]
pub const fn event_attendance(event: EventType) -> u32 {
    match event {
        EventType::Sports => 40_000,
        EventType::Concert => 25_000,
        EventType::Festival => 60_000,
        EventType::Protest => 10_000,
        EventType::None | EventType::Normal | EventType::Holiday | EventType::PeakHours => 0,
    }
}

/// Rewrite every unpinned what-if field from the lookup table.
///
/// Returns the fields that were written, in declaration order. The override
/// set is read, never modified.
pub fn synchronize(params: &mut TripParameters) -> Vec<WhatIfField> {
    let defaults = ScenarioDefaults::lookup(params.weather_condition, params.event_type);
    let mut written = Vec::with_capacity(3);

    if !params.is_overridden(WhatIfField::Temperature) {
        params.temperature = defaults.temperature;
        written.push(WhatIfField::Temperature);
    }
    if !params.is_overridden(WhatIfField::Precipitation) {
        params.precipitation = defaults.precipitation;
        written.push(WhatIfField::Precipitation);
    }
    if !params.is_overridden(WhatIfField::EventAttendance) {
        params.event_attendance = defaults.event_attendance;
        written.push(WhatIfField::EventAttendance);
    }
    written
}
