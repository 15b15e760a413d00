#![forbid(unsafe_code)]

//! Derived arrival time.
//!
//! The displayed arrival merges the live route with the model: the selected
//! route's first-leg duration plus the predicted extra delay. Without a route
//! the model's own total is shown, and without either a `0` sentinel.

use std::fmt;

use crate::prediction::PredictionResult;
use crate::route::{RouteAlternative, RouteLeg};

/// Traffic slower than free flow by more than this counts as traffic.
pub const TRAFFIC_THRESHOLD_SECONDS: u64 = 300;

/// The arrival figure shown to the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArrivalEstimate {
    /// Route duration plus predicted delay, rounded to whole minutes.
    Routed { minutes: i64 },
    /// No route loaded; the model's total.
    ModelOnly { minutes: f64 },
    /// Nothing to show.
    Unavailable,
}

impl ArrivalEstimate {
    /// Minutes as displayed, `0` when unavailable.
    #[must_use]
    pub fn display_minutes(&self) -> String {
        match self {
            Self::Routed { minutes } => minutes.to_string(),
            Self::ModelOnly { minutes } => format!("{minutes}"),
            Self::Unavailable => "0".to_string(),
        }
    }
}

impl fmt::Display for ArrivalEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.display_minutes())
    }
}

/// Combine the selected route and the prediction into one arrival figure.
#[must_use]
pub fn estimate_arrival(
    route: Option<&RouteAlternative>,
    prediction: Option<&PredictionResult>,
) -> ArrivalEstimate {
    let extra = prediction.map_or(0.0, |p| p.predicted_extra_delay);
    match route.and_then(RouteAlternative::first_leg) {
        Some(leg) => {
            let base_minutes = leg.effective_seconds() as f64 / 60.0;
            ArrivalEstimate::Routed {
                minutes: (base_minutes + extra).round() as i64,
            }
        }
        None => match prediction {
            Some(p) => ArrivalEstimate::ModelOnly {
                minutes: p.total_estimated_arrival,
            },
            None => ArrivalEstimate::Unavailable,
        },
    }
}

/// Live traffic flag for a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrafficInfo {
    pub has_traffic: bool,
    /// Whole minutes lost to traffic; 0 when `has_traffic` is false.
    pub delay_minutes: i64,
}

#[must_use]
pub fn traffic_info(leg: &RouteLeg) -> TrafficInfo {
    let Some(in_traffic) = leg.duration_in_traffic_seconds else {
        return TrafficInfo::default();
    };
    if in_traffic <= leg.duration_seconds.saturating_add(TRAFFIC_THRESHOLD_SECONDS) {
        return TrafficInfo::default();
    }
    let diff = in_traffic - leg.duration_seconds;
    TrafficInfo {
        has_traffic: true,
        delay_minutes: (diff as f64 / 60.0).round() as i64,
    }
}
