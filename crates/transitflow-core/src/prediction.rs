#![forbid(unsafe_code)]

//! Prediction service results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Delay impact, ordered `Low < Moderate < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Moderate,
    High,
}

impl Severity {
    /// Bucket a predicted extra delay (minutes) when the service gives none.
    #[must_use]
    pub fn from_delay(minutes: f64) -> Self {
        if minutes < 5.0 {
            Self::Low
        } else if minutes < 15.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "moderate" | "medium" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            _ => Err(format!("unknown severity {s:?}")),
        }
    }
}

/// Point estimate for one query. Built whole, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Minutes added by the model, never negative.
    pub predicted_extra_delay: f64,
    /// Model's own total, used when no live route is loaded.
    pub total_estimated_arrival: f64,
    pub severity: Severity,
    /// Base travel time the service itself looked up, when reported.
    pub base_time: Option<f64>,
}

impl PredictionResult {
    /// Build a result, clamping a negative delay to zero and deriving the
    /// severity from the delay when the service did not send one.
    #[must_use]
    pub fn new(
        predicted_extra_delay: f64,
        total_estimated_arrival: f64,
        severity: Option<Severity>,
        base_time: Option<f64>,
    ) -> Self {
        let predicted_extra_delay = if predicted_extra_delay.is_finite() {
            predicted_extra_delay.max(0.0)
        } else {
            0.0
        };
        Self {
            predicted_extra_delay,
            total_estimated_arrival,
            severity: severity.unwrap_or_else(|| Severity::from_delay(predicted_extra_delay)),
            base_time,
        }
    }
}

/// Delay for one hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub hour: u8,
    pub delay: f64,
}

/// A trend payload that is not one point per hour in order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrendShapeError {
    #[error("trend has {len} points, expected 24")]
    WrongLength { len: usize },
    #[error("trend point {index} has hour {hour}")]
    OutOfOrder { index: usize, hour: u8 },
}

/// A full day of delays: 24 points, hours `0..=23` in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Trend(Vec<TrendPoint>);

impl Trend {
    pub const HOURS: usize = 24;

    pub fn try_from_points(points: Vec<TrendPoint>) -> Result<Self, TrendShapeError> {
        if points.len() != Self::HOURS {
            return Err(TrendShapeError::WrongLength { len: points.len() });
        }
        for (index, point) in points.iter().enumerate() {
            if usize::from(point.hour) != index {
                return Err(TrendShapeError::OutOfOrder {
                    index,
                    hour: point.hour,
                });
            }
        }
        Ok(Self(points))
    }

    #[inline]
    #[must_use]
    pub fn points(&self) -> &[TrendPoint] {
        &self.0
    }

    /// Delay at a given hour.
    #[must_use]
    pub fn at(&self, hour: u8) -> Option<f64> {
        self.0.get(usize::from(hour)).map(|p| p.delay)
    }

    /// The worst hour; the earliest one on ties.
    #[must_use]
    pub fn peak(&self) -> Option<TrendPoint> {
        self.0
            .iter()
            .copied()
            .reduce(|best, p| if p.delay > best.delay { p } else { best })
    }
}
