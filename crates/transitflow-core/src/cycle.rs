#![forbid(unsafe_code)]

//! Prediction cycle state machine.
//!
//! ```text
//!            begin()                accept_point()
//!   Idle ──────────────▶ Pending ─────────────────▶ Settled
//!                          │  │
//!                          │  └── point_failed() ─▶ Failed
//!                          │
//!                          └── begin() again ─────▶ Stale (for the old tag)
//! ```
//!
//! Each [`begin`](PredictionCycle::begin) advances the generation, clears the
//! displayed result and trend, and hands back a [`CycleTicket`] whose tag the
//! caller attaches to both the point and the trend request. Responses are fed
//! back with their tag; anything but the current tag is inert.
//!
//! # Invariants
//!
//! - Only the current generation mutates result, trend, error, or phase.
//! - A rejected query consumes no generation.
//! - Trend outcomes never change the phase.

use crate::error::InputError;
use crate::generation::{Generation, RequestGeneration};
use crate::prediction::{PredictionResult, Trend};
use crate::trip::TripParameters;

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The debounce gate settled.
    Auto,
    /// The user asked for a calculation.
    Manual,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

/// Lifecycle phase of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Pending,
    Settled,
    /// Superseded by a newer generation.
    Stale,
    Failed,
}

/// Handle for the requests of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleTicket {
    pub generation: Generation,
    pub trigger: Trigger,
    /// Parameters the requests are issued with.
    pub params: TripParameters,
}

/// Result of feeding a response into the cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Point result published; carries the snapshot to record in history.
    Published(TripParameters),
    TrendPublished,
    /// Trend failed or was malformed; trend left empty.
    TrendOmitted,
    /// Point request failed on a manual cycle; message is shown.
    ErrorVisible(String),
    /// Point request failed on an automatic cycle; nothing is shown.
    ErrorSuppressed,
    /// Response belonged to an older generation and was ignored.
    Stale,
}

/// Current cycle plus the state it publishes.
#[derive(Debug, Default)]
pub struct PredictionCycle {
    generation: RequestGeneration,
    phase: CyclePhase,
    trigger: Option<Trigger>,
    issued: Option<TripParameters>,
    result: Option<PredictionResult>,
    trend: Option<Trend>,
    visible_error: Option<String>,
    stale_discards: u64,
}

impl PredictionCycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `params` and start a cycle.
    ///
    /// On error nothing changes and no generation is consumed.
    pub fn begin(
        &mut self,
        params: TripParameters,
        trigger: Trigger,
    ) -> Result<CycleTicket, InputError> {
        params.validate_query()?;

        if self.phase == CyclePhase::Pending {
            tracing::debug!(
                superseded = %self.generation.current(),
                "pending cycle superseded"
            );
        }
        let generation = self.generation.advance();
        self.phase = CyclePhase::Pending;
        self.trigger = Some(trigger);
        self.issued = Some(params.clone());
        self.result = None;
        self.trend = None;
        self.visible_error = None;

        tracing::info!(
            %generation,
            trigger = trigger.as_str(),
            origin = %params.origin,
            destination = %params.destination,
            "prediction cycle started"
        );
        Ok(CycleTicket {
            generation,
            trigger,
            params,
        })
    }

    /// Feed a successful point prediction.
    pub fn accept_point(&mut self, tag: Generation, result: PredictionResult) -> CycleOutcome {
        if !self.generation.is_current(tag) {
            return self.discard(tag, "point");
        }
        self.phase = CyclePhase::Settled;
        self.result = Some(result);
        let snapshot = self.issued.clone().unwrap_or_default();
        CycleOutcome::Published(snapshot)
    }

    /// Feed a failed point prediction.
    pub fn point_failed(&mut self, tag: Generation, message: impl Into<String>) -> CycleOutcome {
        if !self.generation.is_current(tag) {
            return self.discard(tag, "point");
        }
        self.phase = CyclePhase::Failed;
        let message = message.into();
        match self.trigger {
            Some(Trigger::Manual) => {
                self.visible_error = Some(message.clone());
                CycleOutcome::ErrorVisible(message)
            }
            _ => CycleOutcome::ErrorSuppressed,
        }
    }

    /// Feed a successful trend.
    pub fn accept_trend(&mut self, tag: Generation, trend: Trend) -> CycleOutcome {
        if !self.generation.is_current(tag) {
            return self.discard(tag, "trend");
        }
        self.trend = Some(trend);
        CycleOutcome::TrendPublished
    }

    /// Feed a failed trend.
    pub fn trend_failed(&mut self, tag: Generation) -> CycleOutcome {
        if !self.generation.is_current(tag) {
            return self.discard(tag, "trend");
        }
        self.trend = None;
        CycleOutcome::TrendOmitted
    }

    fn discard(&mut self, tag: Generation, kind: &'static str) -> CycleOutcome {
        self.stale_discards += 1;
        tracing::debug!(
            %tag,
            current = %self.generation.current(),
            kind,
            "discarding stale response"
        );
        CycleOutcome::Stale
    }

    /// Phase of the cycle identified by `tag`.
    #[must_use]
    pub fn phase_of(&self, tag: Generation) -> CyclePhase {
        let current = self.generation.current();
        if tag == current {
            self.phase
        } else if tag < current {
            CyclePhase::Stale
        } else {
            CyclePhase::Idle
        }
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation.current()
    }

    #[inline]
    #[must_use]
    pub fn trigger(&self) -> Option<Trigger> {
        self.trigger
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> Option<&PredictionResult> {
        self.result.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn trend(&self) -> Option<&Trend> {
        self.trend.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn visible_error(&self) -> Option<&str> {
        self.visible_error.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn stale_discards(&self) -> u64 {
        self.stale_discards
    }
}
