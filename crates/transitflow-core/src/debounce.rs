#![forbid(unsafe_code)]

//! Debounce gate for origin/destination input.
//!
//! Typing into a location field produces a burst of edits. The gate holds
//! the latest pair and only releases it once the input has been quiet for
//! the configured period.
//!
//! # Usage
//!
//! ```ignore
//! use transitflow_core::debounce::{DebounceConfig, DebounceGate, GateAction};
//!
//! let mut gate = DebounceGate::new(DebounceConfig::default());
//!
//! // On every origin/destination edit
//! gate.observe(pair);
//!
//! // On tick
//! if let GateAction::Settled(pair) = gate.poll() {
//!     // start a prediction cycle
//! }
//! ```
//!
//! # Invariants
//!
//! - **Single slot**: at most one pending pair; a new edit replaces it and
//!   restarts the quiet period.
//! - **Latest wins**: a settled pair is always the last observed one.
//! - **Guarded emission**: an empty field or a self-trip is suppressed at
//!   emission time, never emitted.
//! - **Deterministic**: identical `(pair, instant)` sequences give identical
//!   actions.

use std::time::{Duration, Instant};

use crate::error::InputError;

/// Location pair watched by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocationPair {
    pub origin: String,
    pub destination: String,
}

impl LocationPair {
    #[must_use]
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// Reject empty fields and self-trips.
    pub fn validate(&self) -> Result<(), InputError> {
        let origin = self.origin.trim();
        let destination = self.destination.trim();
        if origin.is_empty() {
            return Err(InputError::EmptyField { field: "origin" });
        }
        if destination.is_empty() {
            return Err(InputError::EmptyField {
                field: "destination",
            });
        }
        if origin == destination {
            return Err(InputError::SelfTrip {
                place: origin.to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for the debounce gate.
#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Quiet period before a pair settles (ms).
    pub quiet_period_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 1500,
        }
    }
}

impl DebounceConfig {
    #[must_use]
    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

/// Action returned by [`DebounceGate::poll_at`].
#[derive(Debug, Clone, PartialEq)]
pub enum GateAction {
    /// Nothing due.
    None,
    /// The pair settled and is a valid query.
    Settled(LocationPair),
    /// The pair settled but failed the guard.
    Suppressed {
        pair: LocationPair,
        reason: InputError,
    },
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    pub observed: u64,
    pub settled: u64,
    pub suppressed: u64,
    pub flushed: u64,
}

/// Single-slot quiet-period gate.
#[derive(Debug)]
pub struct DebounceGate {
    config: DebounceConfig,
    pending: Option<LocationPair>,
    last_edit: Option<Instant>,
    stats: GateStats,
}

impl DebounceGate {
    #[must_use]
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            pending: None,
            last_edit: None,
            stats: GateStats::default(),
        }
    }

    /// Record an edit now.
    pub fn observe(&mut self, pair: LocationPair) {
        self.observe_at(pair, Instant::now());
    }

    /// Record an edit at a specific time (for testing).
    ///
    /// Replaces any pending pair and restarts the quiet period.
    pub fn observe_at(&mut self, pair: LocationPair, now: Instant) {
        self.stats.observed += 1;
        self.pending = Some(pair);
        self.last_edit = Some(now);
    }

    /// Check whether the pending pair has settled.
    pub fn poll(&mut self) -> GateAction {
        self.poll_at(Instant::now())
    }

    /// Poll at a specific time (for testing).
    pub fn poll_at(&mut self, now: Instant) -> GateAction {
        let Some(last_edit) = self.last_edit else {
            return GateAction::None;
        };
        if duration_since_or_zero(now, last_edit) < self.config.quiet_period() {
            return GateAction::None;
        }
        let Some(pair) = self.take_pending() else {
            return GateAction::None;
        };

        match pair.validate() {
            Ok(()) => {
                self.stats.settled += 1;
                tracing::debug!(origin = %pair.origin, destination = %pair.destination, "location pair settled");
                GateAction::Settled(pair)
            }
            Err(reason) => {
                self.stats.suppressed += 1;
                tracing::debug!(%reason, "settled pair suppressed");
                GateAction::Suppressed { pair, reason }
            }
        }
    }

    /// Cancel the pending timer and hand back the pending pair, unvalidated.
    pub fn flush(&mut self) -> Option<LocationPair> {
        let pair = self.take_pending();
        if pair.is_some() {
            self.stats.flushed += 1;
        }
        pair
    }

    /// Drop any pending pair.
    pub fn cancel(&mut self) {
        self.take_pending();
    }

    /// Time until the pending pair settles.
    #[must_use]
    pub fn time_until_settle(&self, now: Instant) -> Option<Duration> {
        self.pending.as_ref()?;
        let last_edit = self.last_edit?;
        let elapsed = duration_since_or_zero(now, last_edit);
        Some(self.config.quiet_period().saturating_sub(elapsed))
    }

    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[inline]
    #[must_use]
    pub fn pending(&self) -> Option<&LocationPair> {
        self.pending.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.config.quiet_period()
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> GateStats {
        self.stats
    }

    fn take_pending(&mut self) -> Option<LocationPair> {
        self.last_edit = None;
        self.pending.take()
    }
}

#[inline]
fn duration_since_or_zero(now: Instant, earlier: Instant) -> Duration {
    now.checked_duration_since(earlier).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> DebounceGate {
        DebounceGate::new(DebounceConfig::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn nothing_pending_is_quiet() {
        let mut g = gate();
        assert_eq!(g.poll_at(Instant::now()), GateAction::None);
        assert_eq!(g.time_until_settle(Instant::now()), None);
    }

    #[test]
    fn settles_after_full_quiet_period() {
        let mut g = gate();
        let t0 = Instant::now();
        g.observe_at(LocationPair::new("A", "B"), t0);

        assert_eq!(g.poll_at(t0 + ms(1499)), GateAction::None);
        assert_eq!(
            g.poll_at(t0 + ms(1500)),
            GateAction::Settled(LocationPair::new("A", "B"))
        );
        assert!(!g.has_pending());
        assert_eq!(g.poll_at(t0 + ms(4000)), GateAction::None);
    }

    #[test]
    fn new_edit_restarts_timer() {
        let mut g = gate();
        let t0 = Instant::now();
        g.observe_at(LocationPair::new("A", "B"), t0);
        g.observe_at(LocationPair::new("A", "Bo"), t0 + ms(1000));

        assert_eq!(g.poll_at(t0 + ms(2000)), GateAction::None);
        assert_eq!(g.time_until_settle(t0 + ms(2000)), Some(ms(500)));
        assert_eq!(
            g.poll_at(t0 + ms(2500)),
            GateAction::Settled(LocationPair::new("A", "Bo"))
        );
    }

    #[test]
    fn self_trip_is_suppressed() {
        let mut g = gate();
        let t0 = Instant::now();
        g.observe_at(LocationPair::new("Delhi", "Delhi"), t0);
        match g.poll_at(t0 + ms(1500)) {
            GateAction::Suppressed { reason, .. } => {
                assert!(matches!(reason, InputError::SelfTrip { .. }));
            }
            other => panic!("expected suppression, got {other:?}"),
        }
        assert_eq!(g.stats().suppressed, 1);
    }

    #[test]
    fn blank_field_is_suppressed() {
        let mut g = gate();
        let t0 = Instant::now();
        g.observe_at(LocationPair::new("Delhi", "   "), t0);
        assert!(matches!(
            g.poll_at(t0 + ms(2000)),
            GateAction::Suppressed {
                reason: InputError::EmptyField { field: "destination" },
                ..
            }
        ));
    }

    #[test]
    fn flush_cancels_pending_emission() {
        let mut g = gate();
        let t0 = Instant::now();
        g.observe_at(LocationPair::new("A", "B"), t0);
        assert_eq!(g.flush(), Some(LocationPair::new("A", "B")));
        assert_eq!(g.poll_at(t0 + ms(5000)), GateAction::None);
        assert_eq!(g.stats().flushed, 1);
        assert_eq!(g.flush(), None);
    }

    #[test]
    fn clock_going_backwards_does_not_settle() {
        let mut g = gate();
        let t0 = Instant::now() + ms(10_000);
        g.observe_at(LocationPair::new("A", "B"), t0);
        assert_eq!(g.poll_at(t0 - ms(5_000)), GateAction::None);
        assert_eq!(g.time_until_settle(t0 - ms(5_000)), Some(ms(1500)));
    }

    #[test]
    fn custom_quiet_period() {
        let mut g = DebounceGate::new(DebounceConfig::default().with_quiet_period(ms(200)));
        let t0 = Instant::now();
        g.observe_at(LocationPair::new("A", "B"), t0);
        assert!(matches!(g.poll_at(t0 + ms(200)), GateAction::Settled(_)));
    }
}
