#![forbid(unsafe_code)]

//! Request generations.
//!
//! Every trigger advances a [`RequestGeneration`] and tags the requests it
//! issues with the new [`Generation`]. When a response comes back, only the
//! one whose tag still equals the current generation may touch state.

use std::fmt;

/// Tag carried by an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Monotonic counter; never decrements, never reuses a value.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    current: Generation,
}

impl RequestGeneration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation and return its tag.
    pub fn advance(&mut self) -> Generation {
        self.current = Generation(self.current.0 + 1);
        self.current
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> Generation {
        self.current
    }

    /// Whether `tag` is still the live generation.
    #[inline]
    #[must_use]
    pub fn is_current(&self, tag: Generation) -> bool {
        tag == self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_and_advances() {
        let mut counter = RequestGeneration::new();
        assert_eq!(counter.current().get(), 0);
        let g1 = counter.advance();
        let g2 = counter.advance();
        assert!(g2 > g1);
        assert_eq!(g2.get(), 2);
    }

    #[test]
    fn only_latest_is_current() {
        let mut counter = RequestGeneration::new();
        let g1 = counter.advance();
        assert!(counter.is_current(g1));
        let g2 = counter.advance();
        assert!(!counter.is_current(g1));
        assert!(counter.is_current(g2));
    }

    #[test]
    fn display_is_tagged() {
        let mut counter = RequestGeneration::new();
        assert_eq!(counter.advance().to_string(), "g1");
    }
}
