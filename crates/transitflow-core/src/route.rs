#![forbid(unsafe_code)]

//! Routing alternatives and nearby transit agencies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// One leg of a route. Durations are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub duration_seconds: u64,
    #[serde(default)]
    pub duration_in_traffic_seconds: Option<u64>,
}

impl RouteLeg {
    /// Traffic-aware duration when known, else the free-flow one.
    #[inline]
    #[must_use]
    pub fn effective_seconds(&self) -> u64 {
        self.duration_in_traffic_seconds
            .unwrap_or(self.duration_seconds)
    }
}

/// One candidate path from the routing provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAlternative {
    pub summary: String,
    pub legs: Vec<RouteLeg>,
}

impl RouteAlternative {
    #[inline]
    #[must_use]
    pub fn first_leg(&self) -> Option<&RouteLeg> {
        self.legs.first()
    }
}

/// An immutable routing response plus the user's selection.
///
/// Index 0 is the provider's default route. The list itself is shared and
/// never modified; a new response means a new `RouteSet`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteSet {
    routes: Arc<[RouteAlternative]>,
    selected: usize,
}

impl RouteSet {
    /// Wrap a fresh response; the selection starts at 0.
    #[must_use]
    pub fn new(routes: Vec<RouteAlternative>) -> Self {
        Self {
            routes: routes.into(),
            selected: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn routes(&self) -> &[RouteAlternative] {
        &self.routes
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// The selected alternative, if any routes are loaded.
    #[must_use]
    pub fn selected(&self) -> Option<&RouteAlternative> {
        self.routes.get(self.selected)
    }

    /// Move the selection; indices past the end are rejected.
    pub fn select(&mut self, index: usize) -> Result<(), InputError> {
        if index >= self.routes.len() {
            return Err(InputError::OutOfRange {
                field: "route index",
                value: index as f64,
                min: 0.0,
                max: self.routes.len().saturating_sub(1) as f64,
            });
        }
        self.selected = index;
        Ok(())
    }
}

/// WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A bus operator or station near the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitAgency {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    pub location: LatLng,
}
