#![forbid(unsafe_code)]

//! Route alternatives from the Google Directions web service.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, debug_span};

use transitflow_core::{LocationPair, RouteAlternative, RouteLeg};

use crate::error::{RoutingError, ServiceError};
use crate::{http_client, join_url};

/// Source of route alternatives for a settled origin/destination pair.
pub trait DirectionsProvider: Send + Sync {
    /// Ordered alternatives, index 0 being the provider's default.
    ///
    /// No route between the places is an empty list, not an error.
    fn directions(&self, pair: &LocationPair) -> Result<Vec<RouteAlternative>, RoutingError>;
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<WireRoute>,
}

#[derive(Deserialize)]
struct WireRoute {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    legs: Vec<WireLeg>,
}

#[derive(Deserialize)]
struct WireLeg {
    duration: WireValue,
    #[serde(default)]
    duration_in_traffic: Option<WireValue>,
}

#[derive(Deserialize)]
struct WireValue {
    value: u64,
}

impl From<WireRoute> for RouteAlternative {
    fn from(route: WireRoute) -> Self {
        Self {
            summary: route.summary,
            legs: route
                .legs
                .into_iter()
                .map(|leg| RouteLeg {
                    duration_seconds: leg.duration.value,
                    duration_in_traffic_seconds: leg.duration_in_traffic.map(|d| d.value),
                })
                .collect(),
        }
    }
}

/// Driving directions with live traffic, departing now, alternatives on.
#[derive(Debug, Clone)]
pub struct GoogleDirections {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleDirections {
    /// Without an API key every lookup fails with
    /// [`RoutingError::Unconfigured`].
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl DirectionsProvider for GoogleDirections {
    fn directions(&self, pair: &LocationPair) -> Result<Vec<RouteAlternative>, RoutingError> {
        const ENDPOINT: &str = "directions";
        let Some(key) = &self.api_key else {
            return Err(RoutingError::Unconfigured);
        };
        let _span = debug_span!("transitflow.client.directions").entered();

        let url = join_url(&self.base_url, "maps/api/directions/json");
        let response = self
            .http
            .get(url)
            .query(&[
                ("origin", pair.origin.as_str()),
                ("destination", pair.destination.as_str()),
                ("mode", "driving"),
                ("departure_time", "now"),
                ("alternatives", "true"),
                ("key", key.as_str()),
            ])
            .send()
            .map_err(|source| ServiceError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Rejected {
                endpoint: ENDPOINT,
                status: status.as_u16(),
                detail: None,
            }
            .into());
        }
        let body: DirectionsResponse = response.json().map_err(|e| ServiceError::Decode {
            endpoint: ENDPOINT,
            reason: e.to_string(),
        })?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => {
                let routes: Vec<RouteAlternative> =
                    body.routes.into_iter().map(RouteAlternative::from).collect();
                debug!(count = routes.len(), "directions received");
                Ok(routes)
            }
            _ => Err(RoutingError::Status {
                status: body.status,
                message: body.error_message,
            }),
        }
    }
}
