#![forbid(unsafe_code)]

//! TransitFlow service clients.
//!
//! Each external collaborator is a trait so the application can run against
//! fakes in tests:
//!
//! - [`PredictionService`] - delay model (`/routes`, `/predict-trip`,
//!   `/predict-trend`), implemented over HTTP by [`PredictionClient`]
//! - [`DirectionsProvider`] - route alternatives, implemented by
//!   [`GoogleDirections`]
//! - [`PlacesProvider`] - text place search, implemented by [`GooglePlaces`]
//!
//! All adapters are blocking; the runtime calls them from background task
//! threads.

pub mod directions;
pub mod error;
pub mod places;
pub mod prediction;

pub use directions::{DirectionsProvider, GoogleDirections};
pub use error::{PlacesError, RoutingError, ServiceError};
pub use places::{
    AGENCIES_PER_KIND, GooglePlaces, PlacesProvider, agency_queries, nearby_agencies,
};
pub use prediction::{PredictionClient, PredictionRequest, PredictionService};

/// Default Google Maps web service base URL.
pub const GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com";

pub(crate) fn http_client(
    timeout: std::time::Duration,
) -> Result<reqwest::blocking::Client, ServiceError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| ServiceError::Transport {
            endpoint: "client",
            source,
        })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
