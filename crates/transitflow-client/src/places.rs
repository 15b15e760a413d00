#![forbid(unsafe_code)]

//! Bus operators near the origin, via Google Places text search.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use transitflow_core::{LatLng, TransitAgency};

use crate::error::{PlacesError, ServiceError};
use crate::{http_client, join_url};

/// Results kept from each of the public and private searches.
pub const AGENCIES_PER_KIND: usize = 5;

/// Free-text place search.
pub trait PlacesProvider: Send + Sync {
    fn text_search(&self, query: &str) -> Result<Vec<TransitAgency>, PlacesError>;
}

/// `(public, private)` search queries for an origin.
#[must_use]
pub fn agency_queries(origin: &str) -> (String, String) {
    let origin = origin.trim();
    (
        format!("RTC bus station in {origin}"),
        format!("bus travels in {origin}"),
    )
}

/// Public operators first, then private, at most
/// [`AGENCIES_PER_KIND`] of each. A failed search contributes nothing.
pub fn nearby_agencies(provider: &dyn PlacesProvider, origin: &str) -> Vec<TransitAgency> {
    let (public_query, private_query) = agency_queries(origin);
    let search = |query: &str| -> Vec<TransitAgency> {
        match provider.text_search(query) {
            Ok(found) => found.into_iter().take(AGENCIES_PER_KIND).collect(),
            Err(e) => {
                warn!(query, error = %e, "place search failed");
                Vec::new()
            }
        }
    };
    let mut agencies = search(&public_query);
    agencies.extend(search(&private_query));
    debug!(origin, count = agencies.len(), "nearby agencies resolved");
    agencies
}

#[derive(Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<WirePlace>,
}

#[derive(Deserialize)]
struct WirePlace {
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    geometry: WireGeometry,
}

#[derive(Deserialize)]
struct WireGeometry {
    location: LatLng,
}

impl From<WirePlace> for TransitAgency {
    fn from(place: WirePlace) -> Self {
        Self {
            name: place.name,
            address: place.formatted_address,
            rating: place.rating,
            location: place.geometry.location,
        }
    }
}

/// Places text search client.
#[derive(Debug, Clone)]
pub struct GooglePlaces {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GooglePlaces {
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
}

impl PlacesProvider for GooglePlaces {
    fn text_search(&self, query: &str) -> Result<Vec<TransitAgency>, PlacesError> {
        const ENDPOINT: &str = "places";
        let Some(key) = &self.api_key else {
            return Err(PlacesError::Unconfigured);
        };

        let url = join_url(&self.base_url, "maps/api/place/textsearch/json");
        let response = self
            .http
            .get(url)
            .query(&[("query", query), ("key", key.as_str())])
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
        let body: TextSearchResponse = response.json().map_err(|e| ServiceError::Decode {
            endpoint: ENDPOINT,
            reason: e.to_string(),
        })?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body.results.into_iter().map(TransitAgency::from).collect()),
            _ => Err(PlacesError::Status {
                status: body.status,
                message: body.error_message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct CannedPlaces(HashMap<String, Result<Vec<&'static str>, ()>>);

    impl PlacesProvider for CannedPlaces {
        fn text_search(&self, query: &str) -> Result<Vec<TransitAgency>, PlacesError> {
            match self.0.get(query) {
                Some(Ok(names)) => Ok(names
                    .iter()
                    .map(|n| TransitAgency {
                        name: (*n).to_string(),
                        address: None,
                        rating: None,
                        location: LatLng::default(),
                    })
                    .collect()),
                Some(Err(())) => Err(PlacesError::Status {
                    status: "UNKNOWN_ERROR".into(),
                    message: None,
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    fn names(agencies: &[TransitAgency]) -> Vec<&str> {
        agencies.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn queries_follow_origin() {
        let (public, private) = agency_queries("  Kukatpally ");
        assert_eq!(public, "RTC bus station in Kukatpally");
        assert_eq!(private, "bus travels in Kukatpally");
    }

    #[test]
    fn public_first_and_capped() {
        let mut canned = HashMap::new();
        canned.insert(
            "RTC bus station in Ameerpet".to_string(),
            Ok(vec!["p1", "p2", "p3", "p4", "p5", "p6"]),
        );
        canned.insert("bus travels in Ameerpet".to_string(), Ok(vec!["x1", "x2"]));
        let agencies = nearby_agencies(&CannedPlaces(canned), "Ameerpet");
        assert_eq!(
            names(&agencies),
            vec!["p1", "p2", "p3", "p4", "p5", "x1", "x2"]
        );
    }

    #[test]
    fn failed_search_contributes_nothing() {
        let mut canned = HashMap::new();
        canned.insert("RTC bus station in Ameerpet".to_string(), Err(()));
        canned.insert("bus travels in Ameerpet".to_string(), Ok(vec!["x1"]));
        let agencies = nearby_agencies(&CannedPlaces(canned), "Ameerpet");
        assert_eq!(names(&agencies), vec!["x1"]);
    }

    #[test]
    fn wire_place_maps_fields() {
        let body: TextSearchResponse = serde_json::from_str(
            r#"{"status":"OK","results":[{
                "name":"MGBS",
                "formatted_address":"Gowliguda, Hyderabad",
                "rating":4.1,
                "geometry":{"location":{"lat":17.378,"lng":78.486}}
            }]}"#,
        )
        .unwrap();
        let agency = TransitAgency::from(body.results.into_iter().next().unwrap());
        assert_eq!(agency.name, "MGBS");
        assert_eq!(agency.rating, Some(4.1));
        assert_eq!(agency.location.lat, 17.378);
    }
}
