#![forbid(unsafe_code)]

//! Delay model service.
//!
//! | Endpoint | Body | Response |
//! |---|---|---|
//! | `GET /routes` | - | `{ "routes": [..] }` |
//! | `POST /predict-trip` | [`PredictionRequest`] | `{ predicted_extra_delay, total_estimated_arrival, severity?, google_maps_base_time? }` |
//! | `POST /predict-trend` | [`PredictionRequest`] | `{ "trend": [{ hour, delay }] }` |
//!
//! Non-2xx responses carry `{ "detail": "..." }`.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use transitflow_core::{
    EventType, PredictionResult, Severity, Trend, TrendPoint, TripParameters, WeatherCondition,
};

use crate::error::ServiceError;
use crate::{http_client, join_url};

/// The delay model.
pub trait PredictionService: Send + Sync {
    /// Catalog of known route ids.
    fn routes(&self) -> Result<Vec<String>, ServiceError>;

    /// Point estimate for one trip.
    fn predict(&self, params: &TripParameters) -> Result<PredictionResult, ServiceError>;

    /// Delay for each hour of the day under the same scenario.
    fn predict_trend(&self, params: &TripParameters) -> Result<Trend, ServiceError>;
}

/// Request body shared by `/predict-trip` and `/predict-trend`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest<'a> {
    pub origin: &'a str,
    pub destination: &'a str,
    /// Empty when no route is chosen.
    #[serde(rename = "Route_ID")]
    pub route_id: &'a str,
    #[serde(rename = "Weather_Condition")]
    pub weather_condition: WeatherCondition,
    #[serde(rename = "Event_Type")]
    pub event_type: EventType,
    #[serde(rename = "Hour")]
    pub hour: u8,
    #[serde(rename = "Day_OfWeek")]
    pub day_of_week: u8,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Precipitation")]
    pub precipitation: f64,
    #[serde(rename = "Event_Attendance")]
    pub event_attendance: u32,
}

impl<'a> From<&'a TripParameters> for PredictionRequest<'a> {
    fn from(p: &'a TripParameters) -> Self {
        Self {
            origin: &p.origin,
            destination: &p.destination,
            route_id: p.route_id.as_deref().unwrap_or(""),
            weather_condition: p.weather_condition,
            event_type: p.event_type,
            hour: p.hour,
            day_of_week: p.day_of_week,
            temperature: p.temperature,
            precipitation: p.precipitation,
            event_attendance: p.event_attendance,
        }
    }
}

#[derive(Deserialize)]
struct RoutesResponse {
    routes: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct PredictResponse {
    predicted_extra_delay: f64,
    total_estimated_arrival: f64,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    google_maps_base_time: Option<f64>,
}

#[derive(Deserialize)]
struct TrendResponse {
    trend: Vec<TrendPoint>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Blocking HTTP client for the delay model service.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: Client,
    base_url: String,
}

impl PredictionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let _span = debug_span!("transitflow.client.request", endpoint).entered();
        let response = request
            .send()
            .map_err(|source| ServiceError::Transport { endpoint, source })?;
        let status = response.status();
        let body = response
            .bytes()
            .map_err(|source| ServiceError::Transport { endpoint, source })?;
        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(ServiceError::Rejected {
                endpoint,
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }
        serde_json::from_slice(&body).map_err(|e| ServiceError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }
}

/// `detail` from an error body; non-string details are rendered as JSON.
fn extract_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl PredictionService for PredictionClient {
    fn routes(&self) -> Result<Vec<String>, ServiceError> {
        let url = join_url(&self.base_url, "routes");
        let body: RoutesResponse = self.send("routes", self.http.get(url))?;
        Ok(body
            .routes
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }

    fn predict(&self, params: &TripParameters) -> Result<PredictionResult, ServiceError> {
        let url = join_url(&self.base_url, "predict-trip");
        let request = self
            .http
            .post(url)
            .json(&PredictionRequest::from(params));
        let body: PredictResponse = self.send("predict-trip", request)?;

        let severity = body.severity.as_deref().and_then(|s| {
            s.parse::<Severity>()
                .map_err(|e| debug!(error = %e, "ignoring service severity"))
                .ok()
        });
        Ok(PredictionResult::new(
            body.predicted_extra_delay,
            body.total_estimated_arrival,
            severity,
            body.google_maps_base_time,
        ))
    }

    fn predict_trend(&self, params: &TripParameters) -> Result<Trend, ServiceError> {
        let url = join_url(&self.base_url, "predict-trend");
        let request = self
            .http
            .post(url)
            .json(&PredictionRequest::from(params));
        let body: TrendResponse = self.send("predict-trend", request)?;
        Trend::try_from_points(body.trend).map_err(|e| ServiceError::Decode {
            endpoint: "predict-trend",
            reason: e.to_string(),
        })
    }
}
