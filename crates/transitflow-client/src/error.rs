#![forbid(unsafe_code)]

//! Client-side error types.

use thiserror::Error;

/// Failure talking to an HTTP service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Non-success status. `detail` is the service's own message, if any.
    #[error("{endpoint} returned status {status}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        detail: Option<String>,
    },
    #[error("could not decode {endpoint} response: {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },
}

impl ServiceError {
    /// Text suitable for showing to the user: the service's `detail` when it
    /// sent one, otherwise the error itself.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                detail: Some(detail),
                ..
            } => detail.clone(),
            other => other.to_string(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Rejected { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }
}

/// Directions lookup failed.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no maps API key configured")]
    Unconfigured,
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Provider answered with a status other than `OK`/`ZERO_RESULTS`.
    #[error("directions status {status}{}", message_suffix(.message))]
    Status {
        status: String,
        message: Option<String>,
    },
}

/// Place search failed.
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("no maps API key configured")]
    Unconfigured,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("places status {status}{}", message_suffix(.message))]
    Status {
        status: String,
        message: Option<String>,
    },
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}
