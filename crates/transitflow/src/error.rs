#![forbid(unsafe_code)]

//! Application error taxonomy.
//!
//! Each lower crate reports its own error type; [`TripError`] collects them
//! so the orchestrator can log every failure the same way and decide, in one
//! place, which ones the user gets to see.

use std::io;

use thiserror::Error;

use transitflow_client::{PlacesError, RoutingError, ServiceError};
use transitflow_core::{InputError, Trigger};
use transitflow_runtime::StorageError;

use crate::command::CommandError;

#[derive(Debug, Error)]
pub enum TripError {
    /// Degenerate query or out-of-range value; blocks triggering only.
    #[error(transparent)]
    Input(#[from] InputError),

    /// A typed line that is not a command.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Point prediction failed; the cycle's result is lost.
    #[error("prediction failed: {0}")]
    Prediction(#[source] ServiceError),

    /// Trend request failed or came back malformed.
    #[error("trend unavailable: {0}")]
    Trend(#[source] ServiceError),

    /// Route catalog could not be fetched.
    #[error("route catalog unavailable: {0}")]
    Catalog(#[source] ServiceError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Places(#[from] PlacesError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A service client could not be constructed.
    #[error("could not set up {what} client: {source}")]
    Setup {
        what: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("log filter {filter:?} rejected: {reason}")]
    Logging { filter: String, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TripError {
    /// Whether this failure reaches the user-visible error line.
    ///
    /// Only a point prediction that failed on a manually triggered cycle
    /// does; everything else is logged and otherwise absorbed.
    #[must_use]
    pub fn is_user_visible(&self, trigger: Trigger) -> bool {
        matches!(self, Self::Prediction(_)) && trigger == Trigger::Manual
    }

    /// Message to show when [`is_user_visible`](Self::is_user_visible).
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Prediction(e) | Self::Trend(e) | Self::Catalog(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}
