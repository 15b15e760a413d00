#![forbid(unsafe_code)]

//! Tracing subscriber setup.
//!
//! Logs go to stderr; stdout carries the rendered frame.

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::TripError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Install the global subscriber.
///
/// `filter` uses `EnvFilter` directive syntax, e.g. `info` or
/// `transitflow=debug,transitflow_client=trace`.
pub fn init_logging(filter: &str, format: LogFormat) -> Result<(), TripError> {
    let env_filter = EnvFilter::try_new(filter).map_err(|e| TripError::Logging {
        filter: filter.to_string(),
        reason: e.to_string(),
    })?;
    let installed = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| TripError::Logging {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}
