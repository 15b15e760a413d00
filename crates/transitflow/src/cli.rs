#![forbid(unsafe_code)]

//! Command-line options.
//!
//! Every option can also come from a `TRANSITFLOW_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use transitflow_client::GOOGLE_MAPS_BASE_URL;
use transitflow_runtime::FileStorage;

use crate::app::AppConfig;
use crate::logging::LogFormat;

/// Directory name under the user state dir.
pub const APP_NAME: &str = "transitflow";

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Trip delay estimator", long_about = None)]
pub struct Opts {
    /// Base URL of the delay model service.
    #[arg(long, env = "TRANSITFLOW_SERVICE_URL", default_value = "http://127.0.0.1:8000")]
    pub service_url: String,

    /// Google Maps key for directions and place search.
    #[arg(long, env = "TRANSITFLOW_MAPS_API_KEY", hide_env_values = true)]
    pub maps_api_key: Option<String>,

    #[arg(long, env = "TRANSITFLOW_MAPS_BASE_URL", default_value = GOOGLE_MAPS_BASE_URL)]
    pub maps_base_url: String,

    /// Quiet period before a location edit triggers a prediction.
    #[arg(long, env = "TRANSITFLOW_DEBOUNCE_MS", default_value_t = 1500)]
    pub debounce_ms: u64,

    #[arg(long, env = "TRANSITFLOW_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// History file; defaults to the user state directory.
    #[arg(long, env = "TRANSITFLOW_HISTORY_FILE")]
    pub history_file: Option<PathBuf>,

    /// Keep recent searches in memory only.
    #[arg(long, conflicts_with = "history_file")]
    pub no_history: bool,

    #[arg(long, env = "TRANSITFLOW_LOG", default_value = "info")]
    pub log_filter: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Frame width in columns.
    #[arg(long, default_value_t = 80)]
    pub width: usize,
}

impl Opts {
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    #[must_use]
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            ..AppConfig::default()
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Where history is persisted, `None` with `--no-history`.
    #[must_use]
    pub fn history_path(&self) -> Option<PathBuf> {
        if self.no_history {
            return None;
        }
        Some(match &self.history_file {
            Some(path) => path.clone(),
            None => FileStorage::default_for_app(APP_NAME).path().to_path_buf(),
        })
    }
}
