#![forbid(unsafe_code)]

//! TransitFlow trip-delay estimator.
//!
//! [`TripModel`] is the orchestrator: it owns the live trip parameters, the
//! debounce gate and the prediction cycle, starts the service requests as
//! background tasks, and keeps only the answers that still match the input.
//! The binary wires it to stdin/stdout through the runtime's [`Program`].
//!
//! [`Program`]: transitflow_runtime::Program

pub mod app;
pub mod cli;
pub mod command;
pub mod error;
pub mod logging;
pub mod view;

pub use app::{AppConfig, Msg, Services, TripModel};
pub use cli::Opts;
pub use command::{Command, CommandError};
pub use error::TripError;
pub use logging::{LogFormat, init_logging};
