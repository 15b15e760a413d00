#![forbid(unsafe_code)]

//! TransitFlow binary entry point.

use std::io;

use transitflow::{Opts, Services, TripError, TripModel, init_logging};
use transitflow_client::{GoogleDirections, GooglePlaces, PredictionClient, ServiceError};
use transitflow_runtime::{
    LineEventSource, PersistenceConfig, Program, ProgramConfig, StateRegistry,
};

fn main() {
    let opts = Opts::parse();

    if let Err(e) = init_logging(&opts.log_filter, opts.log_format) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(&opts) {
        tracing::error!(error = %e, "transitflow stopped");
        eprintln!("Runtime error: {e}");
        std::process::exit(1);
    }
}

fn run(opts: &Opts) -> Result<(), TripError> {
    let timeout = opts.request_timeout();
    let services = Services::new(
        PredictionClient::new(&opts.service_url, timeout).map_err(setup("prediction"))?,
        GoogleDirections::new(&opts.maps_base_url, opts.maps_api_key.clone(), timeout)
            .map_err(setup("directions"))?,
        GooglePlaces::new(&opts.maps_base_url, opts.maps_api_key.clone(), timeout)
            .map_err(setup("places"))?,
    );

    let registry = opts.history_path().map(|path| {
        tracing::info!(path = %path.display(), "history file");
        StateRegistry::with_file(path).shared()
    });
    let persistence = match &registry {
        Some(registry) => PersistenceConfig::with_registry(registry.clone()),
        None => PersistenceConfig::disabled(),
    };

    let model = TripModel::new(opts.app_config(), services, registry);
    let config = ProgramConfig::default()
        .with_frame_width(opts.width)
        .with_persistence(persistence);
    let mut program = Program::new(model, LineEventSource::stdin(), io::stdout(), config);
    program.run()?;
    Ok(())
}

fn setup(what: &'static str) -> impl FnOnce(ServiceError) -> TripError {
    move |source| TripError::Setup { what, source }
}
