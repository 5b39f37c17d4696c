//! Campaign binary for gammasim.
//!
//! Loads a YAML configuration and a JSON input bundle, samples every
//! selected observation and writes one event file per observation plus
//! the observation index.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument
//!    (default `gammasim.yaml`)
//! 2. Validate it
//! 3. Initialize structured logging (tracing), honouring `RUST_LOG`
//! 4. Load the input bundle and select the configured observations
//! 5. Run the campaign
//! 6. Log the result

mod bundle;
mod campaign;
mod error;

use std::path::{Path, PathBuf};

use gammasim_core::config::{LoggingConfig, SimulationConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bundle::InputBundle;
use crate::error::EngineError;

const DEFAULT_CONFIG_PATH: &str = "gammasim.yaml";

/// Application entry point for the campaign runner.
///
/// # Errors
///
/// Returns an error if the configuration or bundle cannot be loaded, or
/// if any observation fails to sample or write.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Validate.
    config.validate().map_err(EngineError::from)?;

    // 3. Initialize structured logging.
    init_tracing(&config.logging);
    info!("gammasim-engine starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        object_name = config.sampling.object_name.as_deref().unwrap_or_default(),
        seed = config.sampling.seed,
        count_mode = ?config.sampling.count_mode,
        domain_policy = ?config.sampling.domain_policy,
        max_parallel = config.campaign.max_parallel,
        "Sampling settings"
    );

    // 4. Load inputs.
    let bundle = InputBundle::load(&config.campaign.bundle)?;
    info!(
        path = %config.campaign.bundle.display(),
        observations = bundle.observations.len(),
        "Input bundle loaded"
    );
    let observations = bundle.select(&config.campaign.observations)?;

    // 5. Run the campaign.
    let index = campaign::run_campaign(&config, observations).await?;

    // 6. Report.
    info!(
        observations = index.len(),
        total_events = index.total_events(),
        livetime = index.total_livetime(),
        "gammasim-engine finished"
    );
    Ok(())
}

/// Read the configuration file, falling back to defaults if it is absent.
///
/// The flag reports whether the file was found.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        let mut config = SimulationConfig::default();
        config.output.apply_env_overrides();
        Ok((config, false))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
