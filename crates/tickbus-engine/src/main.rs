//! Engine binary that drives a tickbus event bus on a fixed interval.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `tickbus-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the event bus from the `bus` section
//! 4. Install the demonstration scenario
//! 5. Run the tick loop until `max_ticks` or Ctrl-C
//! 6. Log the result

mod config;
mod error;
mod runner;
mod scenario;

use std::path::Path;

use tickbus_core::EventBus;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{EngineConfig, LoggingConfig};
use crate::error::EngineError;
use crate::scenario::Scenario;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "tickbus-config.yaml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so remember whether the
    //    defaults were used and report it once the subscriber exists.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        config_file = from_file,
        tick_interval_ms = config.engine.tick_interval_ms,
        max_ticks = config.engine.max_ticks,
        seed = config.engine.seed,
        "tickbus-engine starting"
    );

    // 3. Build the bus.
    let mut bus = EventBus::with_config(config.bus.clone());

    // 4. Install the scenario.
    let mut scenario = Scenario::install(&mut bus, config.engine.seed).map_err(EngineError::from)?;
    info!(events = bus.event_count(), "scenario listeners registered");

    // 5. Run.
    let result = runner::run(&mut bus, &mut scenario, &config.engine, shutdown_signal()).await;

    // 6. Log results.
    let stats = scenario.stats();
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        heartbeats = stats.heartbeats,
        countdown_finished = stats.countdown_finished,
        waves = stats.waves,
        gusts = stats.gusts,
        "tickbus-engine shutdown complete"
    );

    Ok(())
}

/// Load `tickbus-config.yaml` if present, defaults otherwise.
///
/// Returns the configuration and whether it came from the file.
fn load_config() -> Result<(EngineConfig, bool), EngineError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        return Ok((EngineConfig::from_file(path)?, true));
    }

    let mut config = EngineConfig::default();
    config.apply_max_ticks_override(std::env::var(config::MAX_TICKS_ENV).ok().as_deref())?;
    config.validate()?;
    Ok((config, false))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| EngineError::LogFilter {
            directive: logging.level.clone(),
            message: e.to_string(),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed the engine keeps
/// running until `max_ticks`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, relying on max_ticks");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
