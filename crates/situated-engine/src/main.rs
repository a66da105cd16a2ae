//! Demo engine for the situated environment.
//!
//! Loads a YAML configuration, builds a world of two stacked levels joined
//! by a staircase portal, and steps it with wandering walkers until
//! `world.max_ticks` is reached or Ctrl-C is pressed.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (first argument, or `situated-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the demo scenario from the configured seed
//! 4. Activate the environment with its listeners
//! 5. Run the tick loop
//! 6. End the environment and log the result

mod error;
mod scenario;
mod telemetry;
mod walkers;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use situated_core::config::{LogFormat, LoggingConfig, WorldConfig};
use situated_core::{Environment, SimulationConfig, SimulationListener};
use situated_types::Dim3;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::scenario::ScenarioConfig;
use crate::telemetry::TracingListener;
use crate::walkers::{Roster, Walkers};

/// Configuration file used when no path is given.
const DEFAULT_CONFIG_PATH: &str = "situated-config.yaml";

/// Ticks between two info-level summaries.
const SUMMARY_EVERY: u64 = 50;

/// Why the tick loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    /// `world.max_ticks` was reached.
    MaxTicksReached,
    /// Ctrl-C was pressed.
    Interrupted,
}

/// Application entry point.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = load_config(&config_path)?;
    init_logging(&config.logging);
    info!(
        path = %config_path.display(),
        world_name = config.world.name,
        seed = config.world.seed,
        tick_interval_ms = config.world.tick_interval_ms,
        max_ticks = config.world.max_ticks,
        generator = ?config.perception.generator,
        "configuration loaded"
    );

    let scenario_config = load_scenario_config(&config_path)?;
    let mut rng = StdRng::seed_from_u64(config.world.seed);
    let scenario = scenario::build(&config, &scenario_config, &mut rng)?;

    let mut env: Environment<Dim3> = Environment::from_config(&config)?;
    let roster = Arc::new(Roster::default());
    for (body, place) in &scenario.placements {
        roster.place(*body, *place)?;
    }
    env.add_listener(Arc::new(TracingListener::new(SUMMARY_EVERY)));
    env.add_listener(Arc::clone(&roster) as Arc<dyn SimulationListener>);
    env.activate(scenario.world)?;

    let mut walkers = Walkers::new(
        scenario.walkers,
        Arc::clone(&roster),
        rng,
        scenario_config.perception_radius,
        scenario_config.walker_speed,
        env.clock().step_seconds(),
    );
    info!(
        run_id = %env.run_id(),
        places = env.place_ids().len(),
        walkers = walkers.len(),
        "entering tick loop"
    );

    let reason = run(&mut env, &mut walkers, &config.world).await?;
    let tick = env.clock().tick();
    env.end()?;

    info!(?reason, tick, "situated-engine shutdown complete");
    Ok(())
}

/// Step the environment until the tick limit or Ctrl-C.
async fn run(
    env: &mut Environment<Dim3>,
    walkers: &mut Walkers,
    world: &WorldConfig,
) -> Result<EndReason, EngineError> {
    let mut interval = (world.tick_interval_ms > 0).then(|| {
        let mut interval = tokio::time::interval(Duration::from_millis(world.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal?;
                info!(tick = env.clock().tick(), "interrupted");
                return Ok(EndReason::Interrupted);
            }
            () = pace(interval.as_mut()) => {}
        }

        walkers.act(env)?;
        let report = env.step()?;
        if world.max_ticks > 0 && report.tick >= world.max_ticks {
            info!(tick = report.tick, max_ticks = world.max_ticks, "tick limit reached");
            return Ok(EndReason::MaxTicksReached);
        }
    }
}

/// Wait for the next tick slot, or just yield when running unpaced.
async fn pace(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match logging.format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

/// Load the simulation configuration, falling back to defaults when the
/// file does not exist.
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        Ok(SimulationConfig::from_file(path)?)
    } else {
        Ok(SimulationConfig::parse("")?)
    }
}

/// Load the `scenario` section of the configuration file.
///
/// Missing file or missing section yields defaults.
fn load_scenario_config(path: &Path) -> Result<ScenarioConfig, EngineError> {
    if !path.exists() {
        return Ok(ScenarioConfig::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let raw: serde_yml::Value = serde_yml::from_str(&contents).map_err(|e| EngineError::ScenarioConfig {
        message: format!("failed to parse config YAML: {e}"),
    })?;
    match raw.get("scenario") {
        Some(section) => serde_yml::from_value(section.clone()).map_err(|e| EngineError::ScenarioConfig {
            message: format!("failed to parse scenario section: {e}"),
        }),
        None => Ok(ScenarioConfig::default()),
    }
}
