//! Configuration loading and typed config structures.
//!
//! A simulation is configured from a YAML document. Every section and every
//! field has a default, so an empty document is a valid configuration.
//!
//! ```yaml
//! world:
//!   name: "Two Levels"
//!   seed: 7
//!   tick_interval_ms: 100
//!   max_ticks: 500
//! time:
//!   step_duration: 0.5
//!   time_unit: seconds
//! perception:
//!   generator: local_threaded_bottom_up
//!   worker_threads: 4
//!   partition_policy: orthant
//! solver:
//!   conflict_policy: last_writer_wins
//!   keep_on_ground: true
//! logging:
//!   level: debug
//!   format: text
//! ```

use std::path::Path;

use serde::Deserialize;
use situated_types::TimeUnit;
use situated_world::{PartitionPolicy, TreeConfig};

use crate::perception::PerceptionGeneratorType;
use crate::pipeline::ConflictPolicy;

/// Environment variable overriding `perception.worker_threads`.
pub const WORKER_THREADS_ENV: &str = "SITUATED_WORKER_THREADS";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed, pacing).
    #[serde(default)]
    pub world: WorldConfig,

    /// Step duration and time unit.
    #[serde(default)]
    pub time: TimeConfig,

    /// Perception algorithm and spatial index settings.
    #[serde(default)]
    pub perception: PerceptionConfig,

    /// Influence solver settings.
    #[serde(default)]
    pub solver: SolverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `SITUATED_WORKER_THREADS` overrides `perception.worker_threads`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.perception.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time.step_duration.is_finite() || self.time.step_duration <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "time.step_duration",
                reason: format!("must be positive, got {}", self.time.step_duration),
            });
        }
        if self.perception.worker_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "perception.worker_threads",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.perception.max_entities_per_leaf == 0 {
            return Err(ConfigError::Invalid {
                field: "perception.max_entities_per_leaf",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable scenario name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducible scenarios.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds between ticks (0 = as fast as possible).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks (0 = run until interrupted).
    #[serde(default)]
    pub max_ticks: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: 0,
        }
    }
}

/// Time configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TimeConfig {
    /// Duration of one simulation step, in `time_unit`.
    #[serde(default = "default_step_duration")]
    pub step_duration: f64,

    /// Unit of `step_duration`.
    #[serde(default)]
    pub time_unit: TimeUnit,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            step_duration: default_step_duration(),
            time_unit: TimeUnit::Seconds,
        }
    }
}

/// Perception and spatial index configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PerceptionConfig {
    /// Perception algorithm variant used by every place.
    #[serde(default)]
    pub generator: PerceptionGeneratorType,

    /// Fixed size of the perception worker pool.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Leaf capacity of the spatial trees.
    #[serde(default = "default_max_entities_per_leaf")]
    pub max_entities_per_leaf: usize,

    /// Depth bound of the spatial trees.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// How tree leaves are split.
    #[serde(default)]
    pub partition_policy: PartitionPolicy,
}

impl PerceptionConfig {
    /// Apply `SITUATED_WORKER_THREADS` if it is set to a valid number.
    pub fn apply_env_overrides(&mut self) {
        if let Some(threads) = std::env::var(WORKER_THREADS_ENV)
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
        {
            self.worker_threads = threads;
        }
    }

    /// Tree parameters derived from this section.
    pub const fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            policy: self.partition_policy,
            max_entities_per_leaf: self.max_entities_per_leaf,
            max_depth: self.max_depth,
        }
    }
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            generator: PerceptionGeneratorType::default(),
            worker_threads: default_worker_threads(),
            max_entities_per_leaf: default_max_entities_per_leaf(),
            max_depth: default_max_depth(),
            partition_policy: PartitionPolicy::default(),
        }
    }
}

/// Influence solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SolverConfig {
    /// Resolution of multiple influences on one entity in one tick.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Whether 3D places snap bodies onto their ground.
    #[serde(default = "default_true")]
    pub keep_on_ground: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            keep_on_ground: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Situated".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_step_duration() -> f64 {
    1.0
}

const fn default_worker_threads() -> usize {
    4
}

const fn default_max_entities_per_leaf() -> usize {
    8
}

const fn default_max_depth() -> usize {
    16
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.time.step_duration, 1.0);
        assert_eq!(config.perception.worker_threads, 4);
        assert_eq!(config.solver.conflict_policy, ConflictPolicy::LastWriterWins);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  name: "Two Levels"
  seed: 7
  tick_interval_ms: 50
  max_ticks: 500

time:
  step_duration: 0.5
  time_unit: minutes

perception:
  generator: local_threaded_bottom_up
  worker_threads: 2
  max_entities_per_leaf: 4
  max_depth: 6
  partition_policy: orthant

solver:
  conflict_policy: reject_conflicts
  keep_on_ground: false

logging:
  level: debug
  format: json
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.name, "Two Levels");
        assert_eq!(config.world.max_ticks, 500);
        assert_eq!(config.time.time_unit, TimeUnit::Minutes);
        assert_eq!(
            config.perception.generator,
            PerceptionGeneratorType::LocalThreadedBottomUp
        );
        assert_eq!(config.perception.tree_config().policy, PartitionPolicy::OrthantSplit);
        assert_eq!(config.perception.tree_config().max_depth, 6);
        assert_eq!(config.solver.conflict_policy, ConflictPolicy::RejectConflicts);
        assert!(!config.solver.keep_on_ground);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn parse_partial_yaml_uses_defaults() {
        let config = SimulationConfig::parse("world:\n  seed: 9\n").unwrap();
        assert_eq!(config.world.seed, 9);
        assert_eq!(config.world.name, "Situated");
        assert_eq!(config.perception.max_entities_per_leaf, 8);
        assert!(config.solver.keep_on_ground);
    }

    #[test]
    fn empty_document_is_default() {
        let config = SimulationConfig::parse("").unwrap();
        assert_eq!(config.time, TimeConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let result = SimulationConfig::parse("time:\n  step_duration: 0.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { field: "time.step_duration", .. })));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let result = SimulationConfig::parse("world: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
