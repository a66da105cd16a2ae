//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and of the tick
//! loop so `main` can propagate with `?`.

use situated_core::{ConfigError, EnvironmentError, PlaceError, PortalError};

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The `scenario` section of the config is malformed.
    #[error("scenario config error: {message}")]
    ScenarioConfig {
        /// Description of the problem.
        message: String,
    },

    /// The demo world could not be assembled.
    #[error("scenario error: {source}")]
    Scenario {
        /// The underlying portal error.
        #[from]
        source: PortalError,
    },

    /// The environment refused an operation.
    #[error("environment error: {source}")]
    Environment {
        /// The underlying environment error.
        #[from]
        source: EnvironmentError,
    },

    /// A place refused an operation.
    #[error("place error: {source}")]
    Place {
        /// The underlying place error.
        #[from]
        source: PlaceError,
    },

    /// The walker roster lock was poisoned.
    #[error("walker roster lock poisoned")]
    RosterPoisoned,

    /// Reading the config file or waiting for the shutdown signal failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
