//! The shared simulation clock.
//!
//! One [`SimulationClock`] is shared (through an `Arc`) by every place of an
//! environment. The pipeline never owns time: at the end of each tick a
//! place pushes the clock forward to its own local tick count, and the
//! clock keeps the maximum it has seen. Places stepped in lockstep therefore
//! advance the shared tick exactly once per environment step.
//!
//! Step duration and time unit are fixed at construction.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use situated_types::{ClockSnapshot, TimeUnit};

use crate::config::TimeConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid time configuration (e.g. a zero step duration).
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Tick counter plus the fixed duration of one step.
#[derive(Debug)]
pub struct SimulationClock {
    /// Number of completed steps.
    tick: AtomicU64,

    /// Duration of one step, in `time_unit`.
    step_duration: f64,

    /// Unit of `step_duration`.
    time_unit: TimeUnit,
}

impl SimulationClock {
    /// Create a clock at tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `step_duration` is not a
    /// positive finite number.
    pub fn new(step_duration: f64, time_unit: TimeUnit) -> Result<Self, ClockError> {
        if !step_duration.is_finite() || step_duration <= 0.0 {
            return Err(ClockError::InvalidConfig {
                reason: format!("step_duration must be positive and finite, got {step_duration}"),
            });
        }
        Ok(Self {
            tick: AtomicU64::new(0),
            step_duration,
            time_unit,
        })
    }

    /// Create a clock from the time section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the configuration is invalid.
    pub fn from_config(config: &TimeConfig) -> Result<Self, ClockError> {
        Self::new(config.step_duration, config.time_unit)
    }

    /// Return the current tick number.
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Duration of one step, in [`Self::time_unit`].
    pub const fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// Unit of the step duration.
    pub const fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    /// Duration of one step in seconds.
    pub fn step_seconds(&self) -> f64 {
        self.time_unit.to_seconds(self.step_duration)
    }

    /// Elapsed simulation time, in [`Self::time_unit`].
    #[allow(clippy::cast_precision_loss)]
    pub fn simulation_time(&self) -> f64 {
        self.tick() as f64 * self.step_duration
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&self) -> Result<u64, ClockError> {
        self.tick
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| t.checked_add(1))
            .map_err(|_current| ClockError::TickOverflow)
            .and_then(|previous| previous.checked_add(1).ok_or(ClockError::TickOverflow))
    }

    /// Move the clock forward to `tick` if it is behind. Returns the
    /// resulting tick.
    pub fn advance_to(&self, tick: u64) -> u64 {
        self.tick.fetch_max(tick, Ordering::AcqRel).max(tick)
    }

    /// Immutable view of the clock for listeners.
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            tick: self.tick(),
            step_duration: self.step_duration,
            time_unit: self.time_unit,
            simulation_time: self.simulation_time(),
            captured_at: Utc::now(),
        }
    }
}
