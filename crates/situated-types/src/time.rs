//! Time units and clock snapshots.
//!
//! The simulation clock itself lives in `situated-core`; this module only
//! holds the plain data that crosses crate boundaries: the unit in which a
//! step duration is expressed, and the immutable [`ClockSnapshot`] handed
//! to listeners at every tick boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit in which simulation durations and rates are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Thousandths of a second.
    Milliseconds,
    /// Seconds (the internal unit for all rates).
    #[default]
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
}

impl TimeUnit {
    /// Length of one unit in seconds.
    pub const fn seconds(self) -> f64 {
        match self {
            Self::Milliseconds => 0.001,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
        }
    }

    /// Convert a duration expressed in this unit into seconds.
    pub fn to_seconds(self, value: f64) -> f64 {
        value * self.seconds()
    }

    /// Convert a per-second rate into a per-unit rate.
    pub fn per_unit(self, per_second: f64) -> f64 {
        per_second * self.seconds()
    }
}

/// Immutable view of the simulation clock at a tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    /// Number of completed simulation steps.
    pub tick: u64,
    /// Duration of one step, in `time_unit`.
    pub step_duration: f64,
    /// Unit of `step_duration` and `simulation_time`.
    pub time_unit: TimeUnit,
    /// Elapsed simulation time (`tick * step_duration`), in `time_unit`.
    pub simulation_time: f64,
    /// Wall-clock instant at which the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl ClockSnapshot {
    /// Step duration converted to seconds.
    pub fn step_seconds(&self) -> f64 {
        self.time_unit.to_seconds(self.step_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_conversions() {
        assert!((TimeUnit::Minutes.to_seconds(2.0) - 120.0).abs() < f64::EPSILON);
        assert!((TimeUnit::Milliseconds.to_seconds(500.0) - 0.5).abs() < f64::EPSILON);
        // 2 m/s is 7200 m/h.
        assert!((TimeUnit::Hours.per_unit(2.0) - 7200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn time_unit_serde_is_snake_case() {
        let json = serde_json::to_string(&TimeUnit::Milliseconds).unwrap_or_default();
        assert_eq!(json, "\"milliseconds\"");
    }
}
