//! Telemetry listener logging the environment lifecycle through `tracing`.

use situated_core::{EnvironmentTickReport, SimulationListener};
use situated_types::{ClockSnapshot, EntityId, PlaceId};
use tracing::{debug, info};

/// Logs every tick at debug level and a summary every `summary_every`
/// ticks at info level.
#[derive(Debug, Clone, Copy)]
pub struct TracingListener {
    summary_every: u64,
}

impl TracingListener {
    /// A listener summarizing every `summary_every` ticks (0 disables
    /// summaries).
    pub const fn new(summary_every: u64) -> Self {
        Self { summary_every }
    }

    fn summarizes(&self, tick: u64) -> bool {
        tick.checked_rem(self.summary_every) == Some(0)
    }
}

impl SimulationListener for TracingListener {
    fn on_tick_started(&self, clock: &ClockSnapshot) {
        info!(tick = clock.tick, time = clock.simulation_time, "simulation running");
    }

    fn on_tick_stepped(&self, clock: &ClockSnapshot, report: &EnvironmentTickReport) {
        let rollbacks: usize = report.places.iter().map(|place| place.rollbacks).sum();
        let discarded: usize = report
            .places
            .iter()
            .map(|place| place.discarded_influences)
            .sum();
        debug!(
            tick = clock.tick,
            actions = report.actions_applied(),
            transfers = report.transfers,
            rollbacks,
            discarded,
            "tick stepped"
        );
        if self.summarizes(clock.tick) {
            info!(
                tick = clock.tick,
                time = clock.simulation_time,
                unit = ?clock.time_unit,
                actions = report.actions_applied(),
                transfers = report.transfers,
                "tick summary"
            );
        }
    }

    fn on_tick_paused(&self, clock: &ClockSnapshot) {
        info!(tick = clock.tick, "simulation paused");
    }

    fn on_tick_stopped(&self, clock: &ClockSnapshot) {
        info!(tick = clock.tick, time = clock.simulation_time, "simulation stopped");
    }

    fn on_entities_arrived(&self, place: PlaceId, entities: &[EntityId]) {
        debug!(%place, count = entities.len(), "entities arrived");
    }

    fn on_entities_disappeared(&self, place: PlaceId, entities: &[EntityId]) {
        debug!(%place, count = entities.len(), "entities left");
    }

    fn on_tick_idle(&self, clock: &ClockSnapshot) {
        debug!(tick = clock.tick, "idle tick");
    }
}
