//! Simulation lifecycle listeners.

use situated_types::{ClockSnapshot, EntityId, PlaceId};

use crate::environment::EnvironmentTickReport;

/// Observer of an environment's lifecycle and per-tick changes.
///
/// Callbacks run on the stepping thread after a tick is complete, so they
/// see a consistent world. Implementations must not block for long.
pub trait SimulationListener: Send + Sync {
    /// The environment started running (or resumed).
    fn on_tick_started(&self, clock: &ClockSnapshot);

    /// A tick completed.
    fn on_tick_stepped(&self, clock: &ClockSnapshot, report: &EnvironmentTickReport);

    /// The environment was paused.
    fn on_tick_paused(&self, clock: &ClockSnapshot);

    /// The environment ended.
    fn on_tick_stopped(&self, clock: &ClockSnapshot);

    /// Entities appeared in a place (added or arrived through a portal).
    fn on_entities_arrived(&self, _place: PlaceId, _entities: &[EntityId]) {}

    /// Entities left a place (removed or departed through a portal).
    fn on_entities_disappeared(&self, _place: PlaceId, _entities: &[EntityId]) {}

    /// Actions were applied to entities of a place.
    fn on_actions_applied(&self, _place: PlaceId, _entities: &[EntityId]) {}

    /// A tick completed without any change to the world.
    fn on_tick_idle(&self, _clock: &ClockSnapshot) {}
}
