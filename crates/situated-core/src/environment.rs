//! The environment: every place of a world, the portals between them, and
//! the shared clock.
//!
//! Lifecycle: an environment is created `Idle`, [`Environment::activate`]d
//! with a [`WorldDescription`], stepped while `Running`, optionally paused
//! and resumed, and finally [`Environment::end`]ed, which destroys its
//! places.
//!
//! # Stepping
//!
//! [`Environment::step`] solves and applies every place concurrently on the
//! rayon global pool, each place behind its own mutex. Portal transfers run
//! next, one at a time, locking both endpoint places in ascending
//! [`PlaceId`] order. Finally every place advances and the listeners are
//! notified.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use situated_types::{Dimension, EntityId, MobileEntity, PlaceId, Point, PortalId};
use uuid::Uuid;

use crate::clock::{ClockError, SimulationClock};
use crate::config::SimulationConfig;
use crate::listener::SimulationListener;
use crate::perception::{PerceptionList, PerceptionRequest};
use crate::pipeline::InfluenceCollector;
use crate::place::{Place, PlaceDescription, PlaceError, TickReport, Transfer};
use crate::portal::{Portal, PortalError};

/// Lifecycle state of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentState {
    /// Created, no world loaded.
    Idle,
    /// Stepping.
    Running,
    /// Temporarily not stepping.
    Paused,
    /// Places destroyed.
    Ended,
}

/// Errors raised by the environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// The refused operation.
        operation: &'static str,
        /// The state the environment is in.
        state: EnvironmentState,
    },

    /// Two places share an identifier.
    #[error("duplicate place {0}")]
    DuplicatePlace(PlaceId),

    /// No place with this identifier.
    #[error("unknown place {0}")]
    UnknownPlace(PlaceId),

    /// Two portals share an identifier.
    #[error("duplicate portal {0}")]
    DuplicatePortal(PortalId),

    /// No portal with this identifier.
    #[error("unknown portal {0}")]
    UnknownPortal(PortalId),

    /// A place failed.
    #[error("place {place}: {source}")]
    Place {
        /// The failing place.
        place: PlaceId,
        /// What went wrong.
        source: PlaceError,
    },

    /// Invalid portal.
    #[error("portal error: {source}")]
    Portal {
        /// The underlying portal error.
        #[from]
        source: PortalError,
    },

    /// Clock failure.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A thread panicked while holding a place lock.
    #[error("lock of place {place} poisoned")]
    LockPoisoned {
        /// The place whose lock is poisoned.
        place: PlaceId,
    },
}

/// Descriptive data about a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    /// Scenario name.
    pub name: String,
    /// Who wrote the scenario.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Scenario version.
    #[serde(default)]
    pub version: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl ScenarioMetadata {
    /// Metadata carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Everything needed to activate an environment.
#[derive(Debug)]
pub struct WorldDescription<D: Dimension> {
    /// Scenario name, authors, and version.
    pub metadata: ScenarioMetadata,
    /// Places, in stepping order.
    pub places: Vec<PlaceDescription<D>>,
    /// Portals between the places.
    pub portals: Vec<Portal<D>>,
}

impl<D: Dimension> WorldDescription<D> {
    /// An empty world.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ScenarioMetadata::named(name),
            places: Vec::new(),
            portals: Vec::new(),
        }
    }

    /// Replace the scenario metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ScenarioMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a place.
    #[must_use]
    pub fn with_place(mut self, place: PlaceDescription<D>) -> Self {
        self.places.push(place);
        self
    }

    /// Add a portal.
    #[must_use]
    pub fn with_portal(mut self, portal: Portal<D>) -> Self {
        self.portals.push(portal);
        self
    }
}

/// What happened in the whole environment during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentTickReport {
    /// Tick reached.
    pub tick: u64,
    /// One report per place, in stepping order.
    pub places: Vec<TickReport>,
    /// Bodies moved between places.
    pub transfers: usize,
}

impl EnvironmentTickReport {
    /// Actions applied across all places.
    pub fn actions_applied(&self) -> usize {
        self.places.iter().map(|report| report.applied.len()).sum()
    }

    /// Whether no place changed.
    pub fn is_idle(&self) -> bool {
        self.places.iter().all(TickReport::is_idle)
    }
}

/// A world of places linked by portals, stepped in lockstep.
pub struct Environment<D: Dimension> {
    run_id: Uuid,
    metadata: ScenarioMetadata,
    state: EnvironmentState,
    clock: Arc<SimulationClock>,
    places: BTreeMap<PlaceId, Mutex<Place<D>>>,
    order: Vec<PlaceId>,
    portals: BTreeMap<PortalId, Portal<D>>,
    listeners: Vec<Arc<dyn SimulationListener>>,
}

impl<D: Dimension> core::fmt::Debug for Environment<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Environment")
            .field("run_id", &self.run_id)
            .field("scenario", &self.metadata.name)
            .field("state", &self.state)
            .field("tick", &self.clock.tick())
            .field("places", &self.order)
            .field("portals", &self.portals.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<D: Dimension> Environment<D> {
    /// An idle environment driven by `clock`.
    pub fn new(clock: Arc<SimulationClock>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            metadata: ScenarioMetadata::default(),
            state: EnvironmentState::Idle,
            clock,
            places: BTreeMap::new(),
            order: Vec::new(),
            portals: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// An idle environment with a clock built from `config`.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, EnvironmentError> {
        Ok(Self::new(Arc::new(SimulationClock::from_config(&config.time)?)))
    }

    /// Identifier of this run.
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Scenario name, once activated.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Scenario metadata, once activated.
    pub const fn metadata(&self) -> &ScenarioMetadata {
        &self.metadata
    }

    /// Lifecycle state.
    pub const fn state(&self) -> EnvironmentState {
        self.state
    }

    /// The shared clock.
    pub const fn clock(&self) -> &Arc<SimulationClock> {
        &self.clock
    }

    /// Places, in stepping order.
    pub fn place_ids(&self) -> &[PlaceId] {
        &self.order
    }

    /// A portal by identifier.
    pub fn portal(&self, id: PortalId) -> Option<&Portal<D>> {
        self.portals.get(&id)
    }

    /// All portals.
    pub fn portals(&self) -> impl Iterator<Item = &Portal<D>> {
        self.portals.values()
    }

    /// Register a listener.
    pub fn add_listener(&mut self, listener: Arc<dyn SimulationListener>) {
        self.listeners.push(listener);
    }

    fn require(&self, operation: &'static str, allowed: &[EnvironmentState]) -> Result<(), EnvironmentError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EnvironmentError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn lock(&self, place: PlaceId) -> Result<MutexGuard<'_, Place<D>>, EnvironmentError> {
        self.places
            .get(&place)
            .ok_or(EnvironmentError::UnknownPlace(place))?
            .lock()
            .map_err(|_poisoned| EnvironmentError::LockPoisoned { place })
    }

    /// Build every place and portal of `world` and start running.
    pub fn activate(&mut self, world: WorldDescription<D>) -> Result<(), EnvironmentError> {
        self.require("activate", &[EnvironmentState::Idle])?;
        let WorldDescription {
            metadata,
            places,
            portals,
        } = world;

        for description in places {
            let id = description.id;
            if self.places.contains_key(&id) {
                return Err(EnvironmentError::DuplicatePlace(id));
            }
            let place = Place::build(description, Arc::clone(&self.clock))
                .map_err(|source| EnvironmentError::Place { place: id, source })?;
            self.places.insert(id, Mutex::new(place));
            self.order.push(id);
        }
        for portal in portals {
            self.add_portal(portal)?;
        }

        self.metadata = metadata;
        self.state = EnvironmentState::Running;
        tracing::info!(
            run_id = %self.run_id,
            scenario = %self.metadata.name,
            version = %self.metadata.version,
            places = self.order.len(),
            portals = self.portals.len(),
            "environment activated"
        );
        let snapshot = self.clock.snapshot();
        for listener in &self.listeners {
            listener.on_tick_started(&snapshot);
        }
        Ok(())
    }

    /// Attach a complete portal to its two places.
    ///
    /// Each end must lie in a known place and, where that place has ground,
    /// on traversable ground.
    pub fn add_portal(&mut self, portal: Portal<D>) -> Result<(), EnvironmentError> {
        if self.portals.contains_key(&portal.id()) {
            return Err(EnvironmentError::DuplicatePortal(portal.id()));
        }
        let ends = portal.ends()?;
        let mut links = Vec::with_capacity(ends.len());
        for end in ends {
            let place = self.lock(end.place)?;
            if let Some(ground) = place.ground() {
                let (x, y) = end.position.point.footprint();
                if !ground.is_traversable(x, y) {
                    return Err(PortalError::NonTraversableEndpoint {
                        portal: portal.id(),
                        place: end.place,
                    }
                    .into());
                }
            }
            links.push((end.place, portal.link_for(end.place)?));
        }
        for (place, link) in links {
            self.lock(place)?.attach_portal(link);
        }
        tracing::debug!(portal = %portal.id(), "portal attached");
        self.portals.insert(portal.id(), portal);
        Ok(())
    }

    /// Detach and return a portal.
    pub fn remove_portal(&mut self, id: PortalId) -> Result<Portal<D>, EnvironmentError> {
        let portal = self
            .portals
            .remove(&id)
            .ok_or(EnvironmentError::UnknownPortal(id))?;
        for end in portal.ends()? {
            self.lock(end.place)?.detach_portal(id);
        }
        Ok(portal)
    }

    /// Stop stepping until [`Environment::resume`].
    pub fn pause(&mut self) -> Result<(), EnvironmentError> {
        self.require("pause", &[EnvironmentState::Running])?;
        self.state = EnvironmentState::Paused;
        let snapshot = self.clock.snapshot();
        for listener in &self.listeners {
            listener.on_tick_paused(&snapshot);
        }
        Ok(())
    }

    /// Resume a paused environment.
    pub fn resume(&mut self) -> Result<(), EnvironmentError> {
        self.require("resume", &[EnvironmentState::Paused])?;
        self.state = EnvironmentState::Running;
        let snapshot = self.clock.snapshot();
        for listener in &self.listeners {
            listener.on_tick_started(&snapshot);
        }
        Ok(())
    }

    /// End the run and destroy every place and portal.
    pub fn end(&mut self) -> Result<(), EnvironmentError> {
        self.require("end", &[EnvironmentState::Running, EnvironmentState::Paused])?;
        self.state = EnvironmentState::Ended;
        self.portals.clear();
        self.places.clear();
        self.order.clear();
        let snapshot = self.clock.snapshot();
        tracing::info!(run_id = %self.run_id, tick = snapshot.tick, "environment ended");
        for listener in &self.listeners {
            listener.on_tick_stopped(&snapshot);
        }
        Ok(())
    }

    /// Read a place.
    pub fn with_place<R>(&self, place: PlaceId, f: impl FnOnce(&Place<D>) -> R) -> Result<R, EnvironmentError> {
        let guard = self.lock(place)?;
        Ok(f(&guard))
    }

    /// Mutate a place.
    pub fn with_place_mut<R>(
        &self,
        place: PlaceId,
        f: impl FnOnce(&mut Place<D>) -> R,
    ) -> Result<R, EnvironmentError> {
        let mut guard = self.lock(place)?;
        Ok(f(&mut guard))
    }

    /// The influence collector of a place.
    pub fn collector(&self, place: PlaceId) -> Result<Arc<InfluenceCollector<D>>, EnvironmentError> {
        self.with_place(place, Place::collector)
    }

    /// Run perception in a place.
    pub fn perceive(
        &self,
        place: PlaceId,
        requests: &[PerceptionRequest<D>],
    ) -> Result<Vec<PerceptionList<D>>, EnvironmentError> {
        self.with_place(place, |p| p.perceive(requests))?
            .map_err(|source| EnvironmentError::Place { place, source })
    }

    /// Queue a body for insertion into a place.
    pub fn add_body(&self, place: PlaceId, body: MobileEntity<D>) -> Result<(), EnvironmentError> {
        self.with_place_mut(place, |p| p.add_body(body))
    }

    /// Queue a body for removal from a place.
    pub fn remove_body(&self, place: PlaceId, body: EntityId) -> Result<(), EnvironmentError> {
        self.with_place_mut(place, |p| p.remove_body(body))
    }

    /// The place containing `point`.
    ///
    /// Among places with ground traversable under the point, the one whose
    /// ground is highest without exceeding the point's height wins. Places
    /// without ground are a fallback: the first one, in stepping order,
    /// whose domain contains the point.
    pub fn place_at(&self, point: &Point<D>) -> Result<Option<PlaceId>, EnvironmentError> {
        let (x, y) = point.footprint();
        let footprint = Point::new([x, y]);
        let ceiling = point.height().unwrap_or(f64::INFINITY);
        let mut best: Option<(f64, PlaceId)> = None;
        let mut fallback = None;

        for id in &self.order {
            let place = self.lock(*id)?;
            if !place.domain().footprint().contains_point(&footprint) {
                continue;
            }
            match place.ground() {
                Some(ground) => {
                    if !ground.is_traversable(x, y) {
                        continue;
                    }
                    let height = ground.height_at(x, y);
                    if height <= ceiling && best.is_none_or(|(top, _)| height > top) {
                        best = Some((height, *id));
                    }
                }
                None => {
                    if fallback.is_none() && place.domain().contains_point(point) {
                        fallback = Some(*id);
                    }
                }
            }
        }
        Ok(best.map(|(_, id)| id).or(fallback))
    }

    /// Run one tick across every place.
    pub fn step(&mut self) -> Result<EnvironmentTickReport, EnvironmentError> {
        self.require("step", &[EnvironmentState::Running])?;
        let start = self.clock.tick();

        let transfers: Vec<Transfer<D>> = self
            .order
            .par_iter()
            .map(|id| self.solve_and_apply(*id))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        let mut completed = 0_usize;
        for transfer in &transfers {
            if self.transfer(transfer)? {
                completed = completed.saturating_add(1);
            }
        }

        let places = self
            .order
            .iter()
            .map(|id| {
                self.lock(*id)?
                    .advance()
                    .map_err(|source| EnvironmentError::Place { place: *id, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let tick = self.clock.advance_to(start.saturating_add(1));

        let report = EnvironmentTickReport {
            tick,
            places,
            transfers: completed,
        };
        self.notify(&report);
        Ok(report)
    }

    fn solve_and_apply(&self, id: PlaceId) -> Result<Vec<Transfer<D>>, EnvironmentError> {
        let mut place = self.lock(id)?;
        let wrap = |source| EnvironmentError::Place { place: id, source };
        place.solve().map_err(wrap)?;
        place.apply().map_err(wrap)?;
        Ok(place.take_transfers())
    }

    /// Move one body between places. Returns whether it moved.
    fn transfer(&self, transfer: &Transfer<D>) -> Result<bool, EnvironmentError> {
        let (from, to) = (transfer.source, transfer.destination);
        if from == to || !self.places.contains_key(&to) {
            tracing::warn!(
                entity = %transfer.entity,
                portal = %transfer.portal,
                destination = %to,
                "portal destination unavailable"
            );
            return Ok(false);
        }

        let (low, high) = if from < to { (from, to) } else { (to, from) };
        let mut first = self.lock(low)?;
        let mut second = self.lock(high)?;
        let (sender, receiver) = if from == low {
            (&mut *first, &mut *second)
        } else {
            (&mut *second, &mut *first)
        };

        let body = sender
            .release_transfer(transfer)
            .map_err(|source| EnvironmentError::Place { place: from, source })?;
        receiver
            .accept_transfer(body)
            .map_err(|source| EnvironmentError::Place { place: to, source })?;
        tracing::debug!(
            entity = %transfer.entity,
            portal = %transfer.portal,
            from = %from,
            to = %to,
            "body crossed portal"
        );
        Ok(true)
    }

    fn notify(&self, report: &EnvironmentTickReport) {
        let snapshot = self.clock.snapshot();
        for listener in &self.listeners {
            for place in &report.places {
                if !place.arrived.is_empty() {
                    listener.on_entities_arrived(place.place, &place.arrived);
                }
                if !place.departed.is_empty() {
                    listener.on_entities_disappeared(place.place, &place.departed);
                }
                if !place.applied.is_empty() {
                    listener.on_actions_applied(place.place, &place.applied);
                }
            }
            if report.is_idle() {
                listener.on_tick_idle(&snapshot);
            }
            listener.on_tick_stepped(&snapshot, report);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use situated_types::{Aabb, Dim2, Dim3, Position, TimeUnit};
    use situated_world::FlatGround;

    use crate::portal::PortalEnd;

    fn clock() -> Arc<SimulationClock> {
        Arc::new(SimulationClock::new(1.0, TimeUnit::Seconds).unwrap())
    }

    fn room(name: &str) -> PlaceDescription<Dim2> {
        PlaceDescription::new(
            name,
            Aabb::new(Point::new([0.0, 0.0]), Point::new([10.0, 10.0])),
        )
    }

    #[test]
    fn lifecycle_transitions() {
        let mut env: Environment<Dim2> = Environment::new(clock());
        assert!(matches!(
            env.step(),
            Err(EnvironmentError::InvalidState { state: EnvironmentState::Idle, .. })
        ));
        let metadata = ScenarioMetadata {
            version: "1.2".to_owned(),
            authors: vec!["Ada".to_owned()],
            ..ScenarioMetadata::named("w")
        };
        env.activate(WorldDescription::new("ignored").with_metadata(metadata.clone()).with_place(room("a")))
            .unwrap();
        assert_eq!(env.state(), EnvironmentState::Running);
        assert_eq!(env.name(), "w");
        assert_eq!(env.metadata(), &metadata);
        assert_eq!(env.step().unwrap().tick, 1);

        env.pause().unwrap();
        assert!(env.step().is_err());
        env.resume().unwrap();
        assert_eq!(env.step().unwrap().tick, 2);

        env.end().unwrap();
        assert_eq!(env.state(), EnvironmentState::Ended);
        assert!(env.place_ids().is_empty());
        assert!(env.activate(WorldDescription::new("again")).is_err());
    }

    #[test]
    fn tick_report_serializes_to_json() {
        let place = room("a");
        let place_id = place.id;
        let mut env: Environment<Dim2> = Environment::new(clock());
        env.activate(WorldDescription::new("w").with_place(place)).unwrap();
        let report = env.step().unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tick"], 1);
        assert_eq!(json["places"][0]["place"], place_id.to_string());
        let restored: EnvironmentTickReport = serde_json::from_value(json).unwrap();
        assert_eq!(restored, report);
    }

    #[test]
    fn empty_world_still_ticks() {
        let mut env: Environment<Dim2> = Environment::new(clock());
        env.activate(WorldDescription::new("empty")).unwrap();
        let report = env.step().unwrap();
        assert_eq!(report.tick, 1);
        assert!(report.is_idle());
    }

    #[test]
    fn duplicate_places_are_rejected() {
        let a = room("a");
        let mut b = room("b");
        b.id = a.id;
        let mut env: Environment<Dim2> = Environment::new(clock());
        let result = env.activate(WorldDescription::new("w").with_place(a).with_place(b));
        assert!(matches!(result, Err(EnvironmentError::DuplicatePlace(_))));
    }

    #[test]
    fn portal_to_unknown_place_is_rejected() {
        let a = room("a");
        let a_id = a.id;
        let portal = Portal::between(
            PortalEnd::new(a_id, Position::new(Point::new([10.0, 5.0]), 0.0)),
            PortalEnd::new(PlaceId::new(), Position::default()),
            [1.0, 1.0],
        )
        .unwrap();
        let mut env: Environment<Dim2> = Environment::new(clock());
        let result = env.activate(WorldDescription::new("w").with_place(a).with_portal(portal));
        assert!(matches!(result, Err(EnvironmentError::UnknownPlace(_))));
    }

    #[test]
    fn place_at_picks_highest_ground_below_the_point() {
        let domain = Aabb::new(Point::new([0.0, 0.0, -1.0]), Point::new([10.0, 10.0, 20.0]));
        let area = Aabb::new(Point::new([0.0, 0.0]), Point::new([10.0, 10.0]));
        let ground_floor = PlaceDescription::<Dim3>::new("ground floor", domain)
            .with_ground(FlatGround::new(0.0, area));
        let first_floor = PlaceDescription::<Dim3>::new("first floor", domain)
            .with_ground(FlatGround::new(5.0, area));
        let (low, high) = (ground_floor.id, first_floor.id);

        let mut env: Environment<Dim3> = Environment::new(clock());
        env.activate(
            WorldDescription::new("house")
                .with_place(ground_floor)
                .with_place(first_floor),
        )
        .unwrap();

        assert_eq!(env.place_at(&Point::new([5.0, 5.0, 1.0])).unwrap(), Some(low));
        assert_eq!(env.place_at(&Point::new([5.0, 5.0, 6.0])).unwrap(), Some(high));
        assert_eq!(env.place_at(&Point::new([50.0, 5.0, 6.0])).unwrap(), None);
    }

    #[test]
    fn place_at_falls_back_to_places_without_ground() {
        let a = room("a");
        let a_id = a.id;
        let mut env: Environment<Dim2> = Environment::new(clock());
        env.activate(WorldDescription::new("w").with_place(a).with_place(room("b")))
            .unwrap();
        assert_eq!(env.place_at(&Point::new([3.0, 3.0])).unwrap(), Some(a_id));
    }
}
