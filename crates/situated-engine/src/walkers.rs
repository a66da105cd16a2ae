//! Wandering agents and the roster that tracks where their bodies are.
//!
//! Each tick every walker perceives a sphere around its body and submits
//! one displacement: away from the closest body it sees when that body is
//! too close, otherwise along a slowly drifting heading. Walkers ask for
//! more than their body can do in one step; the solver clamps it.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::Rng;
use rand::rngs::StdRng;
use situated_core::{
    Environment, EnvironmentTickReport, Place, PlaceError, PerceptionRequest, SimulationListener,
};
use situated_types::{Capability, ClockSnapshot, Dim3, EntityId, Influence, PlaceId};
use situated_world::Frustum;

use crate::error::EngineError;
use crate::scenario::Walker;

/// Distance under which a walker steps away from another body.
const PERSONAL_SPACE: f64 = 1.0;

/// Largest heading change per tick, radians.
const HEADING_DRIFT: f64 = 0.6;

/// Requested stride, as a multiple of what the body can cover in a step.
const OVERREACH: f64 = 1.5;

/// Which place holds each walker body, kept current from listener events.
#[derive(Debug, Default)]
pub struct Roster {
    places: Mutex<BTreeMap<EntityId, PlaceId>>,
}

impl Roster {
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<EntityId, PlaceId>>, EngineError> {
        self.places.lock().map_err(|_poisoned| EngineError::RosterPoisoned)
    }

    /// Record that `body` is in `place`.
    pub fn place(&self, body: EntityId, place: PlaceId) -> Result<(), EngineError> {
        self.lock()?.insert(body, place);
        Ok(())
    }

    /// Bodies grouped by place.
    pub fn by_place(&self) -> Result<BTreeMap<PlaceId, Vec<EntityId>>, EngineError> {
        let mut grouped: BTreeMap<PlaceId, Vec<EntityId>> = BTreeMap::new();
        for (body, place) in self.lock()?.iter() {
            grouped.entry(*place).or_default().push(*body);
        }
        Ok(grouped)
    }
}

impl SimulationListener for Roster {
    fn on_tick_started(&self, _clock: &ClockSnapshot) {}

    fn on_tick_stepped(&self, _clock: &ClockSnapshot, _report: &EnvironmentTickReport) {}

    fn on_tick_paused(&self, _clock: &ClockSnapshot) {}

    fn on_tick_stopped(&self, _clock: &ClockSnapshot) {}

    fn on_entities_arrived(&self, place: PlaceId, entities: &[EntityId]) {
        let Ok(mut places) = self.lock() else {
            tracing::warn!(%place, "roster lock poisoned; arrivals dropped");
            return;
        };
        for body in entities {
            places.insert(*body, place);
        }
    }

    fn on_entities_disappeared(&self, place: PlaceId, entities: &[EntityId]) {
        let Ok(mut places) = self.lock() else {
            tracing::warn!(%place, "roster lock poisoned; departures dropped");
            return;
        };
        // A body crossing a portal may already be recorded in its new place.
        for body in entities {
            if places.get(body) == Some(&place) {
                places.remove(body);
            }
        }
    }
}

/// Every walker, with the randomness steering them.
#[derive(Debug)]
pub struct Walkers {
    walkers: BTreeMap<EntityId, Walker>,
    roster: Arc<Roster>,
    rng: StdRng,
    perception_radius: f64,
    stride: f64,
}

impl Walkers {
    /// Walkers moving at up to `speed` units per second, in steps of
    /// `step_seconds`.
    pub fn new(
        walkers: impl IntoIterator<Item = Walker>,
        roster: Arc<Roster>,
        rng: StdRng,
        perception_radius: f64,
        speed: f64,
        step_seconds: f64,
    ) -> Self {
        Self {
            walkers: walkers.into_iter().map(|walker| (walker.body, walker)).collect(),
            roster,
            rng,
            perception_radius,
            stride: speed * step_seconds * OVERREACH,
        }
    }

    /// Number of walkers.
    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    /// Perceive and submit one influence per walker. Returns the number of
    /// influences submitted.
    pub fn act(&mut self, env: &Environment<Dim3>) -> Result<usize, EngineError> {
        let mut submitted = 0_usize;
        for (place, bodies) in self.roster.by_place()? {
            let count = env.with_place(place, |p| {
                steer(
                    p,
                    &bodies,
                    &mut self.walkers,
                    &mut self.rng,
                    self.perception_radius,
                    self.stride,
                )
            })??;
            submitted = submitted.saturating_add(count);
        }
        Ok(submitted)
    }
}

fn steer(
    place: &Place<Dim3>,
    bodies: &[EntityId],
    walkers: &mut BTreeMap<EntityId, Walker>,
    rng: &mut StdRng,
    radius: f64,
    stride: f64,
) -> Result<usize, PlaceError> {
    let requests: Vec<PerceptionRequest<Dim3>> = bodies
        .iter()
        .filter_map(|id| Some((walkers.get(id)?, place.body(*id)?)))
        .map(|(walker, body)| {
            PerceptionRequest::new(walker.agent, walker.body)
                .with_frustum(Frustum::sphere(body.position(), radius))
                .with_capability(Capability::GroundSensing)
        })
        .collect();

    let mut submitted = 0_usize;
    for list in place.perceive(&requests)? {
        let (Some(walker), Some(body)) = (walkers.get_mut(&list.body()), place.body(list.body())) else {
            continue;
        };
        walker.heading += rng.random_range(-HEADING_DRIFT..HEADING_DRIFT);

        let crowding = list
            .dynamic_percepts()
            .iter()
            .filter(|percept| percept.distance < PERSONAL_SPACE)
            .min_by(|a, b| a.distance.total_cmp(&b.distance));
        if let Some(closest) = crowding {
            let [dx, dy, _] = body.position().offset_from(&closest.bounds.center());
            walker.heading = dy.atan2(dx);
        }
        if list.ground(place)?.is_some_and(|ground| !ground.traversable) {
            walker.heading += PI;
        }

        let (sin, cos) = walker.heading.sin_cos();
        place.submit(Influence::displacement(
            walker.agent,
            walker.body,
            [stride * cos, stride * sin, 0.0],
        ))?;
        submitted = submitted.saturating_add(1);
    }
    Ok(submitted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn roster_follows_portal_crossings() {
        let roster = Roster::default();
        let (body, west, east) = (EntityId::new(), PlaceId::new(), PlaceId::new());
        roster.place(body, west).unwrap();

        // The receiving place may be reported before the sending one.
        roster.on_entities_arrived(east, &[body]);
        roster.on_entities_disappeared(west, &[body]);
        let grouped = roster.by_place().unwrap();
        assert_eq!(grouped.get(&east), Some(&vec![body]));
        assert!(!grouped.contains_key(&west));

        roster.on_entities_disappeared(east, &[body]);
        assert!(roster.by_place().unwrap().is_empty());
    }

    #[test]
    fn by_place_groups_bodies() {
        let roster = Roster::default();
        let (a, b) = (PlaceId::new(), PlaceId::new());
        let bodies: Vec<EntityId> = (0..3).map(|_| EntityId::new()).collect();
        roster.place(bodies[0], a).unwrap();
        roster.place(bodies[1], b).unwrap();
        roster.place(bodies[2], a).unwrap();

        let grouped = roster.by_place().unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.get(&a).map(Vec::len), Some(2));
        assert_eq!(grouped.get(&b).map(Vec::len), Some(1));
    }
}
