//! The demo world: two stacked levels joined by a staircase portal.
//!
//! Both levels share one square footprint. The ground floor stands at
//! height 0 and the upper floor at [`UPPER_FLOOR_HEIGHT`]. The staircase
//! leaves the ground floor across its east edge and enters the upper floor
//! across its west edge, so walkers cross in both directions. Obstacles and
//! walkers are scattered from the configured seed.

use std::f64::consts::{PI, TAU};

use rand::Rng;
use serde::Deserialize;
use situated_core::{PlaceDescription, Portal, PortalEnd, ScenarioMetadata, SimulationConfig, WorldDescription};
use situated_types::{
    Aabb, AgentId, Dim3, EntityId, MobileEntity, MotionLimits, PlaceId, Point, Position, Semantic,
    WorldEntity,
};
use situated_world::FlatGround;

use crate::error::EngineError;

/// Height of the upper floor surface.
pub const UPPER_FLOOR_HEIGHT: f64 = 5.0;

/// Vertical clearance of each level above its floor.
const LEVEL_CLEARANCE: f64 = 4.0;

/// Half extents of a walker body.
const WALKER_HALF_EXTENTS: [f64; 3] = [0.3, 0.3, 0.9];

/// Half extents of each side of the staircase portal.
const STAIRCASE_HALF_EXTENTS: [f64; 3] = [1.0, 1.0, 2.0];

/// Margin by which floors extend past the level footprint.
const FLOOR_MARGIN: f64 = 2.0;

/// Smallest level footprint that fits obstacles and the staircase.
const MIN_LEVEL_SIZE: f64 = 10.0;

/// The `scenario` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    /// Walkers placed on each level.
    #[serde(default = "default_walkers_per_level")]
    pub walkers_per_level: usize,

    /// Obstacles placed on each level.
    #[serde(default = "default_obstacles_per_level")]
    pub obstacles_per_level: usize,

    /// Side of the square footprint of a level.
    #[serde(default = "default_level_size")]
    pub level_size: f64,

    /// Top walking speed, units per second.
    #[serde(default = "default_walker_speed")]
    pub walker_speed: f64,

    /// Radius of a walker's perception sphere.
    #[serde(default = "default_perception_radius")]
    pub perception_radius: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            walkers_per_level: default_walkers_per_level(),
            obstacles_per_level: default_obstacles_per_level(),
            level_size: default_level_size(),
            walker_speed: default_walker_speed(),
            perception_radius: default_perception_radius(),
        }
    }
}

impl ScenarioConfig {
    /// Reject values that cannot describe a world.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.level_size.is_finite() || self.level_size < MIN_LEVEL_SIZE {
            return Err(EngineError::ScenarioConfig {
                message: format!(
                    "level_size must be at least {MIN_LEVEL_SIZE}, got {}",
                    self.level_size
                ),
            });
        }
        if !self.walker_speed.is_finite() || self.walker_speed <= 0.0 {
            return Err(EngineError::ScenarioConfig {
                message: format!("walker_speed must be positive, got {}", self.walker_speed),
            });
        }
        if !self.perception_radius.is_finite() || self.perception_radius < 0.0 {
            return Err(EngineError::ScenarioConfig {
                message: format!(
                    "perception_radius must be non-negative, got {}",
                    self.perception_radius
                ),
            });
        }
        Ok(())
    }
}

/// An agent steering one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walker {
    /// The steering agent.
    pub agent: AgentId,
    /// The body it steers.
    pub body: EntityId,
    /// Current walking direction, radians.
    pub heading: f64,
}

/// A ready-to-activate world and the agents walking in it.
#[derive(Debug)]
pub struct Scenario {
    /// Places and portal.
    pub world: WorldDescription<Dim3>,
    /// Every walker.
    pub walkers: Vec<Walker>,
    /// Initial place of every walker body.
    pub placements: Vec<(EntityId, PlaceId)>,
}

/// One level before population.
struct Level {
    name: &'static str,
    floor: f64,
}

/// Build the two-level world.
pub fn build(
    config: &SimulationConfig,
    scenario: &ScenarioConfig,
    rng: &mut impl Rng,
) -> Result<Scenario, EngineError> {
    scenario.validate()?;
    let size = scenario.level_size;
    let limits = MotionLimits {
        max_linear_speed: scenario.walker_speed,
        max_linear_acceleration: scenario.walker_speed * 2.0,
        max_angular_speed: PI,
        max_angular_acceleration: TAU,
    };

    let mut walkers = Vec::new();
    let mut placements = Vec::new();
    let mut descriptions = Vec::new();
    for level in [
        Level {
            name: "ground floor",
            floor: 0.0,
        },
        Level {
            name: "upper floor",
            floor: UPPER_FLOOR_HEIGHT,
        },
    ] {
        let domain = Aabb::new(
            Point::new([0.0, 0.0, level.floor - 1.0]),
            Point::new([size, size, level.floor + LEVEL_CLEARANCE]),
        );
        let floor_area = Aabb::new(
            Point::new([-FLOOR_MARGIN, -FLOOR_MARGIN]),
            Point::new([size + FLOOR_MARGIN, size + FLOOR_MARGIN]),
        );
        let mut description = PlaceDescription::from_config(level.name, domain, config)
            .with_ground(FlatGround::new(level.floor, floor_area))
            .with_statics((0..scenario.obstacles_per_level).map(|_| obstacle(rng, size, level.floor)));

        for _ in 0..scenario.walkers_per_level {
            let heading = rng.random_range(0.0..TAU);
            let body = walker_body(rng, size, level.floor, limits).oriented(heading);
            let walker = Walker {
                agent: AgentId::new(),
                body: body.id(),
                heading,
            };
            placements.push((walker.body, description.id));
            walkers.push(walker);
            description = description.with_body(body);
        }
        descriptions.push(description);
    }

    let [ground_floor, upper_floor] = <[PlaceDescription<Dim3>; 2]>::try_from(descriptions)
        .map_err(|_levels| EngineError::ScenarioConfig {
            message: "expected exactly two levels".to_owned(),
        })?;
    let stand = WALKER_HALF_EXTENTS[2];
    let staircase = Portal::between(
        PortalEnd::new(
            ground_floor.id,
            Position::new(Point::new([size - 0.5, size / 2.0, stand]), 0.0),
        ),
        PortalEnd::new(
            upper_floor.id,
            Position::new(Point::new([0.5, size / 2.0, UPPER_FLOOR_HEIGHT + stand]), 0.0),
        ),
        STAIRCASE_HALF_EXTENTS,
    )?;

    let world = WorldDescription::new(config.world.name.clone())
        .with_metadata(ScenarioMetadata {
            name: config.world.name.clone(),
            authors: vec!["situated-engine".to_owned()],
            version: env!("CARGO_PKG_VERSION").to_owned(),
            description: "Two stacked levels joined by a staircase portal".to_owned(),
        })
        .with_place(ground_floor)
        .with_place(upper_floor)
        .with_portal(staircase);

    Ok(Scenario {
        world,
        walkers,
        placements,
    })
}

/// A box resting on the floor somewhere inside the level.
fn obstacle(rng: &mut impl Rng, size: f64, floor: f64) -> WorldEntity<Dim3> {
    let half = [rng.random_range(0.5..2.0), rng.random_range(0.5..2.0), 1.5];
    let center = Point::new([
        rng.random_range(half[0]..size - half[0]),
        rng.random_range(half[1]..size - half[1]),
        floor + half[2],
    ]);
    WorldEntity::new(Aabb::from_center(center, &half)).tagged(Semantic::Obstacle)
}

/// A pedestrian standing on the floor somewhere inside the level.
fn walker_body(rng: &mut impl Rng, size: f64, floor: f64, limits: MotionLimits) -> MobileEntity<Dim3> {
    let margin = 1.0;
    let center = Point::new([
        rng.random_range(margin..size - margin),
        rng.random_range(margin..size - margin),
        floor + WALKER_HALF_EXTENTS[2],
    ]);
    let entity = WorldEntity::new(Aabb::from_center(center, &WALKER_HALF_EXTENTS)).tagged(Semantic::Pedestrian);
    MobileEntity::from_entity(entity, limits).with_on_ground(true)
}

const fn default_walkers_per_level() -> usize {
    12
}

const fn default_obstacles_per_level() -> usize {
    6
}

const fn default_level_size() -> f64 {
    40.0
}

const fn default_walker_speed() -> f64 {
    1.4
}

const fn default_perception_radius() -> f64 {
    5.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn builds_two_linked_levels() {
        let config = SimulationConfig::default();
        let scenario = ScenarioConfig {
            walkers_per_level: 3,
            obstacles_per_level: 2,
            ..ScenarioConfig::default()
        };
        let built = build(&config, &scenario, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(built.world.places.len(), 2);
        assert_eq!(built.world.portals.len(), 1);
        assert_eq!(built.walkers.len(), 6);
        assert_eq!(built.placements.len(), 6);
        let ground_floor = built.world.places[0].id;
        let upper_floor = built.world.places[1].id;
        let portal = &built.world.portals[0];
        assert_eq!(portal.other_side(ground_floor).unwrap(), upper_floor);
        for place in &built.world.places {
            assert_eq!(place.statics.len(), 2);
            assert!(place.bodies.iter().all(|body| place.domain.contains(body.bounds())));
        }
    }

    #[test]
    fn same_seed_same_world() {
        let config = SimulationConfig::default();
        let scenario = ScenarioConfig::default();
        let first = build(&config, &scenario, &mut StdRng::seed_from_u64(7)).unwrap();
        let second = build(&config, &scenario, &mut StdRng::seed_from_u64(7)).unwrap();
        let positions = |s: &Scenario| -> Vec<Point<Dim3>> {
            s.world
                .places
                .iter()
                .flat_map(|place| place.bodies.iter().map(MobileEntity::position))
                .collect()
        };
        assert_eq!(positions(&first), positions(&second));
    }

    #[test]
    fn tiny_levels_are_rejected() {
        let scenario = ScenarioConfig {
            level_size: 1.0,
            ..ScenarioConfig::default()
        };
        let result = build(&SimulationConfig::default(), &scenario, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(EngineError::ScenarioConfig { .. })));
    }
}
