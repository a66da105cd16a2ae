//! World entities: the data carried by spatial trees, percepts, and actions.
//!
//! A [`WorldEntity`] is anything with an identity and bounds. A
//! [`MobileEntity`] wraps one and adds an orientation plus kinematic state;
//! it is the body an agent steers through influences.
//!
//! Equality of entities is `(id, bounds)` based: semantics, user data and
//! kinematic state do not participate.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Dimension, Point, Position, norm, scale};
use crate::ids::EntityId;
use crate::time::TimeUnit;

/// A semantic tag attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semantic {
    /// Impassable solid object.
    Obstacle,
    /// Building or other large static structure.
    Building,
    /// Trees, hedges, and similar vegetation.
    Vegetation,
    /// Road or pavement surface.
    Road,
    /// A pedestrian body.
    Pedestrian,
    /// A vehicle body.
    Vehicle,
    /// Application-defined tag.
    Custom(String),
}

/// An identified object with bounds in a `D`-dimensional world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct WorldEntity<D: Dimension> {
    /// Stable identifier, immutable for the entity's lifetime.
    id: EntityId,
    /// Current bounds.
    bounds: Aabb<D>,
    /// Semantic tags.
    semantics: BTreeSet<Semantic>,
    /// String-keyed user data, allocated on first write.
    user_data: Option<BTreeMap<String, String>>,
}

impl<D: Dimension> WorldEntity<D> {
    /// Create an entity with a fresh identifier.
    pub fn new(bounds: Aabb<D>) -> Self {
        Self::with_id(EntityId::new(), bounds)
    }

    /// Create an entity with an explicit identifier.
    pub const fn with_id(id: EntityId, bounds: Aabb<D>) -> Self {
        Self {
            id,
            bounds,
            semantics: BTreeSet::new(),
            user_data: None,
        }
    }

    /// Builder-style semantic tag addition.
    #[must_use]
    pub fn tagged(mut self, semantic: Semantic) -> Self {
        self.semantics.insert(semantic);
        self
    }

    /// The entity identifier.
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// The entity bounds.
    pub const fn bounds(&self) -> &Aabb<D> {
        &self.bounds
    }

    /// Replace the entity bounds.
    pub const fn set_bounds(&mut self, bounds: Aabb<D>) {
        self.bounds = bounds;
    }

    /// Centre of the bounds; the entity's reference position.
    pub fn position(&self) -> Point<D> {
        self.bounds.center()
    }

    /// The semantic tags.
    pub const fn semantics(&self) -> &BTreeSet<Semantic> {
        &self.semantics
    }

    /// Whether the entity carries a tag.
    pub fn has_semantic(&self, semantic: &Semantic) -> bool {
        self.semantics.contains(semantic)
    }

    /// Add a semantic tag.
    pub fn add_semantic(&mut self, semantic: Semantic) {
        self.semantics.insert(semantic);
    }

    /// Read a user data value.
    pub fn user_data(&self, key: &str) -> Option<&str> {
        self.user_data
            .as_ref()
            .and_then(|map| map.get(key))
            .map(String::as_str)
    }

    /// Write a user data value, allocating the map on first use.
    pub fn set_user_data(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.user_data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
    }

    /// Remove a user data value, returning it if present.
    pub fn remove_user_data(&mut self, key: &str) -> Option<String> {
        self.user_data.as_mut().and_then(|map| map.remove(key))
    }

    /// Whether user data storage has been allocated.
    pub const fn has_user_data(&self) -> bool {
        self.user_data.is_some()
    }
}

impl<D: Dimension> PartialEq for WorldEntity<D> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.bounds == other.bounds
    }
}

/// Per-second kinematic limits of a mobile body.
///
/// Infinite values disable the corresponding limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionLimits {
    /// Maximal linear speed (units per second).
    pub max_linear_speed: f64,
    /// Maximal linear acceleration (units per second squared).
    pub max_linear_acceleration: f64,
    /// Maximal angular speed (radians per second).
    pub max_angular_speed: f64,
    /// Maximal angular acceleration (radians per second squared).
    pub max_angular_acceleration: f64,
}

impl MotionLimits {
    /// Limits that constrain nothing.
    pub const UNBOUNDED: Self = Self {
        max_linear_speed: f64::INFINITY,
        max_linear_acceleration: f64::INFINITY,
        max_angular_speed: f64::INFINITY,
        max_angular_acceleration: f64::INFINITY,
    };

    /// Speed limits without acceleration limits.
    pub const fn speed(max_linear_speed: f64, max_angular_speed: f64) -> Self {
        Self {
            max_linear_speed,
            max_linear_acceleration: f64::INFINITY,
            max_angular_speed,
            max_angular_acceleration: f64::INFINITY,
        }
    }
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// A world entity that moves: an agent body.
///
/// Velocities are stored per second and converted on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct MobileEntity<D: Dimension> {
    /// The underlying entity (identity, bounds, semantics).
    entity: WorldEntity<D>,
    /// Orientation in the ground plane, radians.
    orientation: f64,
    /// Linear velocity, units per second.
    linear_velocity: D::Coords,
    /// Angular velocity, radians per second.
    angular_velocity: f64,
    /// Kinematic limits.
    limits: MotionLimits,
    /// Whether the body is kept on the ground surface.
    on_ground: bool,
}

impl<D: Dimension> MobileEntity<D> {
    /// Create a body at rest with the given bounds and limits.
    pub fn new(bounds: Aabb<D>, limits: MotionLimits) -> Self {
        Self::from_entity(WorldEntity::new(bounds), limits)
    }

    /// Wrap an existing entity into a body at rest.
    pub fn from_entity(entity: WorldEntity<D>, limits: MotionLimits) -> Self {
        Self {
            entity,
            orientation: 0.0,
            linear_velocity: D::Coords::default(),
            angular_velocity: 0.0,
            limits,
            on_ground: false,
        }
    }

    /// Builder-style orientation setter.
    #[must_use]
    pub const fn oriented(mut self, orientation: f64) -> Self {
        self.orientation = orientation;
        self
    }

    /// Builder-style ground flag setter.
    #[must_use]
    pub const fn with_on_ground(mut self, on_ground: bool) -> Self {
        self.on_ground = on_ground;
        self
    }

    /// The underlying world entity.
    pub const fn entity(&self) -> &WorldEntity<D> {
        &self.entity
    }

    /// Mutable access to the underlying world entity.
    pub const fn entity_mut(&mut self) -> &mut WorldEntity<D> {
        &mut self.entity
    }

    /// The entity identifier.
    pub const fn id(&self) -> EntityId {
        self.entity.id()
    }

    /// The current bounds.
    pub const fn bounds(&self) -> &Aabb<D> {
        self.entity.bounds()
    }

    /// Centre of the bounds.
    pub fn position(&self) -> Point<D> {
        self.entity.position()
    }

    /// Location and orientation of the body.
    pub fn pose(&self) -> Position<D> {
        Position::new(self.position(), self.orientation)
    }

    /// Orientation in radians.
    pub const fn orientation(&self) -> f64 {
        self.orientation
    }

    /// Kinematic limits.
    pub const fn limits(&self) -> &MotionLimits {
        &self.limits
    }

    /// Whether the body is kept on the ground surface.
    pub const fn is_on_ground(&self) -> bool {
        self.on_ground
    }

    /// Linear velocity per second.
    pub const fn linear_velocity(&self) -> &D::Coords {
        &self.linear_velocity
    }

    /// Linear velocity expressed per `unit`.
    pub fn linear_velocity_in(&self, unit: TimeUnit) -> D::Coords {
        scale::<D>(&self.linear_velocity, unit.seconds())
    }

    /// Linear speed per second.
    pub fn linear_speed(&self) -> f64 {
        norm::<D>(&self.linear_velocity)
    }

    /// Linear speed expressed per `unit`.
    pub fn linear_speed_in(&self, unit: TimeUnit) -> f64 {
        unit.per_unit(self.linear_speed())
    }

    /// Angular velocity per second (signed).
    pub const fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// Angular speed expressed per `unit`.
    pub fn angular_speed_in(&self, unit: TimeUnit) -> f64 {
        unit.per_unit(self.angular_velocity.abs())
    }

    /// Move the body to `bounds` with `orientation`, recording the per-second
    /// velocities that produced the move.
    pub fn apply_motion(
        &mut self,
        bounds: Aabb<D>,
        orientation: f64,
        linear_velocity: D::Coords,
        angular_velocity: f64,
    ) {
        self.entity.set_bounds(bounds);
        self.orientation = orientation;
        self.linear_velocity = linear_velocity;
        self.angular_velocity = angular_velocity;
    }

    /// Teleport the body, keeping its extents and resetting velocities.
    pub fn teleport(&mut self, pose: &Position<D>) {
        let bounds = self.entity.bounds().recentered(&pose.point);
        self.apply_motion(bounds, pose.orientation, D::Coords::default(), 0.0);
    }
}

impl<D: Dimension> PartialEq for MobileEntity<D> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}
