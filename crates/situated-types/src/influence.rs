//! Influences (agent intents) and environmental actions (validated effects).
//!
//! Agents never mutate the world directly. Each tick they emit an
//! [`Influence`] addressed to an entity; the place's influence solver turns
//! the influences into at most one [`EnvironmentalAction`] per entity, and
//! only actions are applied to the spatial tree.

use serde::{Deserialize, Serialize};

use crate::geometry::{Dimension, Position, norm};
use crate::ids::{AgentId, EntityId};

/// A local rigid transformation: a translation plus a rotation in the
/// ground plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Transform<D: Dimension> {
    /// Displacement vector.
    pub translation: D::Coords,
    /// Rotation around the vertical axis, radians.
    pub rotation: f64,
}

impl<D: Dimension> Transform<D> {
    /// Create a transform.
    pub const fn new(translation: D::Coords, rotation: f64) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// A pure translation.
    pub const fn translation(translation: D::Coords) -> Self {
        Self::new(translation, 0.0)
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Length of the translation.
    pub fn distance(&self) -> f64 {
        norm::<D>(&self.translation)
    }

    /// Whether the transform moves nothing.
    pub fn is_identity(&self) -> bool {
        self.distance() <= 0.0 && self.rotation.abs() <= 0.0
    }
}

/// An agent's request to transform an entity during the current tick.
///
/// Ephemeral: created each tick, consumed by the solver, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Influence<D: Dimension> {
    /// The agent emitting the influence.
    pub influencer: AgentId,
    /// The entity the influence is addressed to.
    pub target: EntityId,
    /// Desired local transformation for this tick.
    pub transform: Transform<D>,
}

impl<D: Dimension> Influence<D> {
    /// Create an influence.
    pub const fn new(influencer: AgentId, target: EntityId, transform: Transform<D>) -> Self {
        Self {
            influencer,
            target,
            transform,
        }
    }

    /// An influence requesting a pure displacement.
    pub const fn displacement(
        influencer: AgentId,
        target: EntityId,
        translation: D::Coords,
    ) -> Self {
        Self::new(influencer, target, Transform::translation(translation))
    }
}

/// The validated, authoritative transformation applied to one entity for
/// one tick.
///
/// Immutable once constructed. Carries the entity's pose immediately before
/// application so the place can roll the move back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct EnvironmentalAction<D: Dimension> {
    /// The affected entity.
    target: EntityId,
    /// The agent whose influence produced the action.
    influencer: AgentId,
    /// The transformation to apply.
    transform: Transform<D>,
    /// Pose of the entity before the action.
    previous: Position<D>,
    /// Tick for which the action was computed.
    tick: u64,
}

impl<D: Dimension> EnvironmentalAction<D> {
    /// Create an action.
    pub const fn new(
        target: EntityId,
        influencer: AgentId,
        transform: Transform<D>,
        previous: Position<D>,
        tick: u64,
    ) -> Self {
        Self {
            target,
            influencer,
            transform,
            previous,
            tick,
        }
    }

    /// The affected entity.
    pub const fn target(&self) -> EntityId {
        self.target
    }

    /// The agent whose influence produced the action.
    pub const fn influencer(&self) -> AgentId {
        self.influencer
    }

    /// The transformation to apply.
    pub const fn transform(&self) -> &Transform<D> {
        &self.transform
    }

    /// Pose of the entity before the action.
    pub const fn previous(&self) -> &Position<D> {
        &self.previous
    }

    /// Tick for which the action was computed.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Pose of the entity once the action is applied.
    pub fn resulting_pose(&self) -> Position<D> {
        Position::new(
            self.previous.point.translated(&self.transform.translation),
            self.previous.orientation + self.transform.rotation,
        )
    }
}
