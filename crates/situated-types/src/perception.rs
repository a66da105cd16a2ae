//! Percept payloads delivered to agents each tick.
//!
//! A percept is a classified, agent-visible view of one entity (or of the
//! ground under the agent). Percepts are values: they copy what the agent
//! may know and never reference the live tree.

use serde::{Deserialize, Serialize};

use crate::entity::Semantic;
use crate::geometry::{Aabb, Classification, Dim2, Dimension, Vector2};
use crate::ids::EntityId;

/// A sensing or mobility capability of an agent body.
///
/// Capabilities select which optional parts of a perception are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The body senses the ground under it (height, traversability).
    GroundSensing,
    /// The body steers with potential fields (attraction, repulsion).
    Steering,
}

/// Whether a percept comes from the static or the dynamic tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptKind {
    /// Immutable world geometry.
    Static,
    /// A mobile entity.
    Dynamic,
}

/// A classified view of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Percept<D: Dimension> {
    /// The perceived entity.
    pub entity: EntityId,
    /// Tree of origin.
    pub kind: PerceptKind,
    /// Bounds of the entity at perception time.
    pub bounds: Aabb<D>,
    /// Ground-plane projection of the bounds.
    pub footprint: Aabb<Dim2>,
    /// Semantic tags of the entity.
    pub semantics: Vec<Semantic>,
    /// Relation of the entity to the frustum.
    pub classification: Classification,
    /// Distance from the frustum's eye to the closest point of the bounds.
    pub distance: f64,
}

/// What an agent senses of the ground at its own position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundPercept {
    /// Ground height (`NaN` where the ground is undefined).
    pub height: f64,
    /// Whether the ground can be walked on.
    pub traversable: bool,
    /// Attraction force, for steering bodies.
    pub attraction: Option<Vector2>,
    /// Repulsion force, for steering bodies.
    pub repulsion: Option<Vector2>,
}
