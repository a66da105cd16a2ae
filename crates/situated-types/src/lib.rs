//! Shared type definitions for the situated multi-agent environment.
//!
//! This crate is the single source of truth for the data that flows
//! between the spatial trees, the perception algorithm, and the
//! influence-reaction pipeline. Nothing here holds behaviour beyond
//! geometry helpers and accessors.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entities, places, portals, agents
//! - [`geometry`] -- The [`Dimension`] capability, points, bounds, positions
//! - [`entity`] -- [`WorldEntity`] and [`MobileEntity`]
//! - [`influence`] -- [`Influence`] and [`EnvironmentalAction`]
//! - [`perception`] -- Percept payloads delivered to agents
//! - [`time`] -- [`TimeUnit`] and the [`ClockSnapshot`] seen by listeners

pub mod entity;
pub mod geometry;
pub mod ids;
pub mod influence;
pub mod perception;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use entity::{MobileEntity, MotionLimits, Semantic, WorldEntity};
pub use geometry::{
    Aabb, Classification, Dim1, Dim1_5, Dim2, Dim3, Dimension, Point, Position, Vector2,
};
pub use ids::{AgentId, EntityId, PlaceId, PortalId};
pub use influence::{EnvironmentalAction, Influence, Transform};
pub use perception::{Capability, GroundPercept, Percept, PerceptKind};
pub use time::{ClockSnapshot, TimeUnit};
