//! Geography of a situated environment: spatial indexes, query regions, and
//! terrain.
//!
//! This crate owns everything a place needs to know *where* things are. It
//! performs no simulation on its own; the core crate drives it tick by tick.
//!
//! # Modules
//!
//! - [`tree`] -- Arena-backed partition trees: [`StaticTree`] (built once)
//!   and [`DynamicTree`] (insert, remove, move), with nearest-neighbour and
//!   region queries shared through [`PartitionTree`].
//! - [`frustum`] -- The [`Region`] predicate trait and agent [`Frustum`]s.
//! - [`ground`] -- The [`Ground`] provider trait, [`FlatGround`], and
//!   [`HeightmapGround`].
//! - [`error`] -- [`TreeError`] and [`GroundError`].

pub mod error;
pub mod frustum;
pub mod ground;
pub mod tree;

// Re-export primary types at crate root.
pub use error::{GroundError, TreeError};
pub use frustum::{Frustum, Region};
pub use ground::{FlatGround, Ground, HeightmapGround};
pub use tree::{
    DynamicTree, NodeId, PartitionPolicy, PartitionTree, StaticTree, TreeConfig, TreeItem,
};
