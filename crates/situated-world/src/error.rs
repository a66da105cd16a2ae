//! Error types for the `situated-world` crate.
//!
//! Tree errors indicate an invariant violation in the spatial index and are
//! fatal for the tick that hits them. Ground errors are construction-time
//! only.

use situated_types::EntityId;

/// Errors raised by the spatial partition trees.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The entity is not indexed by the tree.
    #[error("entity not found in tree: {0}")]
    EntityNotFound(EntityId),

    /// An entity's cached leaf does not list the entity.
    #[error("entity {entity} references leaf {node} which does not contain it")]
    CorruptBackReference {
        /// The entity holding the stale reference.
        entity: EntityId,
        /// Index of the referenced node.
        node: usize,
    },

    /// A node handle points at a released or never-allocated arena slot.
    #[error("dangling node handle {node}")]
    DanglingNode {
        /// Index of the missing node.
        node: usize,
    },

    /// The tree configuration cannot produce a valid partition.
    #[error("invalid tree configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },
}

/// Errors raised while building a ground provider.
#[derive(Debug, thiserror::Error)]
pub enum GroundError {
    /// The height grid has no cells.
    #[error("height grid is empty")]
    EmptyGrid,

    /// A row of the height grid has a different width than the first row.
    #[error("height grid row {row} has {found} cells, expected {expected}")]
    RaggedGrid {
        /// Index of the offending row.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// The cell size is zero, negative, or not finite.
    #[error("invalid cell size: {0}")]
    InvalidCellSize(f64),
}
