//! Spatial partition trees over entity bounds.
//!
//! Both tree flavours share one arena-backed [`PartitionTree`]:
//!
//! - Nodes live in a `Vec` and are addressed by [`NodeId`] handles; released
//!   slots are recycled through a free list.
//! - Each node has a fixed partition `region` and tight `bounds` (the union
//!   of everything below it). An entity is routed to the child whose region
//!   contains the centre of its bounds, so bounds may overhang the region;
//!   queries prune on tight bounds, never on regions.
//! - Every entry caches the leaf that holds it, so removal and moves start
//!   at the leaf and walk upward instead of descending from the root.
//!
//! [`StaticTree`] is built once by a top-down builder and never mutated.
//! [`DynamicTree`] supports insert, remove, and move, splitting overfull
//! leaves with the configured [`PartitionPolicy`] and collapsing subtrees
//! whose population falls back under the leaf capacity.

mod arena;
mod dynamic_tree;
mod policy;
mod query;
mod static_tree;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use situated_types::{Aabb, Dimension, EntityId, MobileEntity, WorldEntity};

use crate::error::TreeError;

pub use dynamic_tree::DynamicTree;
pub use policy::PartitionPolicy;
pub use static_tree::StaticTree;

/// Handle to a node in a tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node; always allocated.
    pub const ROOT: Self = Self(0);

    /// Arena slot index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A value a tree can index: anything wrapping a [`WorldEntity`].
pub trait TreeItem<D: Dimension>: Send + Sync {
    /// The wrapped entity.
    fn world_entity(&self) -> &WorldEntity<D>;

    /// Mutable access to the wrapped entity.
    fn world_entity_mut(&mut self) -> &mut WorldEntity<D>;

    /// Identifier of the entity.
    fn id(&self) -> EntityId {
        self.world_entity().id()
    }

    /// Current bounds of the entity.
    fn bounds(&self) -> &Aabb<D> {
        self.world_entity().bounds()
    }
}

impl<D: Dimension> TreeItem<D> for WorldEntity<D> {
    fn world_entity(&self) -> &WorldEntity<D> {
        self
    }

    fn world_entity_mut(&mut self) -> &mut WorldEntity<D> {
        self
    }
}

impl<D: Dimension> TreeItem<D> for MobileEntity<D> {
    fn world_entity(&self) -> &WorldEntity<D> {
        self.entity()
    }

    fn world_entity_mut(&mut self) -> &mut WorldEntity<D> {
        self.entity_mut()
    }
}

/// Partitioning parameters shared by both tree flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// How a leaf region is cut into child regions.
    pub policy: PartitionPolicy,
    /// A leaf holding more entities than this is split.
    pub max_entities_per_leaf: usize,
    /// Leaves at this depth are never split.
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            policy: PartitionPolicy::default(),
            max_entities_per_leaf: 8,
            max_depth: 16,
        }
    }
}

impl TreeConfig {
    /// Check that the configuration can produce a partition.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.max_entities_per_leaf == 0 {
            return Err(TreeError::InvalidConfig {
                reason: "max_entities_per_leaf must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Contents of a node.
#[derive(Debug, Clone)]
enum NodeKind {
    /// Entities stored directly in the node.
    Leaf(Vec<EntityId>),
    /// Child nodes partitioning the region.
    Branch(Vec<NodeId>),
}

/// One arena node.
#[derive(Debug, Clone)]
struct Node<D: Dimension> {
    /// Fixed partition cell.
    region: Aabb<D>,
    /// Union of the bounds of everything below; `None` when empty.
    bounds: Option<Aabb<D>>,
    /// Parent node, `None` for the root.
    parent: Option<NodeId>,
    /// Distance from the root.
    depth: usize,
    /// Number of entities in the subtree.
    count: usize,
    /// Leaf entities or child nodes.
    kind: NodeKind,
}

impl<D: Dimension> Node<D> {
    const fn leaf(region: Aabb<D>, parent: Option<NodeId>, depth: usize) -> Self {
        Self {
            region,
            bounds: None,
            parent,
            depth,
            count: 0,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }
}

/// An indexed entity and the leaf holding it.
#[derive(Debug, Clone)]
struct Entry<T> {
    item: T,
    leaf: NodeId,
}

/// Arena-backed spatial partition shared by [`StaticTree`] and
/// [`DynamicTree`].
///
/// Read-only queries live here; mutation is exposed by [`DynamicTree`] only.
#[derive(Debug, Clone)]
pub struct PartitionTree<D: Dimension, T> {
    config: TreeConfig,
    nodes: Vec<Option<Node<D>>>,
    free: Vec<NodeId>,
    entries: BTreeMap<EntityId, Entry<T>>,
}

impl<D: Dimension, T: TreeItem<D>> PartitionTree<D, T> {
    /// Partitioning parameters.
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree indexes nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Look up an entity. Absent entities are not an error.
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entries.get(&id).map(|entry| &entry.item)
    }

    /// Whether an entity is indexed.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// All indexed entities, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|entry| &entry.item)
    }

    /// Leaf currently holding an entity.
    pub fn leaf_of(&self, id: EntityId) -> Option<NodeId> {
        self.entries.get(&id).map(|entry| entry.leaf)
    }

    /// Partition region of the root (the tree domain).
    pub fn domain(&self) -> Option<Aabb<D>> {
        self.region(NodeId::ROOT)
    }

    // -------------------------------------------------------------------
    // Node inspection (used by bottom-up traversals)
    // -------------------------------------------------------------------

    /// Partition region of a node.
    pub fn region(&self, node: NodeId) -> Option<Aabb<D>> {
        self.slot(node).map(|n| n.region)
    }

    /// Tight bounds of a node's contents; `None` if empty or unknown.
    pub fn node_bounds(&self, node: NodeId) -> Option<Aabb<D>> {
        self.slot(node).and_then(|n| n.bounds)
    }

    /// Parent of a node.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node).and_then(|n| n.parent)
    }

    /// Depth of a node (root is 0).
    pub fn depth(&self, node: NodeId) -> Option<usize> {
        self.slot(node).map(|n| n.depth)
    }

    /// Children of a branch node; empty for leaves.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        match self.slot(node).map(|n| &n.kind) {
            Some(NodeKind::Branch(children)) => children,
            _ => &[],
        }
    }

    /// Entities stored in a leaf node; empty for branches.
    pub fn leaf_entities(&self, node: NodeId) -> &[EntityId] {
        match self.slot(node).map(|n| &n.kind) {
            Some(NodeKind::Leaf(ids)) => ids,
            _ => &[],
        }
    }

    /// Whether a node is a leaf.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        matches!(self.slot(node).map(|n| &n.kind), Some(NodeKind::Leaf(_)))
    }

    fn slot(&self, node: NodeId) -> Option<&Node<D>> {
        self.nodes.get(node.0).and_then(Option::as_ref)
    }
}
