//! Dynamic tree: the mutable index of a place's mobile entities.

use core::ops::Deref;

use situated_types::{Aabb, Dimension, EntityId, MobileEntity};

use super::{NodeId, PartitionTree, TreeConfig, TreeItem};
use crate::error::TreeError;

/// Mutable spatial index supporting insert, remove, and move.
///
/// Moves that keep the entity's centre inside its current leaf region
/// only refresh tight bounds along the leaf's ancestor path. Other moves
/// detach the entity and re-descend from the closest ancestor whose region
/// contains the new centre.
#[derive(Debug, Clone)]
pub struct DynamicTree<D: Dimension, T = MobileEntity<D>> {
    tree: PartitionTree<D, T>,
}

impl<D: Dimension, T: TreeItem<D>> DynamicTree<D, T> {
    /// An empty tree partitioning `domain`.
    pub fn new(domain: Aabb<D>, config: TreeConfig) -> Result<Self, TreeError> {
        Ok(Self {
            tree: PartitionTree::with_domain(domain, config)?,
        })
    }

    /// The underlying partition.
    pub const fn partition(&self) -> &PartitionTree<D, T> {
        &self.tree
    }

    /// Index an entity. An entity with the same id is replaced and returned.
    pub fn insert(&mut self, item: T) -> Result<Option<T>, TreeError> {
        let previous = if self.tree.contains(item.id()) {
            Some(self.remove(item.id())?)
        } else {
            None
        };
        self.tree.attach(item, NodeId::ROOT)?;
        Ok(previous)
    }

    /// Remove an entity and return it.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EntityNotFound`] if the entity is not indexed.
    pub fn remove(&mut self, id: EntityId) -> Result<T, TreeError> {
        let (item, leaf) = self.tree.detach(id)?;
        self.tree.collapse(leaf)?;
        Ok(item)
    }

    /// Move an entity to new bounds.
    pub fn move_entity(&mut self, id: EntityId, bounds: Aabb<D>) -> Result<NodeId, TreeError> {
        self.update(id, |item| item.world_entity_mut().set_bounds(bounds))
    }

    /// Mutate an entity in place, then re-index it under its new bounds.
    ///
    /// Returns the leaf holding the entity afterwards.
    pub fn update<F>(&mut self, id: EntityId, f: F) -> Result<NodeId, TreeError>
    where
        F: FnOnce(&mut T),
    {
        let entry = self
            .tree
            .entries
            .get_mut(&id)
            .ok_or(TreeError::EntityNotFound(id))?;
        f(&mut entry.item);
        let leaf = entry.leaf;
        let centre = entry.item.bounds().center();

        let leaf_region = self
            .tree
            .region(leaf)
            .ok_or_else(|| TreeError::CorruptBackReference {
                entity: id,
                node: leaf.index(),
            })?;
        if leaf_region.contains_point(&centre) {
            self.tree.refresh_bounds(leaf)?;
            return Ok(leaf);
        }

        let from = self.tree.ancestor_containing(leaf, &centre)?;
        let (item, old_leaf) = self.tree.detach(id)?;
        let new_leaf = self.tree.attach(item, from)?;
        self.tree.collapse(old_leaf)?;
        Ok(self.tree.leaf_of(id).unwrap_or(new_leaf))
    }
}

impl<D: Dimension, T> Deref for DynamicTree<D, T> {
    type Target = PartitionTree<D, T>;

    fn deref(&self) -> &Self::Target {
        &self.tree
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::PartitionPolicy;
    use situated_types::{Dim2, MotionLimits, Point, WorldEntity};

    fn domain() -> Aabb<Dim2> {
        Aabb::new(Point::new([0.0, 0.0]), Point::new([100.0, 100.0]))
    }

    fn config() -> TreeConfig {
        TreeConfig {
            policy: PartitionPolicy::OrthantSplit,
            max_entities_per_leaf: 2,
            max_depth: 8,
        }
    }

    fn body(x: f64, y: f64) -> MobileEntity<Dim2> {
        MobileEntity::new(
            Aabb::new(Point::new([x, y]), Point::new([x + 1.0, y + 1.0])),
            MotionLimits::UNBOUNDED,
        )
    }

    #[test]
    fn insert_replaces_duplicates() {
        let mut tree = DynamicTree::new(domain(), config()).unwrap();
        let first = body(10.0, 10.0);
        let id = first.id();
        assert!(tree.insert(first).unwrap().is_none());

        let replacement = MobileEntity::from_entity(
            WorldEntity::with_id(id, Aabb::point(Point::new([50.0, 50.0]))),
            MotionLimits::UNBOUNDED,
        );
        let previous = tree.insert(replacement).unwrap();
        assert_eq!(previous.map(|p| p.id()), Some(id));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(id).unwrap().position(), Point::new([50.0, 50.0]));
    }

    #[test]
    fn removing_unknown_entity_fails() {
        let mut tree: DynamicTree<Dim2> = DynamicTree::new(domain(), config()).unwrap();
        assert!(matches!(
            tree.remove(EntityId::new()),
            Err(TreeError::EntityNotFound(_))
        ));
    }

    #[test]
    fn round_trip_restores_single_root() {
        let mut tree = DynamicTree::new(domain(), config()).unwrap();
        let mut ids = Vec::new();
        for i in 0..20 {
            let b = body(f64::from(i) * 4.0, f64::from(i) * 3.0);
            ids.push(b.id());
            tree.insert(b).unwrap();
        }
        assert!(tree.node_count() > 1);
        for id in ids {
            tree.remove(id).unwrap();
        }
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.node_bounds(NodeId::ROOT).is_none());
    }

    #[test]
    fn small_move_keeps_leaf() {
        let mut tree = DynamicTree::new(domain(), config()).unwrap();
        for i in 0..10 {
            tree.insert(body(f64::from(i) * 9.0, 80.0)).unwrap();
        }
        let mover = body(10.0, 10.0);
        let id = mover.id();
        tree.insert(mover).unwrap();
        let leaf = tree.leaf_of(id).unwrap();

        let moved = tree
            .move_entity(id, Aabb::new(Point::new([10.5, 10.5]), Point::new([11.5, 11.5])))
            .unwrap();
        assert_eq!(moved, leaf);
        assert_eq!(tree.leaf_of(id), Some(leaf));
        let bounds = tree.node_bounds(leaf).unwrap();
        assert!(bounds.contains(tree.get(id).unwrap().bounds()));
    }

    #[test]
    fn long_move_relocates_and_stays_queryable() {
        let mut tree = DynamicTree::new(domain(), config()).unwrap();
        for i in 0..12 {
            tree.insert(body(f64::from(i) * 8.0, f64::from(i) * 8.0)).unwrap();
        }
        let mover = body(1.0, 1.0);
        let id = mover.id();
        tree.insert(mover).unwrap();

        tree.move_entity(id, Aabb::new(Point::new([90.0, 5.0]), Point::new([91.0, 6.0])))
            .unwrap();
        let leaf = tree.leaf_of(id).unwrap();
        assert!(tree.leaf_entities(leaf).contains(&id));
        assert!(tree.region(leaf).unwrap().contains_point(&Point::new([90.5, 5.5])));

        let (nearest, distance) = tree.nearest(&Point::new([90.5, 5.5])).unwrap();
        assert_eq!(nearest.id(), id);
        assert!(distance.abs() < f64::EPSILON);
        assert_eq!(tree.len(), 13);
    }

    #[test]
    fn entity_outside_domain_is_still_indexed() {
        let mut tree = DynamicTree::new(domain(), config()).unwrap();
        for i in 0..6 {
            tree.insert(body(f64::from(i) * 10.0, 10.0)).unwrap();
        }
        let stray = body(-50.0, -50.0);
        let id = stray.id();
        tree.insert(stray).unwrap();
        let (nearest, _) = tree.nearest(&Point::new([-49.0, -49.0])).unwrap();
        assert_eq!(nearest.id(), id);
        tree.remove(id).unwrap();
        assert!(!tree.contains(id));
    }
}
