//! Static tree: built once from a fixed collection, never mutated.

use core::ops::Deref;

use situated_types::{Aabb, Dimension, WorldEntity};

use super::{PartitionTree, TreeConfig, TreeItem};
use crate::error::TreeError;

/// Immutable spatial index over the static geometry of a place.
///
/// Rebuilding means building a new tree.
#[derive(Debug, Clone)]
pub struct StaticTree<D: Dimension, T = WorldEntity<D>> {
    tree: PartitionTree<D, T>,
}

impl<D: Dimension, T: TreeItem<D>> StaticTree<D, T> {
    /// Build a tree over `items`; the domain is the union of their bounds.
    ///
    /// Duplicate ids keep the last item.
    pub fn build(items: Vec<T>, config: TreeConfig) -> Result<Self, TreeError> {
        let domain = items
            .iter()
            .map(|item| *item.bounds())
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Self::build_in(domain, items, config)
    }

    /// Build a tree over `items` partitioning `domain`.
    pub fn build_in(domain: Aabb<D>, items: Vec<T>, config: TreeConfig) -> Result<Self, TreeError> {
        let mut tree = PartitionTree::with_domain(domain, config)?;
        tree.load(items)?;
        tracing::debug!(
            dimension = D::NAME,
            entities = tree.len(),
            nodes = tree.node_count(),
            "static tree built"
        );
        Ok(Self { tree })
    }

    /// An empty tree.
    pub fn empty(config: TreeConfig) -> Result<Self, TreeError> {
        Self::build(Vec::new(), config)
    }

    /// The underlying partition.
    pub const fn partition(&self) -> &PartitionTree<D, T> {
        &self.tree
    }
}

impl<D: Dimension, T> Deref for StaticTree<D, T> {
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
    use situated_types::{Dim2, Point};

    fn grid(n: usize) -> Vec<WorldEntity<Dim2>> {
        let mut out = Vec::new();
        for i in 0..n {
            for j in 0..n {
                #[allow(clippy::cast_precision_loss)]
                let (x, y) = (i as f64 * 3.0, j as f64 * 3.0);
                out.push(WorldEntity::new(Aabb::new(
                    Point::new([x, y]),
                    Point::new([x + 1.0, y + 1.0]),
                )));
            }
        }
        out
    }

    #[test]
    fn build_splits_until_leaves_fit() {
        let config = TreeConfig {
            policy: PartitionPolicy::CenterSplit,
            max_entities_per_leaf: 4,
            max_depth: 16,
        };
        let tree = StaticTree::build(grid(6), config).unwrap();
        assert_eq!(tree.len(), 36);
        assert!(tree.node_count() > 1);
        for entity in tree.iter() {
            let leaf = tree.leaf_of(entity.id()).unwrap();
            assert!(tree.is_leaf(leaf));
            assert!(tree.leaf_entities(leaf).len() <= 4);
            assert!(tree.leaf_entities(leaf).contains(&entity.id()));
        }
    }

    #[test]
    fn depth_bound_stops_splitting() {
        let config = TreeConfig {
            policy: PartitionPolicy::MedianSplit,
            max_entities_per_leaf: 1,
            max_depth: 2,
        };
        let tree = StaticTree::build(grid(4), config).unwrap();
        for entity in tree.iter() {
            let leaf = tree.leaf_of(entity.id()).unwrap();
            assert!(tree.depth(leaf).unwrap() <= 2);
        }
    }

    #[test]
    fn empty_tree_has_no_nearest() {
        let tree: StaticTree<Dim2> = StaticTree::empty(TreeConfig::default()).unwrap();
        assert!(tree.is_empty());
        assert!(tree.nearest(&Point::new([0.0, 0.0])).is_none());
        assert!(tree.query(&Aabb::new(Point::new([0.0, 0.0]), Point::new([1.0, 1.0]))).is_empty());
    }

    #[test]
    fn zero_leaf_capacity_is_rejected() {
        let config = TreeConfig {
            max_entities_per_leaf: 0,
            ..TreeConfig::default()
        };
        assert!(matches!(
            StaticTree::build(grid(1), config),
            Err(TreeError::InvalidConfig { .. })
        ));
    }
}
