//! Arena bookkeeping: attaching, detaching, splitting, and collapsing.
//!
//! Node counts and tight bounds are exact at all times. Attaching grows the
//! bounds along one root-to-leaf path; detaching recomputes them upward from
//! the old leaf and stops at the first ancestor whose bounds are unchanged.

use std::collections::BTreeMap;

use situated_types::{Aabb, Dimension, EntityId, Point};

use super::policy::pick_region;
use super::{Entry, Node, NodeId, NodeKind, PartitionTree, TreeConfig, TreeItem};
use crate::error::TreeError;

impl<D: Dimension, T: TreeItem<D>> PartitionTree<D, T> {
    /// An empty tree whose root covers `domain`.
    pub(super) fn with_domain(domain: Aabb<D>, config: TreeConfig) -> Result<Self, TreeError> {
        config.validate()?;
        Ok(Self {
            config,
            nodes: vec![Some(Node::leaf(domain, None, 0))],
            free: Vec::new(),
            entries: BTreeMap::new(),
        })
    }

    // -------------------------------------------------------------------
    // Slot access
    // -------------------------------------------------------------------

    fn node(&self, id: NodeId) -> Result<&Node<D>, TreeError> {
        self.slot(id).ok_or(TreeError::DanglingNode { node: id.0 })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<D>, TreeError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::DanglingNode { node: id.0 })
    }

    fn alloc(&mut self, node: Node<D>) -> NodeId {
        while let Some(id) = self.free.pop() {
            if let Some(slot) = self.nodes.get_mut(id.0) {
                *slot = Some(node);
                return id;
            }
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        id
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.nodes.get_mut(id.0) {
            if slot.take().is_some() {
                self.free.push(id);
            }
        }
    }

    // -------------------------------------------------------------------
    // Attach / detach
    // -------------------------------------------------------------------

    /// Index `item`, descending from `from` (an ancestor region already
    /// chosen for it). Counts and bounds above `from` are updated too.
    ///
    /// The caller guarantees the id is not indexed yet.
    pub(super) fn attach(&mut self, item: T, from: NodeId) -> Result<NodeId, TreeError> {
        let id = item.id();
        let bounds = *item.bounds();
        let centre = bounds.center();

        let mut above = self.node(from)?.parent;
        while let Some(ancestor) = above {
            let node = self.node_mut(ancestor)?;
            node.count = node.count.saturating_add(1);
            node.bounds = Some(node.bounds.map_or(bounds, |b| b.union(&bounds)));
            above = node.parent;
        }

        let mut current = from;
        loop {
            let node = self.node_mut(current)?;
            node.count = node.count.saturating_add(1);
            node.bounds = Some(node.bounds.map_or(bounds, |b| b.union(&bounds)));
            let children = match &mut node.kind {
                NodeKind::Leaf(ids) => {
                    ids.push(id);
                    break;
                }
                NodeKind::Branch(children) => children.clone(),
            };
            current = self.child_for(&children, &centre)?;
        }

        self.entries.insert(id, Entry { item, leaf: current });
        self.split(current)?;
        self.leaf_of(id).ok_or(TreeError::EntityNotFound(id))
    }

    /// Remove an entity from its leaf without collapsing anything.
    ///
    /// Returns the item and the leaf that held it.
    pub(super) fn detach(&mut self, id: EntityId) -> Result<(T, NodeId), TreeError> {
        let entry = self.entries.remove(&id).ok_or(TreeError::EntityNotFound(id))?;
        let leaf = entry.leaf;

        let node = self.node_mut(leaf)?;
        let NodeKind::Leaf(ids) = &mut node.kind else {
            return Err(TreeError::CorruptBackReference { entity: id, node: leaf.0 });
        };
        let Some(position) = ids.iter().position(|e| *e == id) else {
            return Err(TreeError::CorruptBackReference { entity: id, node: leaf.0 });
        };
        ids.swap_remove(position);

        let mut current = Some(leaf);
        while let Some(node_id) = current {
            let node = self.node_mut(node_id)?;
            node.count = node.count.saturating_sub(1);
            current = node.parent;
        }
        self.refresh_bounds(leaf)?;
        Ok((entry.item, leaf))
    }

    /// Recompute tight bounds from `start` upward, stopping at the first
    /// node whose bounds do not change.
    pub(super) fn refresh_bounds(&mut self, start: NodeId) -> Result<(), TreeError> {
        let mut current = Some(start);
        while let Some(node_id) = current {
            let bounds = self.compute_bounds(node_id)?;
            let node = self.node_mut(node_id)?;
            if node.bounds == bounds {
                break;
            }
            node.bounds = bounds;
            current = node.parent;
        }
        Ok(())
    }

    fn compute_bounds(&self, node_id: NodeId) -> Result<Option<Aabb<D>>, TreeError> {
        let node = self.node(node_id)?;
        let union = |acc: Option<Aabb<D>>, b: Aabb<D>| Some(acc.map_or(b, |a| a.union(&b)));
        Ok(match &node.kind {
            NodeKind::Leaf(ids) => ids
                .iter()
                .filter_map(|id| self.entries.get(id))
                .map(|entry| *entry.item.bounds())
                .fold(None, union),
            NodeKind::Branch(children) => children
                .iter()
                .filter_map(|child| self.slot(*child).and_then(|n| n.bounds))
                .fold(None, union),
        })
    }

    /// First proper ancestor of `node` whose region contains `centre`, or
    /// the root.
    pub(super) fn ancestor_containing(
        &self,
        node: NodeId,
        centre: &Point<D>,
    ) -> Result<NodeId, TreeError> {
        let mut current = self.node(node)?.parent;
        while let Some(ancestor) = current {
            let candidate = self.node(ancestor)?;
            if candidate.region.contains_point(centre) {
                return Ok(ancestor);
            }
            current = candidate.parent;
        }
        Ok(NodeId::ROOT)
    }

    fn child_for(&self, children: &[NodeId], centre: &Point<D>) -> Result<NodeId, TreeError> {
        let regions = children
            .iter()
            .map(|child| self.node(*child).map(|n| n.region))
            .collect::<Result<Vec<_>, _>>()?;
        pick_region(&regions, centre)
            .and_then(|index| children.get(index).copied())
            .ok_or_else(|| TreeError::InvalidConfig {
                reason: "branch node without children".to_owned(),
            })
    }

    // -------------------------------------------------------------------
    // Split / collapse
    // -------------------------------------------------------------------

    /// Split `leaf` (and, recursively, its new children) while it holds more
    /// than `max_entities_per_leaf` entities and is above `max_depth`.
    pub(super) fn split(&mut self, leaf: NodeId) -> Result<(), TreeError> {
        let mut pending = vec![leaf];
        while let Some(node_id) = pending.pop() {
            let node = self.node(node_id)?;
            let NodeKind::Leaf(ids) = &node.kind else {
                continue;
            };
            if ids.len() <= self.config.max_entities_per_leaf || node.depth >= self.config.max_depth {
                continue;
            }
            let centres: Vec<Point<D>> = ids
                .iter()
                .filter_map(|id| self.entries.get(id))
                .map(|entry| entry.item.bounds().center())
                .collect();
            let coincident = centres
                .split_first()
                .is_some_and(|(first, rest)| rest.iter().all(|c| c.distance_squared(first) <= 0.0));
            if coincident {
                continue;
            }

            let regions = self.config.policy.child_regions(&node.region, &centres);
            let depth = node.depth.saturating_add(1);
            let mut buckets: Vec<Vec<EntityId>> = vec![Vec::new(); regions.len()];
            for id in ids {
                let Some(entry) = self.entries.get(id) else {
                    continue;
                };
                let index = pick_region(&regions, &entry.item.bounds().center()).unwrap_or(0);
                if let Some(bucket) = buckets.get_mut(index) {
                    bucket.push(*id);
                }
            }

            let mut children = Vec::with_capacity(regions.len());
            for (region, bucket) in regions.into_iter().zip(buckets) {
                let mut child = Node::leaf(region, Some(node_id), depth);
                child.count = bucket.len();
                for id in &bucket {
                    if let Some(entry) = self.entries.get(id) {
                        let b = *entry.item.bounds();
                        child.bounds = Some(child.bounds.map_or(b, |a| a.union(&b)));
                    }
                }
                child.kind = NodeKind::Leaf(bucket);
                let child_id = self.alloc(child);
                children.push(child_id);
            }

            for child_id in &children {
                for id in self.leaf_entities(*child_id).to_vec() {
                    if let Some(entry) = self.entries.get_mut(&id) {
                        entry.leaf = *child_id;
                    }
                }
            }
            pending.extend(children.iter().copied());
            self.node_mut(node_id)?.kind = NodeKind::Branch(children);
        }
        Ok(())
    }

    /// Collapse the topmost ancestor of `leaf` whose subtree fits in one
    /// leaf back into a leaf.
    pub(super) fn collapse(&mut self, leaf: NodeId) -> Result<(), TreeError> {
        let mut target = None;
        let mut current = self.slot(leaf).and_then(|n| n.parent);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            if node.count <= self.config.max_entities_per_leaf {
                target = Some(node_id);
            }
            current = node.parent;
        }
        let Some(target) = target else {
            return Ok(());
        };

        let mut gathered = Vec::new();
        let mut stack: Vec<NodeId> = self.children(target).to_vec();
        while let Some(node_id) = stack.pop() {
            let node = self.node(node_id)?;
            match &node.kind {
                NodeKind::Leaf(ids) => gathered.extend(ids.iter().copied()),
                NodeKind::Branch(children) => stack.extend(children.iter().copied()),
            }
            self.release(node_id);
        }
        for id in &gathered {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.leaf = target;
            }
        }
        self.node_mut(target)?.kind = NodeKind::Leaf(gathered);
        Ok(())
    }

    /// Bulk-load `items` under the root and split top-down.
    pub(super) fn load(&mut self, items: impl IntoIterator<Item = T>) -> Result<(), TreeError> {
        for item in items {
            self.entries.insert(item.id(), Entry { item, leaf: NodeId::ROOT });
        }
        let ids: Vec<EntityId> = self.entries.keys().copied().collect();
        let root = self.node_mut(NodeId::ROOT)?;
        root.count = ids.len();
        root.kind = NodeKind::Leaf(ids);
        self.refresh_bounds(NodeId::ROOT)?;
        self.split(NodeId::ROOT)
    }
}
