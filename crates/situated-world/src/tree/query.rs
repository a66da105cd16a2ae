//! Read-only queries shared by both tree flavours.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use situated_types::{Classification, Dimension, Point};

use super::{NodeId, NodeKind, PartitionTree, TreeItem};
use crate::frustum::Region;

impl<D: Dimension, T: TreeItem<D>> PartitionTree<D, T> {
    /// Entity whose bounds are closest to `point`, with that distance.
    ///
    /// Best-first branch and bound: nodes are expanded in order of the
    /// minimum distance from `point` to their tight bounds, and the search
    /// stops once that distance exceeds the best hit. Returns `None` on an
    /// empty tree.
    pub fn nearest(&self, point: &Point<D>) -> Option<(&T, f64)> {
        let root_bounds = self.node_bounds(NodeId::ROOT)?;
        let mut frontier = BinaryHeap::new();
        frontier.push(Reverse((
            OrderedFloat(root_bounds.min_distance_squared(point)),
            NodeId::ROOT,
        )));

        let mut best: Option<(&T, f64)> = None;
        while let Some(Reverse((OrderedFloat(distance), node_id))) = frontier.pop() {
            if best.is_some_and(|(_, found)| distance > found) {
                break;
            }
            let Some(node) = self.slot(node_id) else {
                continue;
            };
            match &node.kind {
                NodeKind::Leaf(ids) => {
                    for entry in ids.iter().filter_map(|id| self.entries.get(id)) {
                        let d = entry.item.bounds().min_distance_squared(point);
                        if best.is_none_or(|(_, found)| d < found) {
                            best = Some((&entry.item, d));
                        }
                    }
                }
                NodeKind::Branch(children) => {
                    for child in children {
                        let Some(bounds) = self.node_bounds(*child) else {
                            continue;
                        };
                        let d = bounds.min_distance_squared(point);
                        if best.is_none_or(|(_, found)| d <= found) {
                            frontier.push(Reverse((OrderedFloat(d), *child)));
                        }
                    }
                }
            }
        }
        best.map(|(item, d)| (item, d.sqrt()))
    }

    /// Every entity not OUTSIDE `region`, with its classification.
    pub fn query<R: Region<D> + ?Sized>(&self, region: &R) -> Vec<(&T, Classification)> {
        let mut hits = Vec::new();
        self.visit(region, |item, classification| hits.push((item, classification)));
        hits
    }

    /// Call `f` for every entity not OUTSIDE `region`.
    ///
    /// Subtrees whose tight bounds miss the region are pruned; subtrees the
    /// region encloses are reported INSIDE without per-entity tests.
    pub fn visit<'a, R, F>(&'a self, region: &R, mut f: F)
    where
        R: Region<D> + ?Sized,
        F: FnMut(&'a T, Classification),
    {
        let mut stack = vec![NodeId::ROOT];
        while let Some(node_id) = stack.pop() {
            let Some(node) = self.slot(node_id) else {
                continue;
            };
            let Some(bounds) = node.bounds else {
                continue;
            };
            if !region.intersects(&bounds) {
                continue;
            }
            if region.encloses(&bounds) {
                self.for_each_in_subtree(node_id, |item| f(item, Classification::Inside));
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(ids) => {
                    for entry in ids.iter().filter_map(|id| self.entries.get(id)) {
                        let classification = region.classify(entry.item.bounds());
                        if classification != Classification::Outside {
                            f(&entry.item, classification);
                        }
                    }
                }
                NodeKind::Branch(children) => stack.extend(children.iter().copied()),
            }
        }
    }

    /// Call `f` for every entity below `node`.
    pub fn for_each_in_subtree<'a, F>(&'a self, node: NodeId, mut f: F)
    where
        F: FnMut(&'a T),
    {
        let mut stack = vec![node];
        while let Some(node_id) = stack.pop() {
            match self.slot(node_id).map(|n| &n.kind) {
                Some(NodeKind::Leaf(ids)) => {
                    for entry in ids.iter().filter_map(|id| self.entries.get(id)) {
                        f(&entry.item);
                    }
                }
                Some(NodeKind::Branch(children)) => stack.extend(children.iter().copied()),
                None => {}
            }
        }
    }
}
