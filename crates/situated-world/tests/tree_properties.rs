//! Property tests for the spatial partition trees.
//!
//! Every tree flavour and partition policy must agree with a brute-force
//! linear scan, and a dynamic tree must return to a single empty root after
//! all of its entities are removed.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use proptest::prelude::*;
use situated_types::{Aabb, Classification, Dim2, Dim3, MobileEntity, MotionLimits, Point, WorldEntity};
use situated_world::{DynamicTree, Frustum, PartitionPolicy, Region, StaticTree, TreeConfig};

const POLICIES: [PartitionPolicy; 3] = [
    PartitionPolicy::CenterSplit,
    PartitionPolicy::MedianSplit,
    PartitionPolicy::OrthantSplit,
];

fn config(policy: PartitionPolicy) -> TreeConfig {
    TreeConfig {
        policy,
        max_entities_per_leaf: 3,
        max_depth: 10,
    }
}

fn domain() -> Aabb<Dim2> {
    Aabb::new(Point::new([0.0, 0.0]), Point::new([100.0, 100.0]))
}

fn boxes() -> impl Strategy<Value = Vec<Aabb<Dim2>>> {
    prop::collection::vec((0.0..100.0f64, 0.0..100.0f64, 0.0..6.0f64, 0.0..6.0f64), 0..60)
        .prop_map(|raw| {
            raw.into_iter()
                .map(|(x, y, w, h)| Aabb::new(Point::new([x, y]), Point::new([x + w, y + h])))
                .collect()
        })
}

fn brute_nearest(bounds: &[Aabb<Dim2>], point: &Point<Dim2>) -> Option<f64> {
    bounds
        .iter()
        .map(|b| b.min_distance(point))
        .min_by(f64::total_cmp)
}

proptest! {
    #[test]
    fn static_nearest_matches_linear_scan(
        bounds in boxes(),
        qx in -20.0..120.0f64,
        qy in -20.0..120.0f64,
    ) {
        let point = Point::new([qx, qy]);
        let expected = brute_nearest(&bounds, &point);
        for policy in POLICIES {
            let entities: Vec<WorldEntity<Dim2>> = bounds.iter().copied().map(WorldEntity::new).collect();
            let tree = StaticTree::build(entities, config(policy)).unwrap();
            let found = tree.nearest(&point).map(|(_, d)| d);
            match (found, expected) {
                (Some(f), Some(e)) => prop_assert!((f - e).abs() < 1e-9, "{policy:?}: {f} vs {e}"),
                (None, None) => {}
                other => prop_assert!(false, "{policy:?}: mismatch {other:?}"),
            }
        }
    }

    #[test]
    fn dynamic_nearest_matches_linear_scan(
        bounds in boxes(),
        qx in -20.0..120.0f64,
        qy in -20.0..120.0f64,
    ) {
        let point = Point::new([qx, qy]);
        let expected = brute_nearest(&bounds, &point);
        for policy in POLICIES {
            let mut tree = DynamicTree::new(domain(), config(policy)).unwrap();
            for b in &bounds {
                tree.insert(MobileEntity::new(*b, MotionLimits::UNBOUNDED)).unwrap();
            }
            let found = tree.nearest(&point).map(|(_, d)| d);
            match (found, expected) {
                (Some(f), Some(e)) => prop_assert!((f - e).abs() < 1e-9, "{policy:?}: {f} vs {e}"),
                (None, None) => {}
                other => prop_assert!(false, "{policy:?}: mismatch {other:?}"),
            }
        }
    }

    #[test]
    fn nearest_survives_moves(
        bounds in boxes(),
        shifts in prop::collection::vec((-30.0..30.0f64, -30.0..30.0f64), 60),
        qx in 0.0..100.0f64,
        qy in 0.0..100.0f64,
    ) {
        for policy in POLICIES {
            let mut tree = DynamicTree::new(domain(), config(policy)).unwrap();
            let mut ids = Vec::new();
            for b in &bounds {
                let body = MobileEntity::new(*b, MotionLimits::UNBOUNDED);
                ids.push(body.id());
                tree.insert(body).unwrap();
            }
            let mut moved = Vec::new();
            for (id, (dx, dy)) in ids.iter().zip(&shifts) {
                let target = tree.get(*id).unwrap().bounds().translated(&[*dx, *dy]);
                tree.move_entity(*id, target).unwrap();
                moved.push(target);
            }
            for id in &ids {
                let leaf = tree.leaf_of(*id).unwrap();
                prop_assert!(tree.leaf_entities(leaf).contains(id));
            }
            let point = Point::new([qx, qy]);
            let found = tree.nearest(&point).map(|(_, d)| d);
            let expected = brute_nearest(&moved, &point);
            match (found, expected) {
                (Some(f), Some(e)) => prop_assert!((f - e).abs() < 1e-9),
                (None, None) => {}
                other => prop_assert!(false, "{policy:?}: mismatch {other:?}"),
            }
        }
    }

    #[test]
    fn insert_then_remove_all_round_trips(bounds in boxes()) {
        for policy in POLICIES {
            let mut tree = DynamicTree::new(domain(), config(policy)).unwrap();
            let mut ids = Vec::new();
            for b in &bounds {
                let body = MobileEntity::new(*b, MotionLimits::UNBOUNDED);
                ids.push(body.id());
                tree.insert(body).unwrap();
            }
            prop_assert_eq!(tree.len(), bounds.len());
            for id in ids {
                tree.remove(id).unwrap();
            }
            prop_assert_eq!(tree.len(), 0);
            prop_assert_eq!(tree.node_count(), 1);
        }
    }

    #[test]
    fn frustum_query_matches_exact_classification(
        bounds in boxes(),
        ex in 0.0..100.0f64,
        ey in 0.0..100.0f64,
        radius in 1.0..40.0f64,
    ) {
        let frustum = Frustum::sphere(Point::new([ex, ey]), radius);
        let entities: Vec<WorldEntity<Dim2>> = bounds.iter().copied().map(WorldEntity::new).collect();
        let mut expected: Vec<_> = entities
            .iter()
            .map(|e| (e.id(), frustum.classify(e.bounds())))
            .filter(|(_, c)| *c != Classification::Outside)
            .collect();
        expected.sort();
        for policy in POLICIES {
            let tree = StaticTree::build(entities.clone(), config(policy)).unwrap();
            let mut found: Vec<_> = tree
                .query(&frustum)
                .into_iter()
                .map(|(e, c)| (e.id(), c))
                .collect();
            found.sort();
            prop_assert_eq!(&found, &expected);
        }
    }
}

#[test]
fn three_dimensional_nearest() {
    let entities: Vec<WorldEntity<Dim3>> = (0..40)
        .map(|i| {
            let v = f64::from(i);
            WorldEntity::new(Aabb::new(
                Point::new([v, v * 0.5, v * 0.25]),
                Point::new([v + 1.0, v * 0.5 + 1.0, v * 0.25 + 1.0]),
            ))
        })
        .collect();
    let tree = StaticTree::build(entities, config(PartitionPolicy::OrthantSplit)).unwrap();
    let (hit, distance) = tree.nearest(&Point::new([20.5, 10.5, 5.5])).unwrap();
    assert!(distance.abs() < f64::EPSILON);
    assert_eq!(hit.position(), Point::new([20.5, 10.5, 5.5]));
}
