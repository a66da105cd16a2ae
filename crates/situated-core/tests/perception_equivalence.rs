//! Property tests for perception generation.
//!
//! All four generators must deliver the same percepts as a brute-force scan
//! of both trees, for every partition policy.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use situated_core::{PerceptionAlgorithm, PerceptionGeneratorType, PerceptionRequest};
use situated_types::{
    Aabb, AgentId, Classification, Dim2, EntityId, MobileEntity, MotionLimits, PlaceId, Point, WorldEntity,
};
use situated_world::{DynamicTree, Frustum, PartitionPolicy, Region, StaticTree, TreeConfig};

fn domain() -> Aabb<Dim2> {
    Aabb::new(Point::new([0.0, 0.0]), Point::new([50.0, 50.0]))
}

fn boxes(max: usize) -> impl Strategy<Value = Vec<Aabb<Dim2>>> {
    prop::collection::vec((0.0..48.0f64, 0.0..48.0f64, 0.1..2.0f64, 0.1..2.0f64), 1..max).prop_map(|raw| {
        raw.into_iter()
            .map(|(x, y, w, h)| Aabb::new(Point::new([x, y]), Point::new([x + w, y + h])))
            .collect()
    })
}

fn frustums() -> impl Strategy<Value = Vec<Frustum<Dim2>>> {
    prop::collection::vec(
        prop_oneof![
            (0.0..50.0f64, 0.0..50.0f64, 0.0..15.0f64)
                .prop_map(|(x, y, r)| Frustum::sphere(Point::new([x, y]), r)),
            (0.0..45.0f64, 0.0..45.0f64, 0.0..10.0f64, 0.0..10.0f64).prop_map(|(x, y, w, h)| {
                Frustum::boxed(Aabb::new(Point::new([x, y]), Point::new([x + w, y + h])))
            }),
        ],
        1..3,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn generators_match_brute_force(
        statics in boxes(40),
        bodies in boxes(40),
        frustums in frustums(),
        policy in prop_oneof![
            Just(PartitionPolicy::CenterSplit),
            Just(PartitionPolicy::MedianSplit),
            Just(PartitionPolicy::OrthantSplit),
        ],
    ) {
        let config = TreeConfig { policy, max_entities_per_leaf: 3, max_depth: 8 };
        let statics: Vec<WorldEntity<Dim2>> = statics.into_iter().map(WorldEntity::new).collect();
        let bodies: Vec<MobileEntity<Dim2>> = bodies
            .into_iter()
            .map(|b| MobileEntity::new(b, MotionLimits::UNBOUNDED))
            .collect();
        let observer = bodies[0].id();

        let mut expected = BTreeSet::new();
        for frustum in &frustums {
            for entity in &statics {
                if frustum.classify(entity.bounds()) != Classification::Outside {
                    expected.insert(entity.id());
                }
            }
            for body in bodies.iter().filter(|body| body.id() != observer) {
                if frustum.classify(body.bounds()) != Classification::Outside {
                    expected.insert(body.id());
                }
            }
        }

        let static_tree = StaticTree::build_in(domain(), statics, config).unwrap();
        let mut dynamic_tree = DynamicTree::new(domain(), config).unwrap();
        for body in bodies {
            dynamic_tree.insert(body).unwrap();
        }
        let request = frustums
            .into_iter()
            .fold(PerceptionRequest::new(AgentId::new(), observer), PerceptionRequest::with_frustum);

        let place = PlaceId::new();
        for generator in PerceptionGeneratorType::ALL {
            let algorithm = PerceptionAlgorithm::new(generator, 3).unwrap();
            let lists = algorithm.perceive(place, &static_tree, &dynamic_tree, std::slice::from_ref(&request));
            prop_assert_eq!(lists.len(), 1);
            let seen: BTreeSet<EntityId> = lists[0].percepts().map(|p| p.entity).collect();
            prop_assert_eq!(&seen, &expected, "{:?} with {:?}", generator, policy);
            prop_assert_eq!(lists[0].len(), expected.len());
        }
    }
}
