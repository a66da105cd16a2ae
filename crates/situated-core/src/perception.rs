//! Perception: which entities each agent senses this tick.
//!
//! Every request names the agent's body, its frustums, and its
//! capabilities. The [`PerceptionAlgorithm`] answers a batch of requests
//! against a place's static and dynamic trees in one of four ways:
//!
//! - **top-down** -- each frustum descends both trees, pruning subtrees whose
//!   tight bounds it misses and reporting enclosed subtrees wholesale;
//! - **bottom-up** -- each frustum is first registered on the tree nodes it
//!   encloses (or on the leaves it only partly covers); then every entity
//!   walks from its leaf to the root and collects the registrations it meets.
//!
//! Both run either sequentially or on a fixed-size rayon pool, and all four
//! variants produce identical lists. The perceiving agent's own body is
//! never part of its list.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use situated_types::{
    AgentId, Capability, Classification, Dimension, EntityId, GroundPercept, Percept, PerceptKind,
    PlaceId, Point, WorldEntity,
};
use situated_world::{DynamicTree, Frustum, Ground, NodeId, PartitionTree, Region, StaticTree, TreeItem};

use crate::place::Place;

/// Which perception algorithm a place runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptionGeneratorType {
    /// Top-down traversal on the calling thread.
    #[default]
    LocalSequentialTopDown,
    /// Top-down traversal, one request per pool task.
    LocalThreadedTopDown,
    /// Bottom-up traversal on the calling thread.
    LocalSequentialBottomUp,
    /// Bottom-up traversal, registrations and upward walks on the pool.
    LocalThreadedBottomUp,
}

impl PerceptionGeneratorType {
    /// All variants.
    pub const ALL: [Self; 4] = [
        Self::LocalSequentialTopDown,
        Self::LocalThreadedTopDown,
        Self::LocalSequentialBottomUp,
        Self::LocalThreadedBottomUp,
    ];

    /// Whether the variant needs a worker pool.
    pub const fn is_threaded(self) -> bool {
        matches!(self, Self::LocalThreadedTopDown | Self::LocalThreadedBottomUp)
    }

    /// Whether the variant walks from entities up to frustum registrations.
    pub const fn is_bottom_up(self) -> bool {
        matches!(self, Self::LocalSequentialBottomUp | Self::LocalThreadedBottomUp)
    }
}

/// Errors raised by perception.
#[derive(Debug, thiserror::Error)]
pub enum PerceptionError {
    /// The worker pool could not be started.
    #[error("failed to build perception worker pool: {source}")]
    ThreadPool {
        /// The underlying rayon error.
        #[from]
        source: rayon::ThreadPoolBuildError,
    },

    /// A perception list was resolved against a place that did not produce it.
    #[error("perception list belongs to place {expected}, not {found}")]
    ForeignPlace {
        /// Place that produced the list.
        expected: PlaceId,
        /// Place the caller passed.
        found: PlaceId,
    },
}

/// One agent's perception request for the current tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PerceptionRequest<D: Dimension> {
    /// The perceiving agent.
    pub agent: AgentId,
    /// The agent's body, excluded from its own percepts.
    pub body: EntityId,
    /// Sensing regions.
    pub frustums: Vec<Frustum<D>>,
    /// Capabilities selecting the optional ground percept.
    pub capabilities: BTreeSet<Capability>,
}

impl<D: Dimension> PerceptionRequest<D> {
    /// A request without frustums or capabilities.
    pub const fn new(agent: AgentId, body: EntityId) -> Self {
        Self {
            agent,
            body,
            frustums: Vec::new(),
            capabilities: BTreeSet::new(),
        }
    }

    /// Add a frustum.
    #[must_use]
    pub fn with_frustum(mut self, frustum: Frustum<D>) -> Self {
        self.frustums.push(frustum);
        self
    }

    /// Add a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }
}

/// The percepts produced for one agent in one tick.
///
/// Static and dynamic percepts are ordered by entity id. The ground percept
/// is computed on first access and memoised; it only exists for agents with
/// [`Capability::GroundSensing`] standing in a place that has ground.
#[derive(Debug, Clone)]
pub struct PerceptionList<D: Dimension> {
    agent: AgentId,
    body: EntityId,
    place: PlaceId,
    capabilities: BTreeSet<Capability>,
    static_percepts: Vec<Percept<D>>,
    dynamic_percepts: Vec<Percept<D>>,
    ground_at: Option<(f64, f64)>,
    ground: OnceLock<Option<GroundPercept>>,
}

impl<D: Dimension> PerceptionList<D> {
    /// The perceiving agent.
    pub const fn agent(&self) -> AgentId {
        self.agent
    }

    /// The agent's body.
    pub const fn body(&self) -> EntityId {
        self.body
    }

    /// Place the list was produced in.
    pub const fn place(&self) -> PlaceId {
        self.place
    }

    /// Percepts of static entities.
    pub fn static_percepts(&self) -> &[Percept<D>] {
        &self.static_percepts
    }

    /// Percepts of mobile entities.
    pub fn dynamic_percepts(&self) -> &[Percept<D>] {
        &self.dynamic_percepts
    }

    /// Every percept, static ones first.
    pub fn percepts(&self) -> impl Iterator<Item = &Percept<D>> {
        self.static_percepts.iter().chain(&self.dynamic_percepts)
    }

    /// Number of entity percepts.
    pub fn len(&self) -> usize {
        self.static_percepts.len().saturating_add(self.dynamic_percepts.len())
    }

    /// Whether the agent perceives no entity.
    pub fn is_empty(&self) -> bool {
        self.static_percepts.is_empty() && self.dynamic_percepts.is_empty()
    }

    /// Whether the agent perceives `entity`.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.percepts().any(|p| p.entity == entity)
    }

    /// The ground percept under the agent's body, computed once.
    ///
    /// `place` must be the place that produced the list.
    pub fn ground(&self, place: &Place<D>) -> Result<Option<&GroundPercept>, PerceptionError> {
        if place.id() != self.place {
            return Err(PerceptionError::ForeignPlace {
                expected: self.place,
                found: place.id(),
            });
        }
        let percept = self.ground.get_or_init(|| {
            if !self.capabilities.contains(&Capability::GroundSensing) {
                return None;
            }
            let (x, y) = self.ground_at?;
            let ground = place.ground()?;
            Some(sense_ground(
                ground,
                x,
                y,
                self.capabilities.contains(&Capability::Steering),
            ))
        });
        Ok(percept.as_ref())
    }
}

fn sense_ground(ground: &dyn Ground, x: f64, y: f64, steering: bool) -> GroundPercept {
    GroundPercept {
        height: ground.height_at(x, y),
        traversable: ground.is_traversable(x, y),
        attraction: steering.then(|| ground.attraction_at(x, y)),
        repulsion: steering.then(|| ground.repulsion_at(x, y)),
    }
}

/// Accumulates percepts for one request, merging duplicates from
/// overlapping frustums: INSIDE wins over SPANNING, the shortest distance
/// is kept.
#[derive(Debug)]
struct ListBuilder<D: Dimension> {
    statics: BTreeMap<EntityId, Percept<D>>,
    dynamics: BTreeMap<EntityId, Percept<D>>,
}

impl<D: Dimension> ListBuilder<D> {
    const fn new() -> Self {
        Self {
            statics: BTreeMap::new(),
            dynamics: BTreeMap::new(),
        }
    }

    fn add(
        &mut self,
        kind: PerceptKind,
        entity: &WorldEntity<D>,
        classification: Classification,
        eye: &Point<D>,
    ) {
        let distance = entity.bounds().min_distance(eye);
        let percepts = match kind {
            PerceptKind::Static => &mut self.statics,
            PerceptKind::Dynamic => &mut self.dynamics,
        };
        match percepts.entry(entity.id()) {
            Entry::Occupied(mut slot) => {
                let percept = slot.get_mut();
                if classification == Classification::Inside {
                    percept.classification = Classification::Inside;
                }
                percept.distance = percept.distance.min(distance);
            }
            Entry::Vacant(slot) => {
                slot.insert(Percept {
                    entity: entity.id(),
                    kind,
                    bounds: *entity.bounds(),
                    footprint: entity.bounds().footprint(),
                    semantics: entity.semantics().iter().cloned().collect(),
                    classification,
                    distance,
                });
            }
        }
    }

    fn finish(
        self,
        place: PlaceId,
        request: &PerceptionRequest<D>,
        bodies: &DynamicTree<D>,
    ) -> PerceptionList<D> {
        PerceptionList {
            agent: request.agent,
            body: request.body,
            place,
            capabilities: request.capabilities.clone(),
            static_percepts: self.statics.into_values().collect(),
            dynamic_percepts: self.dynamics.into_values().collect(),
            ground_at: bodies.get(request.body).map(|b| b.position().footprint()),
            ground: OnceLock::new(),
        }
    }
}

/// How much of a node a frustum covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    /// The frustum encloses the node's tight bounds.
    Whole,
    /// The frustum intersects a leaf without enclosing it.
    Partial,
}

/// A frustum registered on a tree node during the bottom-up first phase.
#[derive(Debug, Clone, Copy)]
struct Registration<'a, D: Dimension> {
    request: usize,
    frustum: &'a Frustum<D>,
    coverage: Coverage,
}

/// One entity sensed by one request during the bottom-up second phase.
#[derive(Debug)]
struct Hit<'a, D: Dimension> {
    request: usize,
    entity: &'a WorldEntity<D>,
    classification: Classification,
    eye: Point<D>,
}

type RegistrationTable<'a, D> = BTreeMap<NodeId, Vec<Registration<'a, D>>>;

/// Runs perception requests against a place's trees.
#[derive(Debug)]
pub struct PerceptionAlgorithm {
    generator: PerceptionGeneratorType,
    pool: Option<ThreadPool>,
}

impl PerceptionAlgorithm {
    /// Create the algorithm, starting a pool of `worker_threads` workers for
    /// the threaded variants.
    pub fn new(generator: PerceptionGeneratorType, worker_threads: usize) -> Result<Self, PerceptionError> {
        let pool = if generator.is_threaded() {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(worker_threads.max(1))
                    .thread_name(|index| format!("perception-{index}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self { generator, pool })
    }

    /// The variant in use.
    pub const fn generator(&self) -> PerceptionGeneratorType {
        self.generator
    }

    /// Produce one list per request, in request order.
    pub fn perceive<D: Dimension>(
        &self,
        place: PlaceId,
        statics: &StaticTree<D>,
        bodies: &DynamicTree<D>,
        requests: &[PerceptionRequest<D>],
    ) -> Vec<PerceptionList<D>> {
        let lists = if self.generator.is_bottom_up() {
            self.bottom_up(place, statics, bodies, requests)
        } else {
            self.top_down(place, statics, bodies, requests)
        };
        tracing::trace!(
            place = %place,
            generator = ?self.generator,
            requests = requests.len(),
            "perception generated"
        );
        lists
    }

    fn top_down<D: Dimension>(
        &self,
        place: PlaceId,
        statics: &StaticTree<D>,
        bodies: &DynamicTree<D>,
        requests: &[PerceptionRequest<D>],
    ) -> Vec<PerceptionList<D>> {
        let perceive_one = |request: &PerceptionRequest<D>| {
            let mut builder = ListBuilder::new();
            for frustum in &request.frustums {
                let eye = frustum.eye();
                statics.visit(frustum, |entity, classification| {
                    builder.add(PerceptKind::Static, entity, classification, &eye);
                });
                bodies.visit(frustum, |body, classification| {
                    if body.id() != request.body {
                        builder.add(PerceptKind::Dynamic, body.entity(), classification, &eye);
                    }
                });
            }
            builder.finish(place, request, bodies)
        };
        match &self.pool {
            Some(pool) => pool.install(|| requests.par_iter().map(perceive_one).collect()),
            None => requests.iter().map(perceive_one).collect(),
        }
    }

    fn bottom_up<D: Dimension>(
        &self,
        place: PlaceId,
        statics: &StaticTree<D>,
        bodies: &DynamicTree<D>,
        requests: &[PerceptionRequest<D>],
    ) -> Vec<PerceptionList<D>> {
        let static_table = self.register_all(statics.partition(), requests);
        let dynamic_table = self.register_all(bodies.partition(), requests);

        let static_hits = self.collect_hits(statics.partition(), &static_table, |_, _| true);
        let dynamic_hits = self.collect_hits(bodies.partition(), &dynamic_table, |request, body| {
            requests.get(request).is_some_and(|r| r.body != body)
        });

        let mut builders: Vec<ListBuilder<D>> = requests.iter().map(|_| ListBuilder::new()).collect();
        for (kind, hits) in [
            (PerceptKind::Static, static_hits),
            (PerceptKind::Dynamic, dynamic_hits),
        ] {
            for hit in hits {
                if let Some(builder) = builders.get_mut(hit.request) {
                    builder.add(kind, hit.entity, hit.classification, &hit.eye);
                }
            }
        }
        builders
            .into_iter()
            .zip(requests)
            .map(|(builder, request)| builder.finish(place, request, bodies))
            .collect()
    }

    /// First phase: register every frustum of every request on one tree.
    fn register_all<'a, D, T>(
        &self,
        tree: &PartitionTree<D, T>,
        requests: &'a [PerceptionRequest<D>],
    ) -> RegistrationTable<'a, D>
    where
        D: Dimension,
        T: TreeItem<D>,
    {
        let register_one = |(index, request): (usize, &'a PerceptionRequest<D>)| {
            let mut found = Vec::new();
            for frustum in &request.frustums {
                register(tree, index, frustum, &mut found);
            }
            found
        };
        let per_request: Vec<Vec<(NodeId, Registration<'a, D>)>> = match &self.pool {
            Some(pool) => pool.install(|| requests.par_iter().enumerate().map(register_one).collect()),
            None => requests.iter().enumerate().map(register_one).collect(),
        };

        let mut table: RegistrationTable<'a, D> = BTreeMap::new();
        for (node, registration) in per_request.into_iter().flatten() {
            table.entry(node).or_default().push(registration);
        }
        table
    }

    /// Second phase: walk every entity of one tree up to the root.
    fn collect_hits<'t, D, T, F>(
        &self,
        tree: &'t PartitionTree<D, T>,
        table: &RegistrationTable<'_, D>,
        accept: F,
    ) -> Vec<Hit<'t, D>>
    where
        D: Dimension,
        T: TreeItem<D>,
        F: Fn(usize, EntityId) -> bool + Sync,
    {
        if table.is_empty() {
            return Vec::new();
        }
        let sense = |item: &&'t T| sense_upward(tree, table, *item, &accept);
        let items: Vec<&'t T> = tree.iter().collect();
        match &self.pool {
            Some(pool) => pool.install(|| items.par_iter().flat_map_iter(sense).collect()),
            None => items.iter().flat_map(sense).collect(),
        }
    }
}

/// Register `frustum` on the nodes of `tree` it covers.
fn register<'a, D, T>(
    tree: &PartitionTree<D, T>,
    request: usize,
    frustum: &'a Frustum<D>,
    found: &mut Vec<(NodeId, Registration<'a, D>)>,
) where
    D: Dimension,
    T: TreeItem<D>,
{
    let mut stack = vec![NodeId::ROOT];
    while let Some(node) = stack.pop() {
        let Some(bounds) = tree.node_bounds(node) else {
            continue;
        };
        if !frustum.intersects(&bounds) {
            continue;
        }
        let coverage = if frustum.encloses(&bounds) {
            Coverage::Whole
        } else if tree.is_leaf(node) {
            Coverage::Partial
        } else {
            stack.extend_from_slice(tree.children(node));
            continue;
        };
        found.push((
            node,
            Registration {
                request,
                frustum,
                coverage,
            },
        ));
    }
}

/// Collect the registrations met on the path from `item`'s leaf to the root.
fn sense_upward<'t, D, T, F>(
    tree: &PartitionTree<D, T>,
    table: &RegistrationTable<'_, D>,
    item: &'t T,
    accept: &F,
) -> Vec<Hit<'t, D>>
where
    D: Dimension,
    T: TreeItem<D>,
    F: Fn(usize, EntityId) -> bool,
{
    let mut hits = Vec::new();
    let mut cursor = tree.leaf_of(item.id());
    while let Some(node) = cursor {
        for registration in table.get(&node).into_iter().flatten() {
            if !accept(registration.request, item.id()) {
                continue;
            }
            let classification = match registration.coverage {
                Coverage::Whole => Classification::Inside,
                Coverage::Partial => registration.frustum.classify(item.bounds()),
            };
            if classification != Classification::Outside {
                hits.push(Hit {
                    request: registration.request,
                    entity: item.world_entity(),
                    classification,
                    eye: registration.frustum.eye(),
                });
            }
        }
        cursor = tree.parent(node);
    }
    hits
}
