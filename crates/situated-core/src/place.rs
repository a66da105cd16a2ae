//! Places: self-contained simulation regions.
//!
//! A place owns a domain, optional ground, a static tree of immutable
//! geometry, a dynamic tree of bodies, its influence-reaction pipeline, and
//! the local copies of the portals attached to it. Bodies are added and
//! removed through buffers committed during Applying, so the trees are never
//! mutated while agents perceive or the solver runs.
//!
//! One tick of a place is [`Place::solve`], [`Place::apply`], and
//! [`Place::advance`]; [`Place::step`] runs all three. Between `apply` and
//! `advance` the owning environment moves bodies crossing portals with
//! [`Place::take_transfers`], [`Place::release_transfer`], and
//! [`Place::accept_transfer`]. Transfers nobody completes are rolled back.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use situated_types::geometry::scale;
use situated_types::{
    Aabb, Dimension, EntityId, EnvironmentalAction, Influence, MobileEntity, PlaceId, PortalId,
    Position, WorldEntity,
};
use situated_world::{DynamicTree, Ground, StaticTree, TreeError};

use crate::clock::SimulationClock;
use crate::config::{PerceptionConfig, SimulationConfig, SolverConfig};
use crate::dynamics::DynamicsEngine;
use crate::perception::{PerceptionAlgorithm, PerceptionError, PerceptionList, PerceptionRequest};
use crate::pipeline::{
    ImmediateSolver, InfluenceCollector, InfluenceReactionPipeline, InfluenceSolver,
    KeepOnGroundSolver, PipelineError, SolverContext, Submission, TickPhase,
};
use crate::portal::PortalLink;

/// Errors raised by a place.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// The domain is empty or not finite.
    #[error("place {name} has an invalid domain")]
    InvalidDomain {
        /// Name of the place.
        name: String,
    },

    /// Spatial index failure.
    #[error("spatial index error: {source}")]
    Tree {
        /// The underlying tree error.
        #[from]
        source: TreeError,
    },

    /// Pipeline failure (usually a phase violation).
    #[error("pipeline error: {source}")]
    Pipeline {
        /// The underlying pipeline error.
        #[from]
        source: PipelineError,
    },

    /// Perception failure.
    #[error("perception error: {source}")]
    Perception {
        /// The underlying perception error.
        #[from]
        source: PerceptionError,
    },
}

/// A body crossing a portal, pending transfer to another place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Transfer<D: Dimension> {
    /// The crossing body.
    pub entity: EntityId,
    /// The portal crossed.
    pub portal: PortalId,
    /// Place the body leaves.
    pub source: PlaceId,
    /// Place the body enters.
    pub destination: PlaceId,
    /// Pose of the body once it arrives.
    pub arrival: Position<D>,
}

/// What happened in one place during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// The place.
    pub place: PlaceId,
    /// Tick number reached at the end of the tick.
    pub tick: u64,
    /// Influences consumed by the solver.
    pub influences: usize,
    /// Influences dropped by the conflict policy.
    pub discarded_influences: usize,
    /// Influences addressed to entities the place does not hold.
    pub unknown_targets: usize,
    /// Entities moved by an action.
    pub applied: Vec<EntityId>,
    /// Actions whose target vanished before Applying.
    pub rejected_actions: usize,
    /// Actions undone because they left the domain, plus failed transfers.
    pub rollbacks: usize,
    /// Entities added or arrived through a portal.
    pub arrived: Vec<EntityId>,
    /// Entities removed or departed through a portal.
    pub departed: Vec<EntityId>,
    /// Bodies that entered through a portal.
    pub transfers_in: usize,
    /// Bodies that left through a portal.
    pub transfers_out: usize,
    /// Influences carried into the next tick.
    pub deferred_influences: usize,
}

impl TickReport {
    /// An empty report for `place`.
    pub const fn new(place: PlaceId) -> Self {
        Self {
            place,
            tick: 0,
            influences: 0,
            discarded_influences: 0,
            unknown_targets: 0,
            applied: Vec::new(),
            rejected_actions: 0,
            rollbacks: 0,
            arrived: Vec::new(),
            departed: Vec::new(),
            transfers_in: 0,
            transfers_out: 0,
            deferred_influences: 0,
        }
    }

    /// Whether the tick changed nothing in the place.
    pub fn is_idle(&self) -> bool {
        self.applied.is_empty() && self.arrived.is_empty() && self.departed.is_empty()
    }
}

/// Everything needed to build a [`Place`].
#[derive(Debug)]
pub struct PlaceDescription<D: Dimension> {
    /// Identifier the place will carry.
    pub id: PlaceId,
    /// Human-readable name.
    pub name: String,
    /// Spatial extent; bodies may not leave it except through portals.
    pub domain: Aabb<D>,
    /// Terrain, if any.
    pub ground: Option<Box<dyn Ground>>,
    /// Physics integrator, if any.
    pub dynamics: Option<Box<dyn DynamicsEngine<D>>>,
    /// Immutable geometry.
    pub statics: Vec<WorldEntity<D>>,
    /// Initial bodies.
    pub bodies: Vec<MobileEntity<D>>,
    /// Perception and tree settings.
    pub perception: PerceptionConfig,
    /// Solver settings, used when no explicit solver is given.
    pub solver_config: SolverConfig,
    /// Explicit solver overriding `solver_config`.
    pub solver: Option<Box<dyn InfluenceSolver<D>>>,
}

impl<D: Dimension> PlaceDescription<D> {
    /// A bare place with default settings.
    pub fn new(name: impl Into<String>, domain: Aabb<D>) -> Self {
        Self {
            id: PlaceId::new(),
            name: name.into(),
            domain,
            ground: None,
            dynamics: None,
            statics: Vec::new(),
            bodies: Vec::new(),
            perception: PerceptionConfig::default(),
            solver_config: SolverConfig::default(),
            solver: None,
        }
    }

    /// A bare place using the perception and solver sections of `config`.
    pub fn from_config(name: impl Into<String>, domain: Aabb<D>, config: &SimulationConfig) -> Self {
        Self {
            perception: config.perception,
            solver_config: config.solver,
            ..Self::new(name, domain)
        }
    }

    /// Give the place ground.
    #[must_use]
    pub fn with_ground(mut self, ground: impl Ground + 'static) -> Self {
        self.ground = Some(Box::new(ground));
        self
    }

    /// Give the place a dynamics engine.
    #[must_use]
    pub fn with_dynamics(mut self, dynamics: impl DynamicsEngine<D> + 'static) -> Self {
        self.dynamics = Some(Box::new(dynamics));
        self
    }

    /// Add static geometry.
    #[must_use]
    pub fn with_statics(mut self, statics: impl IntoIterator<Item = WorldEntity<D>>) -> Self {
        self.statics.extend(statics);
        self
    }

    /// Add an initial body.
    #[must_use]
    pub fn with_body(mut self, body: MobileEntity<D>) -> Self {
        self.bodies.push(body);
        self
    }

    /// Override the perception settings.
    #[must_use]
    pub const fn with_perception(mut self, perception: PerceptionConfig) -> Self {
        self.perception = perception;
        self
    }

    /// Use an explicit solver.
    #[must_use]
    pub fn with_solver(mut self, solver: Box<dyn InfluenceSolver<D>>) -> Self {
        self.solver = Some(solver);
        self
    }
}

/// Solver described by `config`: immediate application, wrapped in ground
/// following when enabled.
fn configured_solver<D: Dimension>(config: SolverConfig) -> Box<dyn InfluenceSolver<D>> {
    let immediate: Box<dyn InfluenceSolver<D>> = Box::new(ImmediateSolver::new(config.conflict_policy));
    if config.keep_on_ground {
        Box::new(KeepOnGroundSolver::new(immediate))
    } else {
        immediate
    }
}

/// A self-contained simulation region.
#[derive(Debug)]
pub struct Place<D: Dimension> {
    id: PlaceId,
    name: String,
    domain: Aabb<D>,
    ground: Option<Box<dyn Ground>>,
    dynamics: Option<Box<dyn DynamicsEngine<D>>>,
    statics: StaticTree<D>,
    bodies: DynamicTree<D>,
    pipeline: InfluenceReactionPipeline<D>,
    perception: PerceptionAlgorithm,
    portals: Vec<PortalLink<D>>,
    clock: Arc<SimulationClock>,
    tick: u64,
    pending_additions: Vec<MobileEntity<D>>,
    pending_removals: Vec<EntityId>,
    /// Bodies that moved during the last tick and still carry velocity.
    moving: BTreeSet<EntityId>,
    outbound: Vec<Transfer<D>>,
    report: TickReport,
}

impl<D: Dimension> Place<D> {
    /// Build a place sharing `clock`.
    pub fn build(description: PlaceDescription<D>, clock: Arc<SimulationClock>) -> Result<Self, PlaceError> {
        let PlaceDescription {
            id,
            name,
            domain,
            ground,
            dynamics,
            statics,
            bodies,
            perception,
            solver_config,
            solver,
        } = description;

        let degenerate = (0..D::AXES).any(|axis| domain.extent(axis) <= 0.0);
        if !domain.is_finite() || degenerate {
            return Err(PlaceError::InvalidDomain { name });
        }

        let tree_config = perception.tree_config();
        let static_count = statics.len();
        let statics = StaticTree::build_in(domain, statics, tree_config)?;
        let mut tree = DynamicTree::new(domain, tree_config)?;
        for body in bodies {
            tree.insert(body)?;
        }
        let solver = solver.unwrap_or_else(|| configured_solver(solver_config));
        let perception = PerceptionAlgorithm::new(perception.generator, perception.worker_threads)?;

        tracing::info!(
            place = %id,
            name = %name,
            dimension = D::NAME,
            statics = static_count,
            bodies = tree.len(),
            generator = ?perception.generator(),
            has_ground = ground.is_some(),
            "place built"
        );

        Ok(Self {
            id,
            name,
            domain,
            ground,
            dynamics,
            statics,
            bodies: tree,
            pipeline: InfluenceReactionPipeline::new(solver),
            perception,
            portals: Vec::new(),
            tick: clock.tick(),
            clock,
            pending_additions: Vec::new(),
            pending_removals: Vec::new(),
            moving: BTreeSet::new(),
            outbound: Vec::new(),
            report: TickReport::new(id),
        })
    }

    /// Identifier of the place.
    pub const fn id(&self) -> PlaceId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spatial extent.
    pub const fn domain(&self) -> &Aabb<D> {
        &self.domain
    }

    /// Terrain, if any.
    pub fn ground(&self) -> Option<&dyn Ground> {
        self.ground.as_deref()
    }

    /// Immutable geometry.
    pub const fn statics(&self) -> &StaticTree<D> {
        &self.statics
    }

    /// Bodies currently indexed.
    pub const fn bodies(&self) -> &DynamicTree<D> {
        &self.bodies
    }

    /// One body, if indexed.
    pub fn body(&self, id: EntityId) -> Option<&MobileEntity<D>> {
        self.bodies.get(id)
    }

    /// Local tick count.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Current pipeline phase.
    pub const fn phase(&self) -> TickPhase {
        self.pipeline.phase()
    }

    /// The influence collector agents submit to.
    pub fn collector(&self) -> Arc<InfluenceCollector<D>> {
        Arc::clone(self.pipeline.collector())
    }

    /// Submit an influence.
    pub fn submit(&self, influence: Influence<D>) -> Result<Submission, PlaceError> {
        Ok(self.pipeline.collector().submit(influence)?)
    }

    /// Attached portals.
    pub fn portals(&self) -> &[PortalLink<D>] {
        &self.portals
    }

    /// Attach a portal, replacing a previous link to the same portal.
    pub fn attach_portal(&mut self, link: PortalLink<D>) {
        self.portals.retain(|existing| existing.portal != link.portal);
        self.portals.push(link);
    }

    /// Detach a portal. Returns whether it was attached.
    pub fn detach_portal(&mut self, portal: PortalId) -> bool {
        let before = self.portals.len();
        self.portals.retain(|existing| existing.portal != portal);
        self.portals.len() != before
    }

    /// Queue a body for insertion at the next Applying phase.
    pub fn add_body(&mut self, body: MobileEntity<D>) {
        self.pending_additions.push(body);
    }

    /// Queue a body for removal at the next Applying phase.
    pub fn remove_body(&mut self, id: EntityId) {
        self.pending_removals.push(id);
    }

    /// Perceive on behalf of agents. Only allowed while Collecting.
    pub fn perceive(&self, requests: &[PerceptionRequest<D>]) -> Result<Vec<PerceptionList<D>>, PlaceError> {
        self.pipeline.expect_phase(TickPhase::Collecting)?;
        Ok(self
            .perception
            .perceive(self.id, &self.statics, &self.bodies, requests))
    }

    /// Close collection and compute this tick's actions.
    pub fn solve(&mut self) -> Result<(), PlaceError> {
        let tick = self.tick.saturating_add(1);
        let mut context = SolverContext::new(tick, self.clock.step_seconds(), &self.bodies, self.domain)
            .with_ground(self.ground.as_deref())
            .with_dynamics(
                self.dynamics
                    .as_deref_mut()
                    .map(|engine| engine as &mut dyn DynamicsEngine<D>),
            );
        let summary = self.pipeline.solve(&mut context)?;
        self.report.influences = summary.influences;
        self.report.discarded_influences = summary.discarded;
        self.report.unknown_targets = summary.unknown_targets;
        Ok(())
    }

    /// Commit removals, actions, and additions, in that order.
    ///
    /// Bodies whose action crosses a portal stay in place and are queued as
    /// [`Transfer`]s.
    pub fn apply(&mut self) -> Result<(), PlaceError> {
        let actions = self.pipeline.take_actions()?;

        for id in std::mem::take(&mut self.pending_removals) {
            match self.bodies.remove(id) {
                Ok(_) => {
                    self.moving.remove(&id);
                    self.report.departed.push(id);
                }
                Err(TreeError::EntityNotFound(_)) => {
                    let queued = self.pending_additions.len();
                    self.pending_additions.retain(|body| body.id() != id);
                    if self.pending_additions.len() == queued {
                        tracing::error!(place = %self.id, entity = %id, "removal of unknown body");
                        return Err(TreeError::EntityNotFound(id).into());
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        let dt = self.clock.step_seconds();
        let mut moved = BTreeSet::new();
        for action in &actions {
            if self.apply_action(action, dt)? {
                moved.insert(action.target());
            }
        }
        for id in std::mem::replace(&mut self.moving, moved) {
            if !self.moving.contains(&id) && self.bodies.contains(id) {
                self.bodies.update(id, |body| {
                    let pose = body.pose();
                    body.teleport(&pose);
                })?;
            }
        }

        for body in std::mem::take(&mut self.pending_additions) {
            let id = body.id();
            self.bodies.insert(body)?;
            self.report.arrived.push(id);
        }
        Ok(())
    }

    /// Apply one action. Returns whether the body moved within the place.
    fn apply_action(&mut self, action: &EnvironmentalAction<D>, dt: f64) -> Result<bool, PlaceError> {
        let target = action.target();
        if !self.bodies.contains(target) {
            self.report.rejected_actions = self.report.rejected_actions.saturating_add(1);
            return Ok(false);
        }
        let pose = action.resulting_pose();

        if self.domain.contains_point(&pose.point) {
            let transform = action.transform();
            let velocity = scale::<D>(&transform.translation, dt.recip());
            let spin = transform.rotation / dt;
            self.bodies.update(target, |body| {
                let bounds = body.bounds().recentered(&pose.point);
                body.apply_motion(bounds, pose.orientation, velocity, spin);
            })?;
            self.report.applied.push(target);
            return Ok(true);
        }

        if let Some(link) = self.portals.iter().find(|link| link.captures(&pose.point)) {
            self.outbound.push(Transfer {
                entity: target,
                portal: link.portal,
                source: self.id,
                destination: link.destination,
                arrival: link.arrival_pose(&pose),
            });
            return Ok(false);
        }

        let previous = *action.previous();
        self.bodies.update(target, |body| body.teleport(&previous))?;
        self.report.rollbacks = self.report.rollbacks.saturating_add(1);
        tracing::debug!(
            place = %self.id,
            entity = %target,
            "action leaves the domain; rolled back"
        );
        Ok(false)
    }

    /// Portal crossings queued by [`Place::apply`].
    pub fn take_transfers(&mut self) -> Vec<Transfer<D>> {
        std::mem::take(&mut self.outbound)
    }

    /// Remove a crossing body and re-centre it on the arrival pose.
    pub fn release_transfer(&mut self, transfer: &Transfer<D>) -> Result<MobileEntity<D>, PlaceError> {
        self.pipeline.expect_phase(TickPhase::Applying)?;
        let mut body = self.bodies.remove(transfer.entity)?;
        body.teleport(&transfer.arrival);
        self.moving.remove(&transfer.entity);
        self.report.departed.push(transfer.entity);
        self.report.transfers_out = self.report.transfers_out.saturating_add(1);
        Ok(body)
    }

    /// Index a body that arrived through a portal.
    pub fn accept_transfer(&mut self, body: MobileEntity<D>) -> Result<(), PlaceError> {
        self.pipeline.expect_phase(TickPhase::Applying)?;
        let id = body.id();
        self.bodies.insert(body)?;
        self.report.arrived.push(id);
        self.report.transfers_in = self.report.transfers_in.saturating_add(1);
        Ok(())
    }

    /// Finish the tick: roll back unfinished transfers, reopen collection,
    /// and advance the shared clock.
    pub fn advance(&mut self) -> Result<TickReport, PlaceError> {
        self.pipeline.expect_phase(TickPhase::Applying)?;
        for transfer in std::mem::take(&mut self.outbound) {
            if self.bodies.contains(transfer.entity) {
                self.bodies.update(transfer.entity, |body| {
                    let pose = body.pose();
                    body.teleport(&pose);
                })?;
                self.moving.remove(&transfer.entity);
            }
            self.report.rollbacks = self.report.rollbacks.saturating_add(1);
            tracing::warn!(
                place = %self.id,
                entity = %transfer.entity,
                portal = %transfer.portal,
                "portal transfer not completed; rolled back"
            );
        }

        let deferred = self.pipeline.advance()?;
        self.tick = self.tick.saturating_add(1);
        self.clock.advance_to(self.tick);

        let mut report = std::mem::replace(&mut self.report, TickReport::new(self.id));
        report.tick = self.tick;
        report.deferred_influences = deferred;
        tracing::debug!(
            place = %self.id,
            tick = self.tick,
            applied = report.applied.len(),
            rollbacks = report.rollbacks,
            "place advanced"
        );
        Ok(report)
    }

    /// Run one full tick on its own. Portal crossings cannot complete
    /// without an environment and are rolled back.
    pub fn step(&mut self) -> Result<TickReport, PlaceError> {
        self.solve()?;
        self.apply()?;
        self.advance()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use situated_types::{AgentId, Dim2, Dim3, MotionLimits, Point, TimeUnit};
    use situated_world::FlatGround;

    fn clock() -> Arc<SimulationClock> {
        Arc::new(SimulationClock::new(1.0, TimeUnit::Seconds).unwrap())
    }

    fn domain() -> Aabb<Dim2> {
        Aabb::new(Point::new([0.0, 0.0]), Point::new([10.0, 10.0]))
    }

    fn body_at(x: f64, y: f64) -> MobileEntity<Dim2> {
        MobileEntity::new(
            Aabb::from_center(Point::new([x, y]), &[0.5, 0.5]),
            MotionLimits::UNBOUNDED,
        )
    }

    #[test]
    fn degenerate_domain_is_rejected() {
        let flat = Aabb::new(Point::new([0.0, 0.0]), Point::new([10.0, 0.0]));
        let result = Place::build(PlaceDescription::<Dim2>::new("flat", flat), clock());
        assert!(matches!(result, Err(PlaceError::InvalidDomain { .. })));
    }

    #[test]
    fn step_moves_body_and_records_velocity() {
        let body = body_at(2.0, 2.0);
        let id = body.id();
        let mut place = Place::build(PlaceDescription::new("room", domain()).with_body(body), clock()).unwrap();
        place
            .submit(Influence::displacement(AgentId::new(), id, [1.0, 0.0]))
            .unwrap();
        let report = place.step().unwrap();

        assert_eq!(report.tick, 1);
        assert_eq!(report.applied, vec![id]);
        let moved = place.body(id).unwrap();
        assert_eq!(moved.position(), Point::new([3.0, 2.0]));
        assert_eq!(*moved.linear_velocity(), [1.0, 0.0]);

        // No action next tick: the body stops.
        let report = place.step().unwrap();
        assert!(report.is_idle());
        assert_eq!(*place.body(id).unwrap().linear_velocity(), [0.0, 0.0]);
    }

    #[test]
    fn leaving_the_domain_rolls_back() {
        let body = body_at(9.0, 5.0);
        let id = body.id();
        let mut place = Place::build(PlaceDescription::new("room", domain()).with_body(body), clock()).unwrap();
        place
            .submit(Influence::displacement(AgentId::new(), id, [5.0, 0.0]))
            .unwrap();
        let report = place.step().unwrap();
        assert_eq!(report.rollbacks, 1);
        assert!(report.applied.is_empty());
        assert_eq!(place.body(id).unwrap().position(), Point::new([9.0, 5.0]));
    }

    #[test]
    fn additions_and_removals_are_buffered() {
        let mut place = Place::build(PlaceDescription::<Dim2>::new("room", domain()), clock()).unwrap();
        let body = body_at(5.0, 5.0);
        let id = body.id();
        place.add_body(body);
        assert!(place.body(id).is_none());

        let report = place.step().unwrap();
        assert_eq!(report.arrived, vec![id]);
        assert!(place.body(id).is_some());

        place.remove_body(id);
        assert!(place.body(id).is_some());
        let report = place.step().unwrap();
        assert_eq!(report.departed, vec![id]);
        assert!(place.bodies().is_empty());
    }

    #[test]
    fn removing_an_unknown_body_fails_the_tick() {
        let mut place = Place::build(PlaceDescription::<Dim2>::new("room", domain()), clock()).unwrap();
        let stranger = EntityId::new();
        place.remove_body(stranger);
        assert!(matches!(
            place.step(),
            Err(PlaceError::Tree {
                source: TreeError::EntityNotFound(id)
            }) if id == stranger
        ));
    }

    #[test]
    fn removal_cancels_a_queued_addition() {
        let mut place = Place::build(PlaceDescription::<Dim2>::new("room", domain()), clock()).unwrap();
        let body = body_at(5.0, 5.0);
        let id = body.id();
        place.add_body(body);
        place.remove_body(id);
        let report = place.step().unwrap();
        assert!(report.arrived.is_empty());
        assert!(place.body(id).is_none());
    }

    #[test]
    fn airborne_bodies_keep_their_height_over_ground() {
        let floor = Aabb::new(Point::new([0.0, 0.0, -1.0]), Point::new([10.0, 10.0, 10.0]));
        let flyer = MobileEntity::<Dim3>::new(
            Aabb::from_center(Point::new([2.0, 2.0, 5.0]), &[0.5, 0.5, 0.5]),
            MotionLimits::UNBOUNDED,
        );
        let id = flyer.id();
        let description = PlaceDescription::new("hall", floor)
            .with_ground(FlatGround::unbounded(0.0))
            .with_body(flyer);
        let mut place = Place::build(description, clock()).unwrap();
        place
            .submit(Influence::displacement(AgentId::new(), id, [1.0, 0.0, 0.0]))
            .unwrap();
        place.step().unwrap();
        assert_eq!(place.body(id).unwrap().position(), Point::new([3.0, 2.0, 5.0]));
    }

    #[test]
    fn perception_is_refused_outside_collecting() {
        let mut place = Place::build(PlaceDescription::<Dim2>::new("room", domain()), clock()).unwrap();
        place.solve().unwrap();
        assert!(matches!(
            place.perceive(&[]),
            Err(PlaceError::Pipeline {
                source: PipelineError::PhaseViolation { .. }
            })
        ));
        place.apply().unwrap();
        place.advance().unwrap();
        assert!(place.perceive(&[]).unwrap().is_empty());
    }

    #[test]
    fn places_share_the_clock() {
        let shared = clock();
        let mut first = Place::build(PlaceDescription::<Dim2>::new("a", domain()), Arc::clone(&shared)).unwrap();
        let mut second = Place::build(PlaceDescription::<Dim2>::new("b", domain()), Arc::clone(&shared)).unwrap();
        first.step().unwrap();
        second.step().unwrap();
        assert_eq!(shared.tick(), 1);
    }
}
