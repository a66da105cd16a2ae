//! Influence solvers: turning a tick's influences into actions.

use core::fmt::Debug;

use serde::{Deserialize, Serialize};
use situated_types::geometry::{clamp_norm, scale, zip_coords};
use situated_types::{Aabb, Dimension, EnvironmentalAction, Influence, MobileEntity, Transform};
use situated_world::{DynamicTree, Ground};

use super::collector::InfluenceBatch;
use crate::dynamics::DynamicsEngine;

/// How several influences addressed to the same entity in the same tick are
/// resolved into one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The last submitted influence wins.
    #[default]
    LastWriterWins,
    /// The first submitted influence wins.
    FirstWriterWins,
    /// Conflicting influences cancel each other; the entity does not move.
    RejectConflicts,
}

impl ConflictPolicy {
    /// Pick the winning influence, if any.
    pub fn resolve<D: Dimension>(self, mut influences: Vec<Influence<D>>) -> Option<Influence<D>> {
        match self {
            Self::LastWriterWins => influences.pop(),
            Self::FirstWriterWins => influences.into_iter().next(),
            Self::RejectConflicts if influences.len() == 1 => influences.pop(),
            Self::RejectConflicts => None,
        }
    }
}

/// Everything a solver may read (and the dynamics engine it may drive)
/// while computing one tick's actions.
#[derive(Debug)]
pub struct SolverContext<'a, D: Dimension> {
    /// Tick the actions are computed for.
    pub tick: u64,
    /// Step duration in seconds.
    pub dt: f64,
    /// The place's bodies, read-only during Solving.
    pub bodies: &'a DynamicTree<D>,
    /// The place's domain.
    pub domain: Aabb<D>,
    /// The place's ground, if it has one.
    pub ground: Option<&'a dyn Ground>,
    /// Optional physics integrator.
    pub dynamics: Option<&'a mut dyn DynamicsEngine<D>>,
}

impl<'a, D: Dimension> SolverContext<'a, D> {
    /// A context without ground or dynamics.
    pub const fn new(tick: u64, dt: f64, bodies: &'a DynamicTree<D>, domain: Aabb<D>) -> Self {
        Self {
            tick,
            dt,
            bodies,
            domain,
            ground: None,
            dynamics: None,
        }
    }

    /// Attach the place's ground.
    #[must_use]
    pub const fn with_ground(mut self, ground: Option<&'a dyn Ground>) -> Self {
        self.ground = ground;
        self
    }

    /// Attach a dynamics engine.
    #[must_use]
    pub fn with_dynamics(mut self, dynamics: Option<&'a mut dyn DynamicsEngine<D>>) -> Self {
        self.dynamics = dynamics;
        self
    }
}

/// Result of solving one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome<D: Dimension> {
    /// At most one action per entity.
    pub actions: Vec<EnvironmentalAction<D>>,
    /// Influences dropped by the conflict policy.
    pub discarded: usize,
    /// Influences addressed to entities the place does not hold.
    pub unknown_targets: usize,
}

impl<D: Dimension> Default for SolverOutcome<D> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            discarded: 0,
            unknown_targets: 0,
        }
    }
}

/// Computes one tick's environmental actions from its influences.
pub trait InfluenceSolver<D: Dimension>: Send + Debug {
    /// Solve a batch. Must emit at most one action per entity.
    fn solve(&mut self, batch: InfluenceBatch<D>, context: &mut SolverContext<'_, D>) -> SolverOutcome<D>;
}

/// Applies the winning influence immediately, clamped to the body's motion
/// limits and then passed through the dynamics engine if one is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImmediateSolver {
    policy: ConflictPolicy,
}

impl ImmediateSolver {
    /// A solver resolving conflicts with `policy`.
    pub const fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    /// The conflict policy in use.
    pub const fn policy(&self) -> ConflictPolicy {
        self.policy
    }
}

impl<D: Dimension> InfluenceSolver<D> for ImmediateSolver {
    fn solve(&mut self, batch: InfluenceBatch<D>, context: &mut SolverContext<'_, D>) -> SolverOutcome<D> {
        let mut outcome = SolverOutcome::default();
        let bodies = context.bodies;
        for (target, influences) in batch {
            let submitted = influences.len();
            let Some(winner) = self.policy.resolve(influences) else {
                outcome.discarded = outcome.discarded.saturating_add(submitted);
                continue;
            };
            outcome.discarded = outcome.discarded.saturating_add(submitted.saturating_sub(1));

            let Some(body) = bodies.get(target) else {
                outcome.unknown_targets = outcome.unknown_targets.saturating_add(1);
                continue;
            };

            let mut transform = constrain(body, &winner.transform, context.dt);
            if let Some(engine) = context.dynamics.as_mut() {
                transform = engine.integrate(body, transform, context.dt);
            }
            outcome.actions.push(EnvironmentalAction::new(
                target,
                winner.influencer,
                transform,
                body.pose(),
                context.tick,
            ));
        }
        if outcome.discarded > 0 {
            tracing::warn!(
                tick = context.tick,
                discarded = outcome.discarded,
                policy = ?self.policy,
                "conflicting influences discarded"
            );
        }
        outcome
    }
}

/// Clamp a desired transform to what `body` can achieve in `dt` seconds.
///
/// The velocity change is bounded by the maximum acceleration and the
/// resulting velocity by the maximum speed, for both the linear and the
/// angular component.
pub fn constrain<D: Dimension>(body: &MobileEntity<D>, desired: &Transform<D>, dt: f64) -> Transform<D> {
    if !dt.is_finite() || dt <= 0.0 {
        return Transform::identity();
    }
    let limits = body.limits();
    let current = body.linear_velocity();

    let wanted = scale::<D>(&desired.translation, dt.recip());
    let delta = zip_coords::<D>(&wanted, current, |w, c| w - c);
    let delta = clamp_norm::<D>(&delta, limits.max_linear_acceleration * dt);
    let velocity = zip_coords::<D>(current, &delta, |c, d| c + d);
    let velocity = clamp_norm::<D>(&velocity, limits.max_linear_speed);

    let spin = body.angular_velocity();
    let spin_delta = clamp_abs(desired.rotation / dt - spin, limits.max_angular_acceleration * dt);
    let spin = clamp_abs(spin + spin_delta, limits.max_angular_speed);

    Transform::new(scale::<D>(&velocity, dt), spin * dt)
}

/// Clamp `value` to `[-bound, bound]`; a negative or NaN bound leaves it as is.
fn clamp_abs(value: f64, bound: f64) -> f64 {
    if bound.is_nan() || bound < 0.0 {
        value
    } else {
        value.max(-bound).min(bound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use situated_types::{AgentId, Dim2, EntityId, MotionLimits, Point, Position};
    use situated_world::TreeConfig;

    fn domain() -> Aabb<Dim2> {
        Aabb::new(Point::new([0.0, 0.0]), Point::new([10.0, 10.0]))
    }

    fn body_at(x: f64, y: f64, limits: MotionLimits) -> MobileEntity<Dim2> {
        MobileEntity::new(Aabb::from_center(Point::new([x, y]), &[0.5, 0.5]), limits)
    }

    #[test]
    fn conflict_policies() {
        let target = EntityId::new();
        let first = Influence::<Dim2>::displacement(AgentId::new(), target, [1.0, 0.0]);
        let last = Influence::<Dim2>::displacement(AgentId::new(), target, [0.0, 1.0]);
        let both = vec![first.clone(), last.clone()];

        assert_eq!(ConflictPolicy::LastWriterWins.resolve(both.clone()), Some(last));
        assert_eq!(ConflictPolicy::FirstWriterWins.resolve(both.clone()), Some(first.clone()));
        assert_eq!(ConflictPolicy::RejectConflicts.resolve(both), None);
        assert_eq!(ConflictPolicy::RejectConflicts.resolve(vec![first.clone()]), Some(first));
    }

    #[test]
    fn speed_limit_clamps_translation() {
        let body = body_at(5.0, 5.0, MotionLimits::speed(2.0 * 2f64.sqrt(), f64::INFINITY));
        let clamped = constrain(&body, &Transform::translation([-4.0, -4.0]), 1.0);
        assert!((clamped.translation[0] + 2.0).abs() < 1e-9);
        assert!((clamped.translation[1] + 2.0).abs() < 1e-9);
    }

    #[test]
    fn acceleration_limit_bounds_velocity_change() {
        let limits = MotionLimits {
            max_linear_speed: f64::INFINITY,
            max_linear_acceleration: 1.0,
            max_angular_speed: 1.0,
            max_angular_acceleration: f64::INFINITY,
        };
        let body = body_at(5.0, 5.0, limits);
        let clamped = constrain(&body, &Transform::new([10.0, 0.0], 3.0), 0.5);
        // Velocity may change by at most 0.5 per half-second step.
        assert!((clamped.translation[0] - 0.25).abs() < 1e-9);
        assert!((clamped.rotation - 0.5).abs() < 1e-9);
    }

    #[test]
    fn non_positive_step_yields_identity() {
        let body = body_at(5.0, 5.0, MotionLimits::UNBOUNDED);
        assert!(constrain(&body, &Transform::translation([1.0, 1.0]), 0.0).is_identity());
    }

    #[test]
    fn immediate_solver_emits_one_action_per_entity() {
        let mut tree = DynamicTree::new(domain(), TreeConfig::default()).unwrap();
        let body = body_at(5.0, 5.0, MotionLimits::UNBOUNDED);
        let id = body.id();
        tree.insert(body).unwrap();

        let batch = InfluenceBatch::from_influences([
            Influence::displacement(AgentId::new(), id, [1.0, 0.0]),
            Influence::displacement(AgentId::new(), id, [0.0, 1.0]),
        ]);
        let mut context = SolverContext::new(7, 1.0, &tree, domain());
        let outcome = ImmediateSolver::default().solve(batch, &mut context);

        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.discarded, 1);
        let action = outcome.actions.first().unwrap();
        assert_eq!(action.tick(), 7);
        assert_eq!(action.transform().translation, [0.0, 1.0]);
        assert_eq!(*action.previous(), Position::new(Point::new([5.0, 5.0]), 0.0));
    }

    #[test]
    fn rejected_conflicts_emit_nothing() {
        let mut tree = DynamicTree::new(domain(), TreeConfig::default()).unwrap();
        let body = body_at(5.0, 5.0, MotionLimits::UNBOUNDED);
        let id = body.id();
        tree.insert(body).unwrap();

        let batch = InfluenceBatch::from_influences([
            Influence::displacement(AgentId::new(), id, [1.0, 0.0]),
            Influence::displacement(AgentId::new(), id, [0.0, 1.0]),
        ]);
        let mut context = SolverContext::new(1, 1.0, &tree, domain());
        let outcome =
            ImmediateSolver::new(ConflictPolicy::RejectConflicts).solve(batch, &mut context);
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.discarded, 2);
    }
}
