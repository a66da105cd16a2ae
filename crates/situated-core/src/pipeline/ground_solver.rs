//! Ground-following decorator for any solver.

use situated_types::{Aabb, Dimension, EnvironmentalAction, MobileEntity, Transform};
use situated_world::Ground;

use super::collector::InfluenceBatch;
use super::solver::{InfluenceSolver, SolverContext, SolverOutcome};

/// Wraps another solver and keeps `on_ground` bodies on the place's ground.
///
/// For every action on such a body whose target lies inside the domain:
/// if the ground is not traversable there, the translation is cancelled
/// (rotation is kept); otherwise the body's vertical position is snapped so
/// its lowest face rests on the ground surface. Targets outside the domain
/// are left to the place (portal crossing or rollback). Places without
/// ground, and dimensions without a vertical axis, pass through unchanged
/// apart from the traversability check.
#[derive(Debug)]
pub struct KeepOnGroundSolver<D: Dimension> {
    inner: Box<dyn InfluenceSolver<D>>,
}

impl<D: Dimension> KeepOnGroundSolver<D> {
    /// Decorate `inner`.
    pub fn new(inner: Box<dyn InfluenceSolver<D>>) -> Self {
        Self { inner }
    }

    fn ground_action(
        action: EnvironmentalAction<D>,
        body: &MobileEntity<D>,
        ground: &dyn Ground,
        domain: &Aabb<D>,
    ) -> EnvironmentalAction<D> {
        let target = action.resulting_pose();
        if !domain.contains_point(&target.point) {
            return action;
        }
        let (x, y) = target.point.footprint();
        let transform = action.transform();

        let translation = if !ground.is_traversable(x, y) {
            D::Coords::default()
        } else {
            match (
                D::height(&body.bounds().half_extents()),
                body.position().height(),
            ) {
                (Some(half_height), Some(current)) => {
                    let floor = ground.height_at(x, y) + half_height;
                    D::with_height(transform.translation, floor - current)
                }
                _ => transform.translation,
            }
        };

        EnvironmentalAction::new(
            action.target(),
            action.influencer(),
            Transform::new(translation, transform.rotation),
            *action.previous(),
            action.tick(),
        )
    }
}

impl<D: Dimension> InfluenceSolver<D> for KeepOnGroundSolver<D> {
    fn solve(&mut self, batch: InfluenceBatch<D>, context: &mut SolverContext<'_, D>) -> SolverOutcome<D> {
        let mut outcome = self.inner.solve(batch, context);
        let Some(ground) = context.ground else {
            return outcome;
        };
        let bodies = context.bodies;
        let domain = context.domain;
        outcome.actions = outcome
            .actions
            .into_iter()
            .map(|action| match bodies.get(action.target()) {
                Some(body) if body.is_on_ground() => {
                    Self::ground_action(action, body, ground, &domain)
                }
                _ => action,
            })
            .collect();
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::pipeline::ImmediateSolver;
    use situated_types::{AgentId, Dim3, Influence, MotionLimits, Point};
    use situated_world::{DynamicTree, HeightmapGround, TreeConfig};

    fn domain() -> Aabb<Dim3> {
        Aabb::new(Point::new([0.0, 0.0, -10.0]), Point::new([4.0, 4.0, 10.0]))
    }

    fn ground() -> HeightmapGround {
        HeightmapGround::new(
            (0.0, 0.0),
            1.0,
            &[
                vec![0.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 1.0, f64::NAN],
                vec![0.0, 1.0, 1.0, f64::NAN],
                vec![0.0, 0.0, 0.0, 0.0],
            ],
        )
        .unwrap()
    }

    fn solve_one(body: MobileEntity<Dim3>, translation: [f64; 3]) -> EnvironmentalAction<Dim3> {
        let id = body.id();
        let mut tree = DynamicTree::new(domain(), TreeConfig::default()).unwrap();
        tree.insert(body).unwrap();
        let ground = ground();
        let mut context = SolverContext::new(1, 1.0, &tree, domain()).with_ground(Some(&ground));
        let mut solver = KeepOnGroundSolver::new(Box::new(ImmediateSolver::default()));
        let batch = InfluenceBatch::from_influences([Influence::displacement(AgentId::new(), id, translation)]);
        let mut outcome = solver.solve(batch, &mut context);
        outcome.actions.pop().unwrap()
    }

    fn walker(x: f64, y: f64, z: f64) -> MobileEntity<Dim3> {
        MobileEntity::new(
            Aabb::from_center(Point::new([x, y, z]), &[0.25, 0.25, 0.5]),
            MotionLimits::UNBOUNDED,
        )
        .with_on_ground(true)
    }

    #[test]
    fn snaps_body_onto_raised_ground() {
        let action = solve_one(walker(0.5, 0.5, 0.5), [1.0, 1.0, 0.0]);
        let pose = action.resulting_pose();
        // Cell (1, 1) is one unit high; the body's half height is 0.5.
        assert!((pose.point.coords[2] - 1.5).abs() < 1e-9);
        assert!((pose.point.coords[0] - 1.5).abs() < 1e-9);
    }

    #[test]
    fn cancels_translation_into_holes() {
        let action = solve_one(walker(2.5, 1.5, 1.5), [1.0, 0.0, 0.0]);
        assert_eq!(action.transform().translation, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn leaves_airborne_bodies_alone() {
        let flyer = MobileEntity::new(
            Aabb::from_center(Point::new([0.5, 0.5, 5.0]), &[0.25, 0.25, 0.5]),
            MotionLimits::UNBOUNDED,
        );
        let action = solve_one(flyer, [1.0, 1.0, 0.0]);
        assert_eq!(action.transform().translation, [1.0, 1.0, 0.0]);
    }
}
