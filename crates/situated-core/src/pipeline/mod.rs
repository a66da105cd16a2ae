//! The influence-reaction pipeline.
//!
//! A strict per-tick state machine:
//!
//! ```text
//! Collecting --> Solving --> Applying --> Advancing --> Collecting ...
//! ```
//!
//! 1. **Collecting** -- agents submit [`Influence`]s to the shared
//!    [`InfluenceCollector`], buffered per target entity.
//! 2. **Solving** -- the collector closes; influences submitted from now on
//!    are deferred to the next tick. The [`InfluenceSolver`] turns the batch
//!    into at most one [`EnvironmentalAction`] per entity.
//! 3. **Applying** -- the place drains the [`ActionCollector`] and mutates
//!    its dynamic tree. This is the only phase that writes to the tree.
//! 4. **Advancing** -- the clock ticks; deferred influences are reopened.
//!
//! [`Influence`]: situated_types::Influence
//! [`EnvironmentalAction`]: situated_types::EnvironmentalAction

mod collector;
mod ground_solver;
mod solver;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use situated_types::{Dimension, EnvironmentalAction};

pub use collector::{ActionCollector, InfluenceBatch, InfluenceCollector, Submission};
pub use ground_solver::KeepOnGroundSolver;
pub use solver::{
    ConflictPolicy, ImmediateSolver, InfluenceSolver, SolverContext, SolverOutcome, constrain,
};

/// Phase of the per-tick state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPhase {
    /// Agents submit influences.
    Collecting,
    /// The solver computes actions.
    Solving,
    /// Actions are applied to the dynamic tree.
    Applying,
    /// The clock advances.
    Advancing,
}

/// Errors raised by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An operation was attempted in the wrong phase.
    #[error("phase violation: expected {expected:?}, pipeline is in {found:?}")]
    PhaseViolation {
        /// Phase the operation requires.
        expected: TickPhase,
        /// Phase the pipeline is actually in.
        found: TickPhase,
    },

    /// A thread panicked while holding the collector lock.
    #[error("influence collector lock poisoned")]
    LockPoisoned,
}

/// Summary of one Solving phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveSummary {
    /// Influences consumed by the solver.
    pub influences: usize,
    /// Actions produced.
    pub actions: usize,
    /// Influences dropped by the conflict policy.
    pub discarded: usize,
    /// Influences addressed to entities the place does not hold.
    pub unknown_targets: usize,
}

/// One place's pipeline: collector, solver, and action buffer, plus the
/// phase they are in.
#[derive(Debug)]
pub struct InfluenceReactionPipeline<D: Dimension> {
    phase: TickPhase,
    collector: Arc<InfluenceCollector<D>>,
    solver: Box<dyn InfluenceSolver<D>>,
    actions: ActionCollector<D>,
}

impl<D: Dimension> InfluenceReactionPipeline<D> {
    /// Create a pipeline in the Collecting phase.
    pub fn new(solver: Box<dyn InfluenceSolver<D>>) -> Self {
        Self {
            phase: TickPhase::Collecting,
            collector: Arc::new(InfluenceCollector::new()),
            solver,
            actions: ActionCollector::new(),
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> TickPhase {
        self.phase
    }

    /// The shared influence collector handed to agents.
    pub const fn collector(&self) -> &Arc<InfluenceCollector<D>> {
        &self.collector
    }

    /// Fail unless the pipeline is in `expected`.
    pub fn expect_phase(&self, expected: TickPhase) -> Result<(), PipelineError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(PipelineError::PhaseViolation {
                expected,
                found: self.phase,
            })
        }
    }

    /// Close collection, run the solver, and enter Applying.
    pub fn solve(&mut self, context: &mut SolverContext<'_, D>) -> Result<SolveSummary, PipelineError> {
        self.expect_phase(TickPhase::Collecting)?;
        let batch = self.collector.close()?;
        self.phase = TickPhase::Solving;

        let influences = batch.len();
        let outcome = self.solver.solve(batch, context);
        let summary = SolveSummary {
            influences,
            actions: outcome.actions.len(),
            discarded: outcome.discarded,
            unknown_targets: outcome.unknown_targets,
        };
        self.actions.extend(outcome.actions);

        self.collector.set_phase(TickPhase::Applying)?;
        self.phase = TickPhase::Applying;
        tracing::debug!(
            tick = context.tick,
            influences = summary.influences,
            actions = summary.actions,
            discarded = summary.discarded,
            "solving complete"
        );
        Ok(summary)
    }

    /// Drain the buffered actions for application.
    pub fn take_actions(&mut self) -> Result<Vec<EnvironmentalAction<D>>, PipelineError> {
        self.expect_phase(TickPhase::Applying)?;
        Ok(self.actions.drain())
    }

    /// Leave Applying, advance, and reopen collection. Returns the number of
    /// deferred influences carried into the new tick.
    pub fn advance(&mut self) -> Result<usize, PipelineError> {
        self.expect_phase(TickPhase::Applying)?;
        self.phase = TickPhase::Advancing;
        self.collector.set_phase(TickPhase::Advancing)?;
        let reopened = self.collector.reopen()?;
        self.phase = TickPhase::Collecting;
        Ok(reopened)
    }
}
