//! Influence and action buffers.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use situated_types::{Dimension, EntityId, EnvironmentalAction, Influence};

use super::{PipelineError, TickPhase};

/// Outcome of submitting an influence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Buffered for the current tick.
    Accepted,
    /// Collection is closed; queued for the next tick.
    Deferred,
}

/// Influences of one tick, grouped by target in submission order.
#[derive(Debug, Clone)]
pub struct InfluenceBatch<D: Dimension> {
    by_target: BTreeMap<EntityId, Vec<Influence<D>>>,
    total: usize,
}

impl<D: Dimension> InfluenceBatch<D> {
    /// Group influences by target, keeping submission order per target.
    pub fn from_influences(influences: impl IntoIterator<Item = Influence<D>>) -> Self {
        let mut batch = Self {
            by_target: BTreeMap::new(),
            total: 0,
        };
        for influence in influences {
            batch.push(influence);
        }
        batch
    }

    fn push(&mut self, influence: Influence<D>) {
        self.by_target.entry(influence.target).or_default().push(influence);
        self.total = self.total.saturating_add(1);
    }

    /// Total number of influences.
    pub const fn len(&self) -> usize {
        self.total
    }

    /// Whether the batch is empty.
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct targets.
    pub fn targets(&self) -> usize {
        self.by_target.len()
    }
}

impl<D: Dimension> IntoIterator for InfluenceBatch<D> {
    type Item = (EntityId, Vec<Influence<D>>);
    type IntoIter = std::collections::btree_map::IntoIter<EntityId, Vec<Influence<D>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_target.into_iter()
    }
}

#[derive(Debug)]
struct CollectorState<D: Dimension> {
    phase: TickPhase,
    open: InfluenceBatch<D>,
    deferred: Vec<Influence<D>>,
}

/// Thread-safe buffer of the influences submitted during a tick.
///
/// Shared between a place and its agents through an `Arc`. Submissions
/// made while the pipeline is not Collecting are deferred, never dropped.
#[derive(Debug)]
pub struct InfluenceCollector<D: Dimension> {
    state: Mutex<CollectorState<D>>,
}

impl<D: Dimension> Default for InfluenceCollector<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dimension> InfluenceCollector<D> {
    /// An open, empty collector.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState {
                phase: TickPhase::Collecting,
                open: InfluenceBatch::from_influences([]),
                deferred: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, CollectorState<D>>, PipelineError> {
        self.state.lock().map_err(|_poisoned| PipelineError::LockPoisoned)
    }

    /// Submit an influence for the current tick, or the next one if
    /// collection is closed.
    pub fn submit(&self, influence: Influence<D>) -> Result<Submission, PipelineError> {
        let mut state = self.lock()?;
        if state.phase == TickPhase::Collecting {
            state.open.push(influence);
            Ok(Submission::Accepted)
        } else {
            state.deferred.push(influence);
            Ok(Submission::Deferred)
        }
    }

    /// Phase the collector believes the pipeline is in.
    pub fn phase(&self) -> Result<TickPhase, PipelineError> {
        Ok(self.lock()?.phase)
    }

    /// Influences buffered for the current tick.
    pub fn pending(&self) -> Result<usize, PipelineError> {
        Ok(self.lock()?.open.len())
    }

    /// Influences queued for the next tick.
    pub fn deferred(&self) -> Result<usize, PipelineError> {
        Ok(self.lock()?.deferred.len())
    }

    /// Close collection and hand over the current batch.
    pub(super) fn close(&self) -> Result<InfluenceBatch<D>, PipelineError> {
        let mut state = self.lock()?;
        if state.phase != TickPhase::Collecting {
            return Err(PipelineError::PhaseViolation {
                expected: TickPhase::Collecting,
                found: state.phase,
            });
        }
        state.phase = TickPhase::Solving;
        Ok(std::mem::replace(&mut state.open, InfluenceBatch::from_influences([])))
    }

    pub(super) fn set_phase(&self, phase: TickPhase) -> Result<(), PipelineError> {
        self.lock()?.phase = phase;
        Ok(())
    }

    /// Reopen collection, moving deferred influences into the new tick.
    pub(super) fn reopen(&self) -> Result<usize, PipelineError> {
        let mut state = self.lock()?;
        let deferred = std::mem::take(&mut state.deferred);
        let count = deferred.len();
        for influence in deferred {
            state.open.push(influence);
        }
        state.phase = TickPhase::Collecting;
        Ok(count)
    }
}

/// Buffer of the actions computed during Solving, one per entity.
///
/// A second action for the same entity replaces the first.
#[derive(Debug)]
pub struct ActionCollector<D: Dimension> {
    actions: BTreeMap<EntityId, EnvironmentalAction<D>>,
}

impl<D: Dimension> Default for ActionCollector<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dimension> ActionCollector<D> {
    /// An empty buffer.
    pub const fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Buffer an action.
    pub fn push(&mut self, action: EnvironmentalAction<D>) {
        self.actions.insert(action.target(), action);
    }

    /// Buffer several actions.
    pub fn extend(&mut self, actions: impl IntoIterator<Item = EnvironmentalAction<D>>) {
        for action in actions {
            self.push(action);
        }
    }

    /// Number of buffered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Take every buffered action, ordered by target.
    pub fn drain(&mut self) -> Vec<EnvironmentalAction<D>> {
        std::mem::take(&mut self.actions).into_values().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use situated_types::{AgentId, Dim2, Position, Transform};

    fn influence(target: EntityId) -> Influence<Dim2> {
        Influence::displacement(AgentId::new(), target, [1.0, 1.0])
    }

    #[test]
    fn closed_collector_defers_submissions() {
        let collector = InfluenceCollector::new();
        let target = EntityId::new();
        assert_eq!(collector.submit(influence(target)).unwrap(), Submission::Accepted);

        let batch = collector.close().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(collector.submit(influence(target)).unwrap(), Submission::Deferred);
        assert_eq!(collector.pending().unwrap(), 0);
        assert_eq!(collector.deferred().unwrap(), 1);

        assert_eq!(collector.reopen().unwrap(), 1);
        assert_eq!(collector.pending().unwrap(), 1);
        assert_eq!(collector.phase().unwrap(), TickPhase::Collecting);
    }

    #[test]
    fn closing_twice_is_a_phase_violation() {
        let collector: InfluenceCollector<Dim2> = InfluenceCollector::new();
        collector.close().unwrap();
        assert!(matches!(
            collector.close(),
            Err(PipelineError::PhaseViolation { .. })
        ));
    }

    #[test]
    fn batch_groups_by_target_in_order() {
        let a = EntityId::new();
        let b = EntityId::new();
        let first = influence(a);
        let second = Influence::displacement(AgentId::new(), a, [2.0, 0.0]);
        let batch = InfluenceBatch::from_influences([first.clone(), influence(b), second.clone()]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.targets(), 2);
        let grouped: BTreeMap<_, _> = batch.into_iter().collect();
        assert_eq!(grouped.get(&a), Some(&vec![first, second]));
    }

    #[test]
    fn action_collector_keeps_one_action_per_entity() {
        let target = EntityId::new();
        let action = |dx: f64| {
            EnvironmentalAction::<Dim2>::new(
                target,
                AgentId::new(),
                Transform::translation([dx, 0.0]),
                Position::default(),
                1,
            )
        };
        let mut actions = ActionCollector::new();
        actions.push(action(1.0));
        actions.push(action(2.0));
        assert_eq!(actions.len(), 1);
        let drained = actions.drain();
        assert_eq!(drained.first().map(|a| a.transform().translation), Some([2.0, 0.0]));
        assert!(actions.is_empty());
    }
}
