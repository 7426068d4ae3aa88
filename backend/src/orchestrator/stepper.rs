//! Simulation Stepper
//!
//! Produces one day from its predecessor:
//!
//! ```text
//! For day d:
//! 1. Take the compiled execution order
//! 2. For each component in order: prior state + same-day deltas of its
//!    dependencies + its (seed, d, id) substream -> delta
//! 3. Merge deltas in resolution order (postings add, writes overlay)
//! 4. Reject writes to one field by components with no dependency path
//! 5. StateStore::advance
//! ```
//!
//! # Critical Invariants
//!
//! - **Order-stable merge**: deltas are merged by resolution position, so
//!   parallel execution of a dependency level never changes the result
//! - **Atomic day**: any component, conflict or delta error fails the whole
//!   day; no partial state is produced

use crate::components::DayContext;
use crate::core::error::SimulationError;
use crate::core::time::Calendar;
use crate::graph::ExecutionPlan;
use crate::models::delta::{FieldKey, StateDelta};
use crate::models::state::SimulationState;
use crate::rng::RandomSubstreamManager;
use crate::store::StateStore;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Advances states one day at a time under a fixed plan
#[derive(Debug, Clone)]
pub struct SimulationStepper {
    plan: Arc<ExecutionPlan>,
    store: StateStore,
    calendar: Calendar,
    substreams: RandomSubstreamManager,
    parallel: bool,
}

impl SimulationStepper {
    pub fn new(
        plan: Arc<ExecutionPlan>,
        store: StateStore,
        calendar: Calendar,
        substreams: RandomSubstreamManager,
    ) -> Self {
        Self {
            plan,
            store,
            calendar,
            substreams,
            parallel: false,
        }
    }

    /// Execute independent components of a level on the rayon pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn plan(&self) -> &Arc<ExecutionPlan> {
        &self.plan
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Produce the day after `prior`
    pub fn step(&self, prior: &SimulationState) -> Result<SimulationState, SimulationError> {
        let deltas = self.collect_deltas(prior)?;
        let merged = self.merge(&deltas)?;
        let next = self.store.advance(prior, &merged)?;
        debug!(
            day = next.day(),
            cash = next.total_cash(),
            deficit = next.is_deficit(),
            events = next.events().len(),
            "day stepped"
        );
        Ok(next)
    }

    /// Run every component, returning deltas in resolution order
    pub fn collect_deltas(&self, prior: &SimulationState) -> Result<Vec<StateDelta>, SimulationError> {
        let mut deltas: Vec<Option<StateDelta>> = vec![None; self.plan.len()];

        if self.parallel {
            for level in self.plan.levels() {
                let produced: Vec<(usize, Result<StateDelta, SimulationError>)> = level
                    .par_iter()
                    .map(|&pos| (pos, self.run_component(pos, prior, &deltas)))
                    .collect();
                for (pos, result) in produced {
                    deltas[pos] = Some(result?);
                }
            }
        } else {
            for pos in 0..self.plan.len() {
                let delta = self.run_component(pos, prior, &deltas)?;
                deltas[pos] = Some(delta);
            }
        }

        Ok(deltas.into_iter().flatten().collect())
    }

    fn run_component(
        &self,
        pos: usize,
        prior: &SimulationState,
        deltas: &[Option<StateDelta>],
    ) -> Result<StateDelta, SimulationError> {
        let day = prior.day() + 1;
        let component = &self.plan.components()[pos];

        let mut ctx = DayContext::new(day, self.calendar, prior);
        for &dep in self.plan.dependencies(pos) {
            if let Some(delta) = &deltas[dep] {
                ctx = ctx.with_input(self.plan.components()[dep].id(), delta);
            }
        }

        let mut rng = self.substreams.source(day, component.id());
        let delta = component.transform(&ctx, &mut rng)?;
        if rng.is_exhausted() {
            return Err(SimulationError::SeedExhaustion(format!(
                "component {} exceeded its draw budget on day {}",
                component.id(),
                day
            )));
        }
        Ok(delta)
    }

    /// Fold deltas (in resolution order) into one
    pub fn merge(&self, deltas: &[StateDelta]) -> Result<StateDelta, SimulationError> {
        let mut merged = StateDelta::new();
        let mut writers: BTreeMap<FieldKey, usize> = BTreeMap::new();

        for (pos, delta) in deltas.iter().enumerate() {
            for field in delta.written_fields() {
                if let Some(&earlier) = writers.get(&field) {
                    if !self.plan.connected(earlier, pos) {
                        return Err(SimulationError::UnresolvedConflict {
                            field: field.to_string(),
                            first: self.plan.components()[earlier].id().to_string(),
                            second: self.plan.components()[pos].id().to_string(),
                        });
                    }
                }
                writers.insert(field, pos);
            }
            merged.absorb(delta);
        }
        Ok(merged)
    }
}
