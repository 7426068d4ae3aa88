//! Monte Carlo ensembles
//!
//! Members differ only in their seed. They share one compiled plan by
//! reference, each under a copy of the configuration carrying its own
//! seed, and run on the rayon pool with no synchronization; a failing
//! member is recorded and does not affect its siblings.

use crate::core::error::SimulationError;
use crate::metrics::{MetricsAggregator, OutputPacket};
use crate::models::inputs::InitialState;
use crate::models::state::SimulationState;
use crate::orchestrator::config::SimulationConfig;
use crate::orchestrator::engine::{Run, RunSetup};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one ensemble member
#[derive(Debug, Clone)]
pub struct EnsembleMember {
    pub seed: u64,
    pub result: Result<Vec<Arc<SimulationState>>, SimulationError>,
}

#[derive(Debug, Clone)]
pub struct Ensemble {
    setup: RunSetup,
    members: Vec<EnsembleMember>,
}

impl Ensemble {
    pub fn members(&self) -> &[EnsembleMember] {
        &self.members
    }

    pub fn setup(&self) -> &RunSetup {
        &self.setup
    }

    /// Trajectories of members that reached the horizon
    pub fn completed(&self) -> Vec<Vec<Arc<SimulationState>>> {
        self.members
            .iter()
            .filter_map(|m| m.result.as_ref().ok().cloned())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (u64, &SimulationError)> {
        self.members
            .iter()
            .filter_map(|m| m.result.as_ref().err().map(|e| (m.seed, e)))
    }

    /// Output packet over every completed member
    ///
    /// Fails with the first member's error when no member completed.
    pub fn packet(&self) -> Result<OutputPacket, SimulationError> {
        let completed = self.completed();
        if completed.is_empty() {
            if let Some((_, err)) = self.failures().next() {
                return Err(err.clone());
            }
        }
        MetricsAggregator::from_config(self.setup.config()).aggregate(&completed)
    }
}

/// `count` consecutive seeds starting at `base`
pub fn ensemble_seeds(base: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| base.wrapping_add(i)).collect()
}

/// Run `count` members seeded consecutively from `config.seed`
pub fn run_configured_ensemble(
    initial: &InitialState,
    config: SimulationConfig,
    count: usize,
) -> Result<Ensemble, SimulationError> {
    let seeds = ensemble_seeds(config.seed, count);
    run_ensemble(initial, config, &seeds)
}

/// Run one member per seed through the configured horizon
pub fn run_ensemble(
    initial: &InitialState,
    config: SimulationConfig,
    seeds: &[u64],
) -> Result<Ensemble, SimulationError> {
    let setup = RunSetup::new(config)?;
    info!(
        members = seeds.len(),
        horizon = setup.config().horizon_days,
        "ensemble started"
    );

    let members: Vec<EnsembleMember> = seeds
        .to_vec()
        .into_par_iter()
        .map(|seed| EnsembleMember {
            seed,
            result: run_member(&setup, initial, seed),
        })
        .collect();

    let failed = members.iter().filter(|m| m.result.is_err()).count();
    if failed > 0 {
        warn!(failed, members = members.len(), "ensemble members aborted");
    }
    info!(members = members.len(), failed, "ensemble finished");

    Ok(Ensemble { setup, members })
}

fn run_member(
    setup: &RunSetup,
    initial: &InitialState,
    seed: u64,
) -> Result<Vec<Arc<SimulationState>>, SimulationError> {
    let mut run = Run::start_with(setup.clone(), initial, seed)?;
    run.run_to_horizon()?;
    Ok(run.states())
}
