//! Run Engine
//!
//! Owns one simulated path: its compiled plan, stepper, trajectory and the
//! head state the next day is stepped from.
//!
//! # Architecture
//!
//! ```text
//! start_run(initial, config, seed)
//!   -> record seed in config -> validate -> build components -> compile plan -> day 0
//! step_to(run, d)
//!   -> step head until d, recording every state
//! snapshot_at(run, d)
//!   -> seal trajectory tail, reference day d
//! branch_from(snapshot, overrides)
//!   -> new run sharing days <= fork day, overrides applied to the head
//! ```
//!
//! # Example
//!
//! ```
//! use future_wallet_core_rs::orchestrator::{branch_from, start_run, BranchOverrides};
//! use future_wallet_core_rs::{CashFlowItem, InitialState, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     horizon_days: 120,
//!     income: vec![CashFlowItem::monthly("salary", "USD", 500_000)],
//!     expenses: vec![CashFlowItem::monthly("rent", "USD", 300_000)],
//!     ..SimulationConfig::default()
//! };
//! let initial = InitialState::new().with_cash("USD", 100_000);
//!
//! let mut run = start_run(&initial, config, 42).unwrap();
//! run.step_to(60).unwrap();
//! let snapshot = run.snapshot_at(60).unwrap();
//!
//! let mut branch = branch_from(&snapshot, BranchOverrides::default()).unwrap();
//! let ours = branch.step_to(90).unwrap();
//! let theirs = run.step_to(90).unwrap();
//! assert_eq!(ours, theirs);
//! ```

use crate::components::{build_components, CashFlowItem, Component};
use crate::core::error::SimulationError;
use crate::core::time::DayIndex;
use crate::graph::{DependencyGraph, ExecutionPlan};
use crate::metrics::{MetricsAggregator, OutputPacket};
use crate::models::delta::StateDelta;
use crate::models::inputs::InitialState;
use crate::models::state::SimulationState;
use crate::orchestrator::config::SimulationConfig;
use crate::orchestrator::stepper::SimulationStepper;
use crate::rng::RandomSubstreamManager;
use crate::store::{Snapshot, StateStore, Trajectory};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Run Setup
// ============================================================================

/// Validated configuration with its compiled plan
///
/// Read-only after construction; ensemble members and branches with the
/// same configuration share one setup.
#[derive(Debug, Clone)]
pub struct RunSetup {
    config: Arc<SimulationConfig>,
    plan: Arc<ExecutionPlan>,
    store: StateStore,
}

impl RunSetup {
    /// Validate `config` and compile the graph of its enabled components
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let components = build_components(&config);
        Self::with_components(config, &components)
    }

    /// Compile a caller-supplied component set under `config`
    pub fn with_components(
        config: SimulationConfig,
        components: &[Arc<dyn Component>],
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut graph = DependencyGraph::from_components(components)?;
        Self::from_graph(config, &mut graph)
    }

    /// Compile an already-assembled graph
    pub fn from_graph(config: SimulationConfig, graph: &mut DependencyGraph) -> Result<Self, SimulationError> {
        config.validate()?;
        let plan = graph.compile()?;
        info!(
            components = plan.len(),
            order = ?plan.order(),
            horizon = config.horizon_days,
            "execution plan compiled"
        );
        Ok(Self {
            store: StateStore::new(&config),
            config: Arc::new(config),
            plan,
        })
    }

    pub fn config(&self) -> &Arc<SimulationConfig> {
        &self.config
    }

    pub fn plan(&self) -> &Arc<ExecutionPlan> {
        &self.plan
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Same plan under another seed; the configuration records the seed
    pub fn reseeded(&self, seed: u64) -> Self {
        if self.config.seed == seed {
            return self.clone();
        }
        let mut config = self.config.as_ref().clone();
        config.seed = seed;
        Self {
            config: Arc::new(config),
            plan: Arc::clone(&self.plan),
            store: self.store.clone(),
        }
    }

    /// Stepper drawing from the substreams of the configured seed
    pub fn stepper(&self) -> Result<SimulationStepper, SimulationError> {
        let seed = self.config.seed;
        let substreams = RandomSubstreamManager::new(seed, self.config.horizon_days, self.plan.len())?;
        Ok(SimulationStepper::new(
            Arc::clone(&self.plan),
            self.store.clone(),
            self.config.calendar,
            substreams,
        )
        .with_parallel(self.config.parallel_components))
    }
}

// ============================================================================
// Branch Overrides
// ============================================================================

/// Changes applied when branching from a snapshot
///
/// Cash-flow overrides replace the configured items for every day after the
/// fork. The delta is applied to the snapshot state to form the predecessor
/// of the first branched day; it is never recorded as a day of its own.
#[derive(Debug, Clone, Default)]
pub struct BranchOverrides {
    pub income: Option<Vec<CashFlowItem>>,
    pub expenses: Option<Vec<CashFlowItem>>,
    pub delta: StateDelta,
}

impl BranchOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_income(mut self, income: Vec<CashFlowItem>) -> Self {
        self.income = Some(income);
        self
    }

    pub fn with_expenses(mut self, expenses: Vec<CashFlowItem>) -> Self {
        self.expenses = Some(expenses);
        self
    }

    pub fn with_delta(mut self, delta: StateDelta) -> Self {
        self.delta = delta;
        self
    }

    fn changes_config(&self) -> bool {
        self.income.is_some() || self.expenses.is_some()
    }
}

// ============================================================================
// Run
// ============================================================================

/// Handle to one simulated path
///
/// A run that failed on some day keeps every state recorded before the
/// failure; later `step_to` calls return the same error.
#[derive(Debug)]
pub struct Run {
    id: Uuid,
    setup: RunSetup,
    stepper: SimulationStepper,
    trajectory: Trajectory,
    head: Arc<SimulationState>,
    failure: Option<SimulationError>,
}

impl Run {
    /// Build day 0 and prepare to step
    ///
    /// `seed` replaces `config.seed`, so snapshots of the run carry the
    /// seed that actually drives it.
    pub fn start(initial: &InitialState, mut config: SimulationConfig, seed: u64) -> Result<Self, SimulationError> {
        config.seed = seed;
        Self::start_with(RunSetup::new(config)?, initial, seed)
    }

    /// Start a run with `config.seed`
    pub fn start_configured(initial: &InitialState, config: SimulationConfig) -> Result<Self, SimulationError> {
        let seed = config.seed;
        Self::start(initial, config, seed)
    }

    /// Start a run on an existing setup, reseeding it when `seed` differs
    pub fn start_with(setup: RunSetup, initial: &InitialState, seed: u64) -> Result<Self, SimulationError> {
        let setup = setup.reseeded(seed);
        let stepper = setup.stepper()?;
        let day0 = setup.store().initialize(initial, seed)?;
        let run = Self {
            id: Uuid::new_v4(),
            stepper,
            trajectory: Trajectory::new(Arc::clone(&day0)),
            head: day0,
            setup,
            failure: None,
        };
        info!(
            run = %run.id,
            seed,
            horizon = run.horizon(),
            cash = run.head.total_cash(),
            "run started"
        );
        Ok(run)
    }

    /// Continue from a snapshot with overrides applied
    pub fn branch_from(snapshot: &Snapshot, overrides: BranchOverrides) -> Result<Self, SimulationError> {
        let mut config = snapshot.config().as_ref().clone();
        if let Some(income) = &overrides.income {
            config.income = income.clone();
        }
        if let Some(expenses) = &overrides.expenses {
            config.expenses = expenses.clone();
        }
        let setup = RunSetup::new(config)?;
        let stepper = setup.stepper()?;
        let head = if overrides.delta.is_empty() {
            Arc::clone(snapshot.state())
        } else {
            let predecessor = snapshot
                .day()
                .checked_sub(1)
                .and_then(|day| snapshot.lineage().get(day));
            Arc::new(
                setup
                    .store()
                    .rebase(snapshot.state(), predecessor.as_deref(), &overrides.delta)?,
            )
        };

        let run = Self {
            id: Uuid::new_v4(),
            stepper,
            trajectory: Trajectory::branch(snapshot.lineage().clone()),
            head,
            setup,
            failure: None,
        };
        info!(
            run = %run.id,
            snapshot = %snapshot.id(),
            fork_day = snapshot.day(),
            config_changed = overrides.changes_config(),
            "branch created"
        );
        Ok(run)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &Arc<SimulationConfig> {
        self.setup.config()
    }

    pub fn setup(&self) -> &RunSetup {
        &self.setup
    }

    pub fn seed(&self) -> u64 {
        self.head.cursor().seed
    }

    pub fn horizon(&self) -> DayIndex {
        self.setup.config().horizon_days
    }

    /// Most recently recorded day
    pub fn latest_day(&self) -> DayIndex {
        self.trajectory.latest_day()
    }

    /// State the next day will be stepped from
    pub fn head(&self) -> &Arc<SimulationState> {
        &self.head
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Every visible state, oldest first
    pub fn states(&self) -> Vec<Arc<SimulationState>> {
        self.trajectory.states()
    }

    pub fn failure(&self) -> Option<&SimulationError> {
        self.failure.as_ref()
    }

    /// State of `day`, stepping forward as needed
    ///
    /// Days already recorded are returned without stepping. Days beyond the
    /// horizon, or before the first reachable day, are `DayOutOfRange`.
    pub fn step_to(&mut self, day: DayIndex) -> Result<Arc<SimulationState>, SimulationError> {
        if day <= self.latest_day() {
            return self.trajectory.get(day).ok_or(SimulationError::DayOutOfRange {
                requested: day,
                latest: self.latest_day(),
            });
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if day > self.horizon() {
            return Err(SimulationError::DayOutOfRange {
                requested: day,
                latest: self.horizon(),
            });
        }

        while self.latest_day() < day {
            match self.stepper.step(&self.head) {
                Ok(next) => {
                    let next = Arc::new(next);
                    self.trajectory.push(Arc::clone(&next));
                    self.head = next;
                }
                Err(err) => {
                    warn!(run = %self.id, day = self.latest_day() + 1, error = %err, "run aborted");
                    self.failure = Some(err.clone());
                    return Err(err);
                }
            }
        }
        Ok(Arc::clone(&self.head))
    }

    /// Step through the configured horizon
    pub fn run_to_horizon(&mut self) -> Result<Arc<SimulationState>, SimulationError> {
        self.step_to(self.horizon())
    }

    /// Reference to `day`, stepping forward first if it lies ahead
    pub fn snapshot_at(&mut self, day: DayIndex) -> Result<Snapshot, SimulationError> {
        if day > self.latest_day() {
            self.step_to(day)?;
        }
        self.trajectory
            .lineage_at(day)
            .and_then(|lineage| Snapshot::new(lineage, Arc::clone(self.setup.config())))
            .ok_or(SimulationError::DayOutOfRange {
                requested: day,
                latest: self.trajectory.latest_day(),
            })
    }

    /// Output packet of this run's trajectory so far
    pub fn packet(&self) -> Result<OutputPacket, SimulationError> {
        MetricsAggregator::from_config(self.config()).packet(&self.states())
    }
}

// ============================================================================
// Invocation API
// ============================================================================

pub fn start_run(initial: &InitialState, config: SimulationConfig, seed: u64) -> Result<Run, SimulationError> {
    Run::start(initial, config, seed)
}

pub fn step_to(run: &mut Run, day: DayIndex) -> Result<Arc<SimulationState>, SimulationError> {
    run.step_to(day)
}

pub fn snapshot_at(run: &mut Run, day: DayIndex) -> Result<Snapshot, SimulationError> {
    run.snapshot_at(day)
}

pub fn branch_from(snapshot: &Snapshot, overrides: BranchOverrides) -> Result<Run, SimulationError> {
    Run::branch_from(snapshot, overrides)
}
