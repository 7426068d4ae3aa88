//! Future Wallet Core - Rust Engine
//!
//! Deterministic daily simulation of a household's financial state.
//!
//! # Architecture
//!
//! - **core**: Calendar cadence and the error taxonomy
//! - **models**: Domain types (money, assets, liabilities, state, deltas)
//! - **rng**: Per-(seed, day, component) random substreams
//! - **graph**: Component dependency DAG and compiled execution plan
//! - **components**: Currency, cash flow, liabilities, taxation, assets, credit
//! - **store**: Copy-on-write state store, trajectories, snapshots
//! - **orchestrator**: Configuration, day stepper, runs, branches, ensembles
//! - **metrics**: Rolling signals, risk statistics and the output packet
//!
//! # Critical Invariants
//!
//! 1. All money values are i64 (cents); exchange rates are i64 fixed point
//! 2. All randomness is deterministic (seeded substreams, no hidden counters)
//! 3. A recorded state is never mutated; branches share history by reference

pub mod components;
pub mod core;
pub mod graph;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod rng;
pub mod store;

// Re-exports for convenience
pub use components::{
    build_components, CashFlowItem, Component, ComponentId, ComponentKind, DayContext, Frequency,
    TaxBracket,
};
pub use crate::core::error::{ComponentError, DeltaError, GraphError, SimulationError};
pub use crate::core::time::{Calendar, DayIndex};
pub use graph::{DependencyGraph, ExecutionPlan};
pub use metrics::{compare_branches, BranchComparison, MetricsAggregator, MetricsConfig, OutputPacket};
pub use models::{
    asset::{Asset, AssetClass},
    delta::StateDelta,
    event::Event,
    inputs::InitialState,
    liability::Liability,
    money::{Cents, RateTable},
    state::SimulationState,
};
pub use orchestrator::{
    branch_from, run_configured_ensemble, run_ensemble, snapshot_at, start_run, step_to,
    BranchOverrides, Ensemble, Run, RunSetup, SimulationConfig, SimulationStepper,
};
pub use rng::{RandomSource, RandomSubstreamManager};
pub use store::{Snapshot, SnapshotRecord, StateStore, Trajectory};
