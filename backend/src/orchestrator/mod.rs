//! Orchestrator - configuration, day stepping and run lifecycle
//!
//! See `engine.rs` for the run handle and `stepper.rs` for the per-day loop.

pub mod config;
pub mod engine;
pub mod ensemble;
pub mod stepper;

pub use config::{SimulationConfig, MAX_HORIZON_DAYS};
pub use engine::{branch_from, snapshot_at, start_run, step_to, BranchOverrides, Run, RunSetup};
pub use ensemble::{
    ensemble_seeds, run_configured_ensemble, run_ensemble, Ensemble, EnsembleMember,
};
pub use stepper::SimulationStepper;
