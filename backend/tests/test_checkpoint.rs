//! Checkpoint Tests - Export and Restore Snapshots
//!
//! Critical invariants tested:
//! - Determinism: a restored snapshot continues bit-exactly
//! - Config matching: a record is rejected under a different config
//! - Integrity: tampered records are rejected

use future_wallet_core_rs::store::{compute_config_hash, state_digest, validate_state};
use future_wallet_core_rs::{
    branch_from, start_run, Asset, AssetClass, BranchOverrides, CashFlowItem, InitialState,
    Liability, Run, SimulationConfig, SimulationError, Snapshot, SnapshotRecord,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn config() -> SimulationConfig {
    SimulationConfig {
        seed: 7,
        horizon_days: 240,
        income: vec![
            CashFlowItem::monthly("salary", "USD", 450_000),
            CashFlowItem::monthly("consulting", "EUR", 80_000),
        ],
        expenses: vec![CashFlowItem::monthly("rent", "GBP", 200_000)],
        ..SimulationConfig::default()
    }
}

fn initial() -> InitialState {
    InitialState::new()
        .with_cash("USD", 150_000)
        .with_cash("GBP", 50_000)
        .with_asset(Asset::new("index", AssetClass::Volatile, "USD", 100, 2_000_000).with_volatility_ppm(8_000))
        .with_liability(Liability::new("card", "USD", 300_000, 1_900, 25_000))
}

fn record_at(day: u32) -> SnapshotRecord {
    let mut run = start_run(&initial(), config(), 7).unwrap();
    run.snapshot_at(day).unwrap().to_record().unwrap()
}

// ============================================================================
// Export / Import
// ============================================================================

#[test]
fn test_record_survives_json() {
    let record = record_at(100);
    let json = record.to_json().unwrap();
    let restored = SnapshotRecord::from_json(&json).unwrap();

    assert_eq!(restored, record);
    assert_eq!(restored.day, 100);
    assert_eq!(restored.cursor.seed, 7);
    assert_eq!(restored.cursor.day, 100);
}

#[test]
fn test_malformed_json_is_serialization_error() {
    let err = SnapshotRecord::from_json("{\"day\": 3").unwrap_err();
    assert!(matches!(err, SimulationError::Serialization(_)));
}

#[test]
fn test_state_digest_is_stable_across_runs() {
    let a = record_at(60);
    let b = record_at(60);
    assert_eq!(state_digest(&a.state).unwrap(), state_digest(&b.state).unwrap());

    let c = record_at(61);
    assert_ne!(state_digest(&a.state).unwrap(), state_digest(&c.state).unwrap());
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_restore_rejects_different_config() {
    let record = record_at(50);
    let mut other = config();
    other.horizon_days = 300;

    let err = Snapshot::from_record(record, other).unwrap_err();
    assert!(matches!(err, SimulationError::StateValidation(msg) if msg.contains("hash")));
}

#[test]
fn test_restore_rejects_mismatched_header() {
    let mut record = record_at(50);
    record.day = 49;
    assert!(matches!(
        Snapshot::from_record(record, config()),
        Err(SimulationError::StateValidation(_))
    ));
}

#[test]
fn test_restore_rejects_seed_other_than_configured() {
    let mut record = record_at(50);
    record.cursor.seed = 8;
    let err = Snapshot::from_record(record, config()).unwrap_err();
    assert!(matches!(err, SimulationError::StateValidation(msg) if msg.contains("seed")));
}

#[test]
fn test_run_config_carries_the_driving_seed() {
    // Started with a seed other than the configured 7
    let mut run = start_run(&initial(), config(), 11).unwrap();
    assert_eq!(run.config().seed, 11);
    let record = run.snapshot_at(30).unwrap().to_record().unwrap();
    assert_eq!(record.cursor.seed, 11);
    assert_eq!(record.config_hash, compute_config_hash(run.config().as_ref()).unwrap());

    assert!(Snapshot::from_record(record.clone(), config()).is_err());
    let reseeded = SimulationConfig { seed: 11, ..config() };
    let restored = Snapshot::from_record(record, reseeded).unwrap();
    let mut resumed = branch_from(&restored, BranchOverrides::new()).unwrap();
    assert_eq!(resumed.seed(), 11);
    assert_eq!(resumed.step_to(45).unwrap(), run.step_to(45).unwrap());
}

#[test]
fn test_configured_seed_starts_identical_run() {
    let mut explicit = start_run(&initial(), config(), 7).unwrap();
    let mut configured = Run::start_configured(&initial(), config()).unwrap();
    assert_eq!(configured.seed(), 7);
    assert_eq!(configured.step_to(60).unwrap(), explicit.step_to(60).unwrap());
}

#[test]
fn test_restore_rejects_tampered_hash() {
    let mut record = record_at(50);
    record.config_hash = compute_config_hash(&"something else").unwrap();
    assert!(Snapshot::from_record(record, config()).is_err());
}

#[test]
fn test_recorded_states_pass_validation() {
    let config = config();
    let mut run = start_run(&initial(), config.clone(), 7).unwrap();
    run.run_to_horizon().unwrap();
    for state in run.states() {
        validate_state(&state, &config).unwrap();
    }
}

#[test]
fn test_validation_rejects_unsupported_currency() {
    let record = record_at(10);
    let mut narrowed = config();
    narrowed.currencies.remove("PKR");
    narrowed.initial_rates.remove("PKR");
    assert!(matches!(
        validate_state(&record.state, &narrowed),
        Err(SimulationError::StateValidation(_))
    ));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_restored_snapshot_continues_bit_exactly() {
    let mut original = start_run(&initial(), config(), 7).unwrap();
    original.run_to_horizon().unwrap();

    let json = original.snapshot_at(120).unwrap().to_record().unwrap().to_json().unwrap();
    let restored = Snapshot::from_record(SnapshotRecord::from_json(&json).unwrap(), config()).unwrap();
    assert_eq!(restored.day(), 120);

    let mut resumed = branch_from(&restored, BranchOverrides::new()).unwrap();
    resumed.run_to_horizon().unwrap();

    let reference = original.states();
    let resumed_states = resumed.states();
    assert_eq!(resumed_states.first().unwrap().day(), 120);
    assert_eq!(resumed_states.last().unwrap().day(), 240);
    for state in &resumed_states {
        assert_eq!(
            state_digest(state).unwrap(),
            state_digest(&reference[state.day() as usize]).unwrap(),
            "day {} diverged after restore",
            state.day()
        );
    }
}
