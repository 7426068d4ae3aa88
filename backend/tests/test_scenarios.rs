//! End-to-end household scenarios

use future_wallet_core_rs::orchestrator::{ensemble_seeds, run_configured_ensemble};
use future_wallet_core_rs::{
    branch_from, run_ensemble, start_run, Asset, AssetClass, BranchOverrides, CashFlowItem, Event,
    InitialState, Liability, Run, SimulationConfig,
};
use std::sync::Arc;

const ENSEMBLE: usize = 8;

// ============================================================================
// Scenario 1: steady surplus
// ============================================================================

fn surplus_config() -> SimulationConfig {
    SimulationConfig {
        seed: 42,
        horizon_days: 1_825,
        income: vec![CashFlowItem::monthly("salary", "USD", 500_000)],
        expenses: vec![CashFlowItem::monthly("living", "USD", 300_000)],
        ..SimulationConfig::default()
    }
}

fn surplus_initial() -> InitialState {
    InitialState::new().with_asset(
        Asset::new("savings", AssetClass::Liquid, "USD", 1_000, 1_000_000).with_volatility_ppm(200),
    )
}

#[test]
fn test_surplus_household_stays_solvent() {
    let config = surplus_config();
    let ensemble = run_configured_ensemble(&surplus_initial(), config, ENSEMBLE).unwrap();
    assert_eq!(ensemble.failures().count(), 0);
    let seeds: Vec<u64> = ensemble.members().iter().map(|m| m.seed).collect();
    assert_eq!(seeds, ensemble_seeds(42, ENSEMBLE));

    let packet = ensemble.packet().unwrap();
    assert_eq!(packet.runs, ENSEMBLE);
    assert!(packet.finality.expected > 0.0);
    assert!(packet.finality.p5 > 0.0);
    assert!(packet.finality.p5 <= packet.finality.p95);
    assert_eq!(packet.risk.bankruptcy.probability, 0.0);
    assert_eq!(packet.risk.mean_liquidations, 0.0);
    assert_eq!(packet.trajectory.len(), 1_826);
    assert!(packet.health.final_credit_score > 650.0);
}

#[test]
fn test_ensemble_member_matches_standalone_run() {
    let ensemble = run_ensemble(&surplus_initial(), surplus_config(), &[42, 43]).unwrap();
    let mut solo = start_run(&surplus_initial(), surplus_config(), 42).unwrap();
    solo.run_to_horizon().unwrap();

    let member = &ensemble.members()[0];
    assert_eq!(member.seed, 42);
    assert_eq!(member.result.as_ref().unwrap(), &solo.states());
}

// ============================================================================
// Scenario 2: structural deficit with a loan
// ============================================================================

fn deficit_config() -> SimulationConfig {
    SimulationConfig {
        seed: 42,
        horizon_days: 1_095,
        income: vec![CashFlowItem::monthly("salary", "USD", 300_000)],
        expenses: vec![CashFlowItem::monthly("living", "USD", 450_000)],
        ..SimulationConfig::default()
    }
}

fn deficit_initial() -> InitialState {
    InitialState::new()
        .with_cash("USD", 200_000)
        .with_asset(Asset::new("savings", AssetClass::Liquid, "USD", 1_000, 800_000))
        .with_liability(Liability::new("loan", "USD", 5_000_000, 800, 100_000))
}

#[test]
fn test_deficit_household_liquidates_then_collapses() {
    let ensemble = run_ensemble(&deficit_initial(), deficit_config(), &ensemble_seeds(42, ENSEMBLE)).unwrap();
    let packet = ensemble.packet().unwrap();

    assert!(packet.risk.mean_liquidations > 0.0);
    assert!(packet.risk.bankruptcy.probability > 0.5);
    assert!(packet.risk.bankruptcy.mean_day.is_some());
    assert!(packet.finality.expected < 0.0);
    assert!(packet.health.score < 50.0);

    let first = &ensemble.completed()[0];
    let liquidated = first
        .iter()
        .flat_map(|s| s.events().iter())
        .any(|e| matches!(e, Event::Liquidation { asset_id, .. } if asset_id == "savings"));
    assert!(liquidated);
    assert!(first.last().unwrap().asset("savings").is_none());
}

#[test]
fn test_missed_payments_erode_credit() {
    let mut run = start_run(&deficit_initial(), deficit_config(), 42).unwrap();
    let end = run.run_to_horizon().unwrap();
    let states = run.states();

    let missed = states
        .iter()
        .flat_map(|s| s.events().iter())
        .filter(|e| matches!(e, Event::PaymentMissed { .. }))
        .count();
    assert!(missed > 0);
    assert!(end.credit_score() < 650.0);
    assert!(end.liability("loan").map(|l| l.restructure_count()).unwrap_or(0) > 0);
}

// ============================================================================
// Scenario 3: income cut branched at day 365
// ============================================================================

#[test]
fn test_branch_at_year_one_diverges_only_afterwards() {
    let mut original = start_run(&surplus_initial(), surplus_config(), 42).unwrap();
    original.run_to_horizon().unwrap();

    let snapshot = original.snapshot_at(365).unwrap();
    let cut = BranchOverrides::new().with_income(vec![CashFlowItem::monthly("salary", "USD", 200_000)]);
    let mut branch = branch_from(&snapshot, cut).unwrap();
    branch.run_to_horizon().unwrap();

    let ours = branch.states();
    let theirs = original.states();
    assert_eq!(ours.len(), theirs.len());

    for day in 0..=365usize {
        assert!(Arc::ptr_eq(&ours[day], &theirs[day]), "day {} not shared", day);
    }
    let first_difference = (0..ours.len()).find(|&d| ours[d] != theirs[d]).unwrap();
    assert!(first_difference >= 366);
    assert!(ours.last().unwrap().total_cash() < theirs.last().unwrap().total_cash());
}

// ============================================================================
// Scenario 4: households holding more than one currency
// ============================================================================

#[test]
fn test_foreign_expense_is_covered_from_reporting_cash() {
    let config = SimulationConfig {
        seed: 42,
        horizon_days: 200,
        expenses: vec![CashFlowItem::monthly("subscription", "EUR", 1_000)],
        ..SimulationConfig::default()
    };
    let initial = InitialState::new().with_cash("USD", 100_000_000);
    let mut run = Run::start_configured(&initial, config).unwrap();
    let end = run.run_to_horizon().unwrap();

    let packet = run.packet().unwrap();
    assert!(packet.trajectory.iter().all(|p| !p.deficit));
    assert_eq!(packet.risk.bankruptcy.probability, 0.0);
    assert_eq!(packet.risk.bankruptcy.days, Vec::<u32>::new());
    assert_eq!(packet.risk.mean_liquidations, 0.0);

    let conversions = run
        .states()
        .iter()
        .flat_map(|s| s.events().to_vec())
        .filter(|e| matches!(e, Event::CurrencyConverted { from, to, .. } if from == "USD" && to == "EUR"))
        .count();
    // One per billing month end: days 30 through 180
    assert_eq!(conversions, 6);
    assert!(end.balance("EUR") >= 0);
    assert!(end.balance("USD") < 100_000_000);
}

fn mixed_config() -> SimulationConfig {
    SimulationConfig {
        seed: 42,
        horizon_days: 730,
        income: vec![CashFlowItem::monthly("salary", "USD", 300_000)],
        expenses: vec![CashFlowItem::monthly("rent", "EUR", 450_000)],
        ..SimulationConfig::default()
    }
}

fn mixed_initial() -> InitialState {
    InitialState::new()
        .with_cash("USD", 100_000)
        .with_asset(Asset::new("eu_fund", AssetClass::Liquid, "EUR", 1_000, 1_000_000))
}

#[test]
fn test_mixed_currency_household_converts_then_liquidates_then_collapses() {
    let ensemble = run_configured_ensemble(&mixed_initial(), mixed_config(), ENSEMBLE).unwrap();
    assert_eq!(ensemble.failures().count(), 0);

    let packet = ensemble.packet().unwrap();
    assert_eq!(packet.risk.bankruptcy.probability, 1.0);
    assert!(packet.risk.mean_liquidations > 0.0);
    // Solvent until the first rent day
    assert!(packet.trajectory.iter().take(30).all(|p| !p.deficit));
    assert!(packet.trajectory.last().unwrap().deficit);

    let first = &ensemble.completed()[0];
    let events: Vec<Event> = first.iter().flat_map(|s| s.events().to_vec()).collect();
    let first_conversion = events
        .iter()
        .find(|e| matches!(e, Event::CurrencyConverted { from, to, .. } if from == "USD" && to == "EUR"))
        .map(|e| e.day());
    let first_sale = events
        .iter()
        .find(|e| {
            matches!(e, Event::Liquidation { asset_id, deficit_currency, .. }
                if asset_id == "eu_fund" && deficit_currency == "EUR")
        })
        .map(|e| e.day());
    let first_shortfall = events
        .iter()
        .find(|e| matches!(e, Event::DeficitUncovered { currency, .. } if currency == "EUR"))
        .map(|e| e.day());

    // Dollar cash is exhausted before the fund is sold, the fund before
    // the deficit is left uncovered
    assert_eq!(first_conversion, Some(30));
    assert_eq!(first_sale, Some(30));
    assert!(first_shortfall.unwrap() > 30);

    let end = first.last().unwrap();
    assert!(end.asset("eu_fund").is_none());
    assert!(end.balance("EUR") < 0);
    assert_eq!(end.balance("USD"), 0);
    assert!(end.is_deficit());

    assert_eq!(packet.risk.bankruptcy.days.len(), ENSEMBLE);
    assert!(packet.risk.bankruptcy.days.iter().all(|day| *day > 30));
}
