//! Metrics aggregation over finished trajectories

use future_wallet_core_rs::metrics::{
    health_score, percentile, FinancialStatus, HealthInputs, StabilityGrade,
};
use future_wallet_core_rs::components::CreditRating;
use future_wallet_core_rs::{
    compare_branches, start_run, CashFlowItem, InitialState, Liability, MetricsAggregator,
    OutputPacket, SimulationConfig, SimulationError, SimulationState,
};
use proptest::prelude::*;
use std::sync::Arc;

fn config(horizon_days: u32, income: i64, expense: i64) -> SimulationConfig {
    let mut config = SimulationConfig {
        horizon_days,
        fx_volatility_ppm: 0,
        expenses: vec![CashFlowItem::monthly("living", "USD", expense)],
        ..SimulationConfig::default()
    };
    if income > 0 {
        config.income = vec![CashFlowItem::monthly("salary", "USD", income)];
    }
    config
}

fn trajectory(config: &SimulationConfig, cash: i64) -> Vec<Arc<SimulationState>> {
    let initial = InitialState::new().with_cash("USD", cash);
    let mut run = start_run(&initial, config.clone(), 1).unwrap();
    run.run_to_horizon().unwrap();
    run.states()
}

/// 100k start, +200k net every 30 days, 90 days
fn surplus() -> (SimulationConfig, Vec<Arc<SimulationState>>) {
    let config = config(90, 500_000, 300_000);
    let states = trajectory(&config, 100_000);
    (config, states)
}

/// No income, -100k every 30 days, 120 days
fn shortfall() -> (SimulationConfig, Vec<Arc<SimulationState>>) {
    let config = config(120, 0, 100_000);
    let states = trajectory(&config, 0);
    (config, states)
}

// ============================================================================
// Single Runs
// ============================================================================

#[test]
fn test_surplus_run_summary() {
    let (config, states) = surplus();
    let run = MetricsAggregator::from_config(&config).summarize(&states).unwrap();

    assert_eq!((run.first_day, run.last_day), (0, 90));
    assert_eq!(run.initial_balance, 100_000);
    assert_eq!(run.final_balance, 700_000);
    assert_eq!(run.bankruptcy_day, None);
    assert!(run.deficits.iter().all(|d| !d));
    assert_eq!(run.liquidations, 0);
    assert_eq!(run.worst_drawdown, 0.0);
    assert_eq!(run.points.len(), 91);
    assert!(run.final_credit_score > config.credit.initial_score);
}

#[test]
fn test_sustained_deficit_sets_bankruptcy_day() {
    let (config, states) = shortfall();
    let aggregator = MetricsAggregator::from_config(&config);
    let run = aggregator.summarize(&states).unwrap();

    assert_eq!(run.bankruptcy_day, Some(30));
    assert_eq!(run.final_balance, -400_000);

    let last = run.points.last().unwrap();
    assert!(last.deficit);
    assert_eq!(last.deficit_amount, 400_000);
    assert_eq!(last.deficit_density, 1.0);
    assert!((last.deficit_intensity - 9_100_000.0 / 30.0).abs() < 1e-6);

    let packet = aggregator.packet(&states).unwrap();
    assert_eq!(packet.risk.bankruptcy.probability, 1.0);
    assert_eq!(packet.risk.bankruptcy.mean_day, Some(30.0));
    assert!(packet.health.score < 60.0);
}

#[test]
fn test_sustain_threshold_comes_from_config() {
    let (mut config, states) = shortfall();
    config.metrics.bankruptcy_sustain_days = 200;
    let run = MetricsAggregator::from_config(&config).summarize(&states).unwrap();
    assert_eq!(run.bankruptcy_day, None);
}

#[test]
fn test_empty_inputs_are_rejected() {
    let aggregator = MetricsAggregator::from_config(&SimulationConfig::default());
    assert!(matches!(aggregator.summarize(&[]), Err(SimulationError::Configuration(_))));
    assert!(matches!(aggregator.aggregate(&[]), Err(SimulationError::Configuration(_))));
}

// ============================================================================
// Ensembles
// ============================================================================

#[test]
fn test_aggregate_reduces_across_runs() {
    let (config, good) = surplus();
    let (_, bad) = shortfall();
    let packet = MetricsAggregator::from_config(&config)
        .aggregate(&[good, bad])
        .unwrap();

    assert_eq!(packet.runs, 2);
    assert_eq!(packet.finality.final_balances, vec![700_000, -400_000]);
    assert_eq!(packet.finality.expected, 150_000.0);
    assert!((packet.finality.p5 - -345_000.0).abs() < 1e-6);
    assert!((packet.finality.p95 - 645_000.0).abs() < 1e-6);
    assert_eq!(packet.risk.bankruptcy.probability, 0.5);
    assert_eq!(packet.risk.bankruptcy.days, vec![30]);
    assert_eq!(packet.trajectory.len(), 91);
}

#[test]
fn test_packet_exports_to_json() {
    let (config, states) = surplus();
    let packet = MetricsAggregator::from_config(&config).packet(&states).unwrap();
    let json = packet.to_json().unwrap();

    assert!(json.contains("\"finality\""));
    assert!(json.contains("\"trajectory\""));
    let parsed: OutputPacket = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.finality, packet.finality);
    assert_eq!(parsed.trajectory.len(), packet.trajectory.len());
}

#[test]
fn test_packet_reports_rating_default_risk_and_tax() {
    let (steady, states) = surplus();
    let packet = MetricsAggregator::from_config(&steady).packet(&states).unwrap();
    let health = &packet.health;
    assert_eq!(health.credit_rating, CreditRating::from_score(health.final_credit_score));
    assert_eq!(health.default_risk_probability, 0.0);
    assert_eq!(packet.tax.mean_total_tax, 0.0);
    assert_eq!(packet.tax.effective_rate, 0.0);

    // Twelve $10,000 paydays before the first assessment; a loan cash never meets
    let indebted = config(400, 1_000_000, 0);
    let initial = InitialState::new().with_liability(Liability::new("loan", "USD", 100_000_000, 0, 50_000_000));
    let mut run = start_run(&initial, indebted.clone(), 1).unwrap();
    run.run_to_horizon().unwrap();
    let packet = MetricsAggregator::from_config(&indebted).packet(&run.states()).unwrap();

    assert_eq!(packet.tax.mean_total_tax, 900_000.0);
    assert!((packet.tax.effective_rate - 0.075).abs() < 1e-12);
    assert_eq!(packet.health.default_risk_probability, 1.0);
    assert_eq!(packet.health.credit_rating, CreditRating::VeryPoor);
}

// ============================================================================
// Branch Comparison
// ============================================================================

#[test]
fn test_compare_branches() {
    let (config, good) = surplus();
    let (_, bad) = shortfall();
    let aggregator = MetricsAggregator::from_config(&config);
    let packets = vec![
        aggregator.packet(&bad).unwrap(),
        aggregator.packet(&good).unwrap(),
    ];

    let comparison = compare_branches(&packets).unwrap();
    assert_eq!(comparison.branches.len(), 2);
    assert_eq!(comparison.best_final_balance, 700_000.0);
    assert_eq!(comparison.worst_final_balance, -400_000.0);
    assert_eq!(comparison.avg_final_balance, 150_000.0);
    assert_eq!(comparison.lowest_bankruptcy_probability, 0.0);
    assert_eq!(comparison.highest_bankruptcy_probability, 1.0);
    assert_eq!(comparison.healthiest_branch, 1);
}

#[test]
fn test_compare_branches_requires_packets() {
    assert!(matches!(compare_branches(&[]), Err(SimulationError::Configuration(_))));
}

// ============================================================================
// Health & Status
// ============================================================================

#[test]
fn test_perfect_inputs_score_full_health() {
    let score = health_score(&HealthInputs {
        final_balance: 2_000_000,
        initial_balance: 1_000_000,
        credit_score: 850.0,
        credit_range: (300.0, 850.0),
        bankruptcy_probability: 0.0,
        liquidity_ratio: None,
        shock_clustering: 0.0,
        recovery_slope: 1_000.0,
    });
    assert!((score - 100.0).abs() < 1e-9);
    assert_eq!(FinancialStatus::from_score(score), FinancialStatus::Thriving);
}

#[test]
fn test_status_thresholds() {
    assert_eq!(FinancialStatus::from_score(89.9), FinancialStatus::Confident);
    assert_eq!(FinancialStatus::from_score(60.0), FinancialStatus::Stable);
    assert_eq!(FinancialStatus::from_score(14.9), FinancialStatus::Collapsed);
    assert_eq!(StabilityGrade::from_score(60.0), StabilityGrade::BPlus);
    assert_eq!(StabilityGrade::from_score(0.0), StabilityGrade::F);
    assert!(FinancialStatus::Thriving < FinancialStatus::Collapsed);
}

proptest! {
    #[test]
    fn prop_percentile_is_bounded_and_monotone(
        mut values in prop::collection::vec(-1_000_000_000i64..1_000_000_000, 1..50),
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
    ) {
        values.sort_unstable();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = percentile(&values, lo);
        let p_hi = percentile(&values, hi);
        prop_assert!(p_lo <= p_hi + 1e-6);
        prop_assert!(p_lo >= values[0] as f64 - 1e-6);
        prop_assert!(p_hi <= *values.last().unwrap() as f64 + 1e-6);
    }

    #[test]
    fn prop_health_score_in_range(
        final_balance in -10_000_000i64..10_000_000,
        initial_balance in -10_000_000i64..10_000_000,
        credit in 300.0f64..=850.0,
        probability in 0.0f64..=1.0,
        clustering in 0.0f64..1.0,
        slope in -10_000.0f64..10_000.0,
    ) {
        let score = health_score(&HealthInputs {
            final_balance,
            initial_balance,
            credit_score: credit,
            credit_range: (300.0, 850.0),
            bankruptcy_probability: probability,
            liquidity_ratio: Some(0.5),
            shock_clustering: clustering,
            recovery_slope: slope,
        });
        prop_assert!((0.0..=100.0).contains(&score));
    }
}
