//! Metrics aggregation
//!
//! A pure reduction over finished trajectories. Nothing here steps the
//! simulation; [`MetricsAggregator`] reads the recorded states of one or
//! many runs and synthesizes the [`OutputPacket`].
//!
//! Balance series are the total cash in the reporting currency. A day is in
//! deficit when any single currency balance is negative.

pub mod output;
pub mod risk;
pub mod rolling;
pub mod status;

pub use output::{
    compare_branches, AssetMetrics, BranchComparison, BranchSummary, Finality, HealthMetrics,
    OutputPacket, RiskMetrics, TaxMetrics, TrajectoryPoint,
};
pub use risk::{bankruptcy_day, collapse_density, resilience_score, BankruptcyStats};
pub use rolling::{
    deficit_density, deficit_intensity, detect_shocks, recovery_ratio, recovery_slope,
    rolling_volatility, shock_clustering, worst_drawdown, Shock,
};
pub use status::{health_score, FinancialStatus, HealthInputs, StabilityGrade};

use crate::components::{effective_rate, CreditRating};
use crate::core::error::SimulationError;
use crate::core::time::DayIndex;
use crate::models::ledger::TaxLedger;
use crate::models::money::Cents;
use crate::models::state::SimulationState;
use crate::orchestrator::config::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metric parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Trailing window for rolling signals, in days
    pub window_days: usize,

    /// Consecutive deficit days that count as bankruptcy
    pub bankruptcy_sustain_days: u32,

    /// Single-day balance drop treated as a shock, basis points
    pub shock_drop_bps: i64,

    /// Number of horizon slices for collapse and timing densities
    pub collapse_bins: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            bankruptcy_sustain_days: 30,
            shock_drop_bps: 500,
            collapse_bins: 12,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.window_days < 2 {
            return Err(SimulationError::Configuration(format!(
                "metrics window must span at least 2 days, got {}",
                self.window_days
            )));
        }
        if self.bankruptcy_sustain_days == 0 {
            return Err(SimulationError::Configuration(
                "bankruptcy sustain length must be positive".to_string(),
            ));
        }
        if !(1..=10_000).contains(&self.shock_drop_bps) {
            return Err(SimulationError::Configuration(format!(
                "shock threshold must be within 1..=10000 bps, got {}",
                self.shock_drop_bps
            )));
        }
        if self.collapse_bins == 0 {
            return Err(SimulationError::Configuration(
                "collapse density needs at least one bin".to_string(),
            ));
        }
        Ok(())
    }
}

/// Signals of a single finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub first_day: DayIndex,
    pub last_day: DayIndex,
    pub initial_balance: Cents,
    pub final_balance: Cents,
    pub bankruptcy_day: Option<DayIndex>,
    pub deficits: Vec<bool>,
    pub worst_drawdown: f64,
    pub recovery_ratio: f64,
    pub recovery_slope: Option<f64>,
    pub rolling_volatility: f64,
    pub shock_clustering: f64,
    pub liquidations: u32,
    pub credit_min: f64,
    pub credit_max: f64,
    pub final_credit_score: f64,
    pub final_nav: Cents,
    pub final_liquidity_ratio: Option<f64>,
    pub at_default_risk: bool,
    pub total_tax: Cents,
    pub total_taxable: Cents,
    pub points: Vec<TrajectoryPoint>,
}

/// Reduces trajectories to run metrics and output packets
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    config: MetricsConfig,
    credit_range: (f64, f64),
}

impl MetricsAggregator {
    pub fn new(config: MetricsConfig, credit_range: (f64, f64)) -> Self {
        Self {
            config,
            credit_range,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.metrics.clone(),
            (config.credit.min_score, config.credit.max_score),
        )
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Per-day points of one trajectory, with the rolling deficit signals filled in
    pub fn points(&self, states: &[Arc<SimulationState>]) -> Vec<TrajectoryPoint> {
        let mut points: Vec<TrajectoryPoint> =
            states.iter().map(|s| TrajectoryPoint::from_state(s)).collect();
        let flags: Vec<bool> = points.iter().map(|p| p.deficit).collect();
        let amounts: Vec<Cents> = points.iter().map(|p| p.deficit_amount).collect();
        let density = deficit_density(&flags, self.config.window_days);
        let intensity = deficit_intensity(&amounts, self.config.window_days);
        for ((point, d), i) in points.iter_mut().zip(density).zip(intensity) {
            point.deficit_density = d;
            point.deficit_intensity = i;
        }
        points
    }

    /// Metrics of one trajectory (day 0 through the last stepped day)
    pub fn summarize(&self, states: &[Arc<SimulationState>]) -> Result<RunMetrics, SimulationError> {
        let (Some(first), Some(last)) = (states.first(), states.last()) else {
            return Err(SimulationError::Configuration(
                "cannot summarize an empty trajectory".to_string(),
            ));
        };

        let points = self.points(states);
        let balances: Vec<Cents> = points.iter().map(|p| p.total_cash).collect();
        let deficits: Vec<bool> = points.iter().map(|p| p.deficit).collect();
        let window = self.config.window_days;

        let shocks = detect_shocks(&balances, self.config.shock_drop_bps);
        let credit_min = points.iter().map(|p| p.credit_score).fold(f64::INFINITY, f64::min);
        let credit_max = points.iter().map(|p| p.credit_score).fold(f64::NEG_INFINITY, f64::max);

        Ok(RunMetrics {
            first_day: first.day(),
            last_day: last.day(),
            initial_balance: first.total_cash(),
            final_balance: last.total_cash(),
            bankruptcy_day: bankruptcy_day(&deficits, first.day(), self.config.bankruptcy_sustain_days),
            worst_drawdown: worst_drawdown(&balances),
            recovery_ratio: recovery_ratio(&balances),
            recovery_slope: recovery_slope(&balances, window),
            rolling_volatility: rolling_volatility(&balances, window),
            shock_clustering: shock_clustering(&shocks, window),
            liquidations: last.accumulators().liquidation_count,
            credit_min,
            credit_max,
            final_credit_score: last.credit_score(),
            final_nav: last.net_asset_value(),
            final_liquidity_ratio: last.liquidity_ratio(),
            at_default_risk: last.at_default_risk(),
            total_tax: last.tax().total_tax,
            total_taxable: last.tax().total_taxable,
            deficits,
            points,
        })
    }

    /// Output packet of a single run
    pub fn packet(&self, states: &[Arc<SimulationState>]) -> Result<OutputPacket, SimulationError> {
        let run = self.summarize(states)?;
        Ok(self.reduce(vec![run]))
    }

    /// Output packet of an ensemble; the first member supplies the trajectory
    pub fn aggregate(&self, runs: &[Vec<Arc<SimulationState>>]) -> Result<OutputPacket, SimulationError> {
        if runs.is_empty() {
            return Err(SimulationError::Configuration(
                "cannot aggregate an empty ensemble".to_string(),
            ));
        }
        let summaries = runs
            .iter()
            .map(|states| self.summarize(states))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.reduce(summaries))
    }

    /// Reduce already-summarized runs; `runs` must be non-empty
    fn reduce(&self, mut runs: Vec<RunMetrics>) -> OutputPacket {
        let n = runs.len() as f64;
        let mean = |f: &dyn Fn(&RunMetrics) -> f64| runs.iter().map(f).sum::<f64>() / n;

        let final_balances: Vec<Cents> = runs.iter().map(|r| r.final_balance).collect();
        let mut sorted = final_balances.clone();
        sorted.sort_unstable();
        let finality = Finality {
            expected: mean(&|r| r.final_balance as f64),
            p5: percentile(&sorted, 0.05),
            p95: percentile(&sorted, 0.95),
            final_balances,
        };

        let horizon = runs.iter().map(|r| r.last_day).max().unwrap_or(0);
        let bankruptcies: Vec<Option<DayIndex>> = runs.iter().map(|r| r.bankruptcy_day).collect();
        let bankruptcy = BankruptcyStats::from_runs(&bankruptcies, horizon, self.config.collapse_bins);
        let deficit_flags: Vec<Vec<bool>> = runs.iter().map(|r| r.deficits.clone()).collect();

        let mean_drawdown = mean(&|r| r.worst_drawdown);
        let mean_recovery = mean(&|r| r.recovery_ratio);
        let mean_clustering = mean(&|r| r.shock_clustering);
        let mean_slope = mean(&|r| r.recovery_slope.unwrap_or(0.0));

        let risk = RiskMetrics {
            resilience_score: resilience_score(bankruptcy.probability, mean_drawdown, mean_recovery),
            worst_drawdown: runs.iter().map(|r| r.worst_drawdown).fold(0.0, f64::max),
            collapse_density: collapse_density(&deficit_flags, self.config.collapse_bins),
            shock_clustering: mean_clustering,
            rolling_volatility: mean(&|r| r.rolling_volatility),
            mean_liquidations: mean(&|r| r.liquidations as f64),
            bankruptcy,
        };

        let liquidity: Vec<f64> = runs.iter().filter_map(|r| r.final_liquidity_ratio).collect();
        let final_liquidity_ratio = if liquidity.is_empty() {
            None
        } else {
            Some(liquidity.iter().sum::<f64>() / liquidity.len() as f64)
        };

        let final_credit_score = mean(&|r| r.final_credit_score);
        let score = health_score(&HealthInputs {
            final_balance: finality.expected.round() as Cents,
            initial_balance: mean(&|r| r.initial_balance as f64).round() as Cents,
            credit_score: final_credit_score,
            credit_range: self.credit_range,
            bankruptcy_probability: risk.bankruptcy.probability,
            liquidity_ratio: final_liquidity_ratio,
            shock_clustering: mean_clustering,
            recovery_slope: mean_slope,
        });

        let health = HealthMetrics {
            score,
            status: FinancialStatus::from_score(score),
            grade: StabilityGrade::from_score(score),
            final_credit_score,
            credit_rating: CreditRating::from_score(final_credit_score),
            default_risk_probability: mean(&|r| if r.at_default_risk { 1.0 } else { 0.0 }),
            credit_min: runs.iter().map(|r| r.credit_min).fold(f64::INFINITY, f64::min),
            credit_max: runs.iter().map(|r| r.credit_max).fold(f64::NEG_INFINITY, f64::max),
            recovery_slope: mean_slope,
        };

        let assets = AssetMetrics {
            final_nav: mean(&|r| r.final_nav as f64),
            final_liquidity_ratio,
        };

        let pooled = TaxLedger {
            total_tax: runs.iter().map(|r| r.total_tax).fold(0, Cents::saturating_add),
            total_taxable: runs.iter().map(|r| r.total_taxable).fold(0, Cents::saturating_add),
            ..TaxLedger::default()
        };
        let tax = TaxMetrics {
            mean_total_tax: mean(&|r| r.total_tax as f64),
            effective_rate: effective_rate(&pooled),
        };

        let trajectory = std::mem::take(&mut runs[0].points);

        OutputPacket {
            runs: runs.len(),
            finality,
            risk,
            health,
            assets,
            tax,
            trajectory,
        }
    }
}

/// Linearly interpolated percentile of an ascending series, `q` in `[0, 1]`
pub fn percentile(sorted: &[Cents], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0] as f64,
        len => {
            let rank = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] as f64 + (sorted[hi] - sorted[lo]) as f64 * frac
        }
    }
}
