//! Output packet
//!
//! The structured record handed to the reporting collaborator: Finality,
//! Risk, Health and Assets metric groups plus the per-day trajectory of a
//! representative run for charting.

use crate::components::CreditRating;
use crate::core::error::SimulationError;
use crate::core::time::DayIndex;
use crate::metrics::risk::BankruptcyStats;
use crate::metrics::status::{FinancialStatus, StabilityGrade};
use crate::models::money::Cents;
use crate::models::state::SimulationState;
use serde::{Deserialize, Serialize};

/// One day of a trajectory, reporting currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub day: DayIndex,
    pub total_cash: Cents,
    pub net_asset_value: Cents,
    pub net_worth: Cents,
    pub liquidity_ratio: Option<f64>,
    pub credit_score: f64,
    pub deficit: bool,
    pub deficit_amount: Cents,
    /// Deficit days in the trailing window ending today, as a fraction
    pub deficit_density: f64,
    /// Mean deficit amount over the trailing window
    pub deficit_intensity: f64,
    pub liquidations: u32,
}

impl TrajectoryPoint {
    pub fn from_state(state: &SimulationState) -> Self {
        Self {
            day: state.day(),
            total_cash: state.total_cash(),
            net_asset_value: state.net_asset_value(),
            net_worth: state.net_worth(),
            liquidity_ratio: state.liquidity_ratio(),
            credit_score: state.credit_score(),
            deficit: state.is_deficit(),
            deficit_amount: state.deficit_amount(),
            deficit_density: 0.0,
            deficit_intensity: 0.0,
            liquidations: state.events().iter().filter(|e| e.is_liquidation()).count() as u32,
        }
    }
}

/// Distribution of final balances across the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finality {
    pub expected: f64,
    pub p5: f64,
    pub p95: f64,
    pub final_balances: Vec<Cents>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub bankruptcy: BankruptcyStats,
    pub resilience_score: f64,
    pub worst_drawdown: f64,
    pub collapse_density: Vec<f64>,
    pub shock_clustering: f64,
    pub rolling_volatility: f64,
    pub mean_liquidations: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub score: f64,
    pub status: FinancialStatus,
    pub grade: StabilityGrade,
    pub final_credit_score: f64,
    /// Band of the mean final credit score
    pub credit_rating: CreditRating,
    /// Fraction of runs ending with a liability its currency balance cannot meet
    pub default_risk_probability: f64,
    pub credit_min: f64,
    pub credit_max: f64,
    /// Cents per day
    pub recovery_slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetrics {
    pub final_nav: f64,
    pub final_liquidity_ratio: Option<f64>,
}

/// Tax charged over the horizon, reporting currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxMetrics {
    pub mean_total_tax: f64,
    /// Total tax over total taxable amount, pooled across runs
    pub effective_rate: f64,
}

/// Complete result record of a run or ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPacket {
    pub runs: usize,
    pub finality: Finality,
    pub risk: RiskMetrics,
    pub health: HealthMetrics,
    pub assets: AssetMetrics,
    pub tax: TaxMetrics,
    pub trajectory: Vec<TrajectoryPoint>,
}

impl OutputPacket {
    pub fn to_json(&self) -> Result<String, SimulationError> {
        serde_json::to_string(self)
            .map_err(|e| SimulationError::Serialization(format!("Output packet export failed: {}", e)))
    }
}

// ============================================================================
// Branch Comparison
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSummary {
    pub branch: usize,
    pub expected_final_balance: f64,
    pub final_credit_score: f64,
    pub final_nav: f64,
    pub bankruptcy_probability: f64,
    pub resilience_score: f64,
    pub health_score: f64,
    pub status: FinancialStatus,
}

/// Side-by-side reduction of several output packets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchComparison {
    pub branches: Vec<BranchSummary>,
    pub best_final_balance: f64,
    pub worst_final_balance: f64,
    pub avg_final_balance: f64,
    pub best_credit_score: f64,
    pub worst_credit_score: f64,
    pub best_nav: f64,
    pub lowest_bankruptcy_probability: f64,
    pub highest_bankruptcy_probability: f64,
    /// Branch with the highest health score (first on ties)
    pub healthiest_branch: usize,
}

pub fn compare_branches(packets: &[OutputPacket]) -> Result<BranchComparison, SimulationError> {
    if packets.is_empty() {
        return Err(SimulationError::Configuration(
            "branch comparison needs at least one output packet".to_string(),
        ));
    }

    let branches: Vec<BranchSummary> = packets
        .iter()
        .enumerate()
        .map(|(branch, p)| BranchSummary {
            branch,
            expected_final_balance: p.finality.expected,
            final_credit_score: p.health.final_credit_score,
            final_nav: p.assets.final_nav,
            bankruptcy_probability: p.risk.bankruptcy.probability,
            resilience_score: p.risk.resilience_score,
            health_score: p.health.score,
            status: p.health.status,
        })
        .collect();

    let fold = |f: fn(&BranchSummary) -> f64, pick: fn(f64, f64) -> f64| {
        branches.iter().map(f).fold(f(&branches[0]), pick)
    };

    let mut healthiest_branch = 0;
    for b in &branches {
        if b.health_score > branches[healthiest_branch].health_score {
            healthiest_branch = b.branch;
        }
    }

    Ok(BranchComparison {
        best_final_balance: fold(|b| b.expected_final_balance, f64::max),
        worst_final_balance: fold(|b| b.expected_final_balance, f64::min),
        avg_final_balance: branches.iter().map(|b| b.expected_final_balance).sum::<f64>()
            / branches.len() as f64,
        best_credit_score: fold(|b| b.final_credit_score, f64::max),
        worst_credit_score: fold(|b| b.final_credit_score, f64::min),
        best_nav: fold(|b| b.final_nav, f64::max),
        lowest_bankruptcy_probability: fold(|b| b.bankruptcy_probability, f64::min),
        highest_bankruptcy_probability: fold(|b| b.bankruptcy_probability, f64::max),
        healthiest_branch,
        branches,
    })
}
