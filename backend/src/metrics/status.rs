//! Health score and qualitative status
//!
//! Six signals are mapped to `0..=100` and combined with fixed weights:
//!
//! | signal          | weight | mapping                                  |
//! |-----------------|--------|------------------------------------------|
//! | balance growth  | 0.20   | final / initial * 50, capped             |
//! | credit          | 0.20   | position inside the score range          |
//! | no bankruptcy   | 0.20   | (1 - probability) * 100                  |
//! | liquidity       | 0.15   | ratio * 100, capped                      |
//! | low shock       | 0.15   | 100 - clustering * 1000                  |
//! | recovery        | 0.10   | slope (currency units/day) * 10, capped  |

use crate::models::money::Cents;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signals feeding the health score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInputs {
    pub final_balance: Cents,
    pub initial_balance: Cents,
    pub credit_score: f64,
    pub credit_range: (f64, f64),
    pub bankruptcy_probability: f64,
    /// `None` when nothing is owed
    pub liquidity_ratio: Option<f64>,
    pub shock_clustering: f64,
    /// Cents per day
    pub recovery_slope: f64,
}

pub fn health_score(inputs: &HealthInputs) -> f64 {
    let balance = if inputs.initial_balance > 0 {
        (inputs.final_balance as f64 / inputs.initial_balance as f64 * 50.0).clamp(0.0, 100.0)
    } else if inputs.final_balance >= 0 {
        50.0
    } else {
        0.0
    };

    let (low, high) = inputs.credit_range;
    let credit = ((inputs.credit_score - low) / (high - low) * 100.0).clamp(0.0, 100.0);
    let solvency = (1.0 - inputs.bankruptcy_probability.clamp(0.0, 1.0)) * 100.0;
    let liquidity = inputs
        .liquidity_ratio
        .map(|r| (r * 100.0).clamp(0.0, 100.0))
        .unwrap_or(100.0);
    let shock = (100.0 - inputs.shock_clustering * 1_000.0).clamp(0.0, 100.0);
    let recovery = (inputs.recovery_slope.max(0.0) / 100.0 * 10.0).min(100.0);

    (0.20 * balance + 0.20 * credit + 0.20 * solvency + 0.15 * liquidity + 0.15 * shock
        + 0.10 * recovery)
        .clamp(0.0, 100.0)
}

/// Qualitative financial status, from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FinancialStatus {
    Thriving,
    Confident,
    Stable,
    Cautious,
    Stressed,
    Critical,
    Collapsed,
}

impl FinancialStatus {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => FinancialStatus::Thriving,
            s if s >= 75.0 => FinancialStatus::Confident,
            s if s >= 60.0 => FinancialStatus::Stable,
            s if s >= 45.0 => FinancialStatus::Cautious,
            s if s >= 30.0 => FinancialStatus::Stressed,
            s if s >= 15.0 => FinancialStatus::Critical,
            _ => FinancialStatus::Collapsed,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FinancialStatus::Thriving => "Strong sustained growth",
            FinancialStatus::Confident => "Solid position with a healthy trajectory",
            FinancialStatus::Stable => "Steady state with manageable risk",
            FinancialStatus::Cautious => "Elevated risk; tighter controls recommended",
            FinancialStatus::Stressed => "Financial strain; corrective action needed",
            FinancialStatus::Critical => "Severe distress; immediate intervention required",
            FinancialStatus::Collapsed => "Financial collapse has occurred",
        }
    }
}

impl fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Letter grade of long-run stability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StabilityGrade {
    S,
    A,
    BPlus,
    B,
    C,
    D,
    F,
}

impl StabilityGrade {
    pub fn from_score(score: f64) -> Self {
        match FinancialStatus::from_score(score) {
            FinancialStatus::Thriving => StabilityGrade::S,
            FinancialStatus::Confident => StabilityGrade::A,
            FinancialStatus::Stable => StabilityGrade::BPlus,
            FinancialStatus::Cautious => StabilityGrade::B,
            FinancialStatus::Stressed => StabilityGrade::C,
            FinancialStatus::Critical => StabilityGrade::D,
            FinancialStatus::Collapsed => StabilityGrade::F,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StabilityGrade::S => "Exceptional Stability",
            StabilityGrade::A => "Strong Stability",
            StabilityGrade::BPlus => "Moderate Stability",
            StabilityGrade::B => "Low Stability",
            StabilityGrade::C => "Fragile",
            StabilityGrade::D => "Unstable",
            StabilityGrade::F => "Critical",
        }
    }
}

impl fmt::Display for StabilityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            StabilityGrade::S => "S",
            StabilityGrade::A => "A",
            StabilityGrade::BPlus => "B+",
            StabilityGrade::B => "B",
            StabilityGrade::C => "C",
            StabilityGrade::D => "D",
            StabilityGrade::F => "F",
        };
        f.write_str(letter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ladder() {
        assert_eq!(FinancialStatus::from_score(95.0), FinancialStatus::Thriving);
        assert_eq!(FinancialStatus::from_score(60.0), FinancialStatus::Stable);
        assert_eq!(FinancialStatus::from_score(14.9), FinancialStatus::Collapsed);
        assert_eq!(StabilityGrade::from_score(61.0).to_string(), "B+");
    }

    #[test]
    fn test_health_extremes() {
        let best = HealthInputs {
            final_balance: 300,
            initial_balance: 100,
            credit_score: 850.0,
            credit_range: (300.0, 850.0),
            bankruptcy_probability: 0.0,
            liquidity_ratio: Some(5.0),
            shock_clustering: 0.0,
            recovery_slope: 1_000_000.0,
        };
        assert!((health_score(&best) - 100.0).abs() < 1e-9);

        let worst = HealthInputs {
            final_balance: -100,
            initial_balance: 100,
            credit_score: 300.0,
            bankruptcy_probability: 1.0,
            liquidity_ratio: Some(0.0),
            shock_clustering: 1.0,
            recovery_slope: -5.0,
            ..best
        };
        assert_eq!(health_score(&worst), 0.0);
    }
}
