//! Credit score
//!
//! Daily exponential smoothing towards a debt-ratio target, with jumps for
//! payment punctuality and restructuring events:
//!
//! ```text
//! score' = score + k1 * (target(dr) - score) + k2 * (on_time - missed) - k3 * restructurings
//! target(dr) = max - (max - min) * min(dr / ceiling, 1)
//! ```
//!
//! The result is clamped to `[min, max]`. Only basic IEEE-754 operations
//! are used, so the update is bit-exact across platforms.

use crate::components::{cashflow, currency, liabilities, Component, ComponentId, DayContext};
use crate::core::error::ComponentError;
use crate::models::delta::{RecordWrite, StateDelta, WriteScope};
use crate::models::money::Cents;
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ID: &str = "credit";

/// Gain constants and range of the credit score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditConfig {
    /// Smoothing gain towards the debt-ratio target
    pub k1: f64,
    /// Points per on-time payment (and lost per missed payment)
    pub k2: f64,
    /// Points lost per restructuring
    pub k3: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub initial_score: f64,
    /// Debt ratio at which the target bottoms out
    pub debt_ratio_ceiling: f64,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            k1: 0.01,
            k2: 2.0,
            k3: 25.0,
            min_score: 300.0,
            max_score: 850.0,
            initial_score: 650.0,
            debt_ratio_ceiling: 1.0,
        }
    }
}

impl CreditConfig {
    /// Target score for a debt ratio
    pub fn target(&self, debt_ratio: f64) -> f64 {
        let pressure = (debt_ratio / self.debt_ratio_ceiling).clamp(0.0, 1.0);
        self.max_score - (self.max_score - self.min_score) * pressure
    }

    pub fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.min_score, self.max_score)
    }
}

/// Rating band of a credit score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CreditRating {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl CreditRating {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 750.0 => CreditRating::Excellent,
            s if s >= 700.0 => CreditRating::Good,
            s if s >= 650.0 => CreditRating::Fair,
            s if s >= 600.0 => CreditRating::Poor,
            _ => CreditRating::VeryPoor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CreditRating::Excellent => "Excellent",
            CreditRating::Good => "Good",
            CreditRating::Fair => "Fair",
            CreditRating::Poor => "Poor",
            CreditRating::VeryPoor => "Very Poor",
        }
    }
}

impl fmt::Display for CreditRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct CreditScore {
    config: CreditConfig,
}

impl CreditScore {
    pub fn new(config: CreditConfig) -> Self {
        Self { config }
    }

    /// One smoothing step
    pub fn update(&self, score: f64, debt_ratio: f64, punctuality: i64, restructurings: u32) -> f64 {
        let c = &self.config;
        let next = score + c.k1 * (c.target(debt_ratio) - score) + c.k2 * punctuality as f64
            - c.k3 * restructurings as f64;
        c.clamp(next)
    }
}

impl Component for CreditScore {
    fn id(&self) -> &str {
        ID
    }

    fn dependencies(&self) -> Vec<ComponentId> {
        vec![
            currency::ID.to_string(),
            cashflow::ID.to_string(),
            liabilities::ID.to_string(),
        ]
    }

    fn writes(&self) -> Vec<WriteScope> {
        vec![WriteScope::CreditScore]
    }

    fn transform(
        &self,
        ctx: &DayContext<'_>,
        _rng: &mut RandomSource,
    ) -> Result<StateDelta, ComponentError> {
        let prior = ctx.prior();
        let rates = ctx.rates();
        let updates = ctx.input(liabilities::ID).map(|d| &d.liabilities);

        // Today's balances: same-day liability writes overlay the prior records
        let mut debt: Cents = 0;
        for (id, liability) in prior.liabilities() {
            let outstanding = match updates.and_then(|u| u.get(id)) {
                Some(RecordWrite::Insert(l)) | Some(RecordWrite::Update(l)) => l.outstanding(),
                Some(RecordWrite::Remove) => 0,
                None => liability.outstanding(),
            };
            let currency = liability.currency();
            debt += rates
                .to_reporting(outstanding, currency)
                .ok_or_else(|| ctx.error(ID, format!("no rate for {}", currency)))?;
        }

        let income: Cents = ctx
            .signals()
            .filter_map(|s| s.annualized_income)
            .sum();
        let debt_ratio = if income > 0 {
            debt as f64 / income as f64
        } else if debt > 0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (on_time, missed, restructurings) = ctx.signals().fold((0i64, 0i64, 0u32), |acc, s| {
            (
                acc.0 + s.payments_on_time as i64,
                acc.1 + s.payments_missed as i64,
                acc.2 + s.restructurings,
            )
        });

        let score = self.update(prior.credit_score(), debt_ratio, on_time - missed, restructurings);
        let mut delta = StateDelta::new();
        if score != prior.credit_score() {
            delta.credit_score = Some(score);
        }
        Ok(delta)
    }
}
