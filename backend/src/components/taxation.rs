//! Taxation
//!
//! Income and realized gains are accumulated in reporting currency at the
//! rate of the day they were realized. On each tax-year end the open
//! period (every day strictly before the assessment day) is assessed with
//! progressive marginal brackets and the tax is posted in reporting
//! currency. Unrealized gains are never taxed.

use crate::components::{cashflow, currency, Component, ComponentId, DayContext};
use crate::core::error::ComponentError;
use crate::models::delta::{PostingReason, StateDelta, WriteScope};
use crate::models::event::Event;
use crate::models::ledger::TaxLedger;
use crate::models::money::{apply_bps, Cents};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ID: &str = "taxation";

/// One marginal bracket: `rate_bps` applies to income above `threshold`
/// up to the next bracket's threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub threshold: Cents,
    pub rate_bps: i64,
}

impl TaxBracket {
    pub fn new(threshold: Cents, rate_bps: i64) -> Self {
        Self {
            threshold,
            rate_bps,
        }
    }
}

/// Tax owed on `taxable` under marginal brackets sorted by threshold
///
/// # Example
/// ```
/// use future_wallet_core_rs::components::{marginal_tax, TaxBracket};
///
/// let brackets = [TaxBracket::new(0, 0), TaxBracket::new(5_000_000, 1_000)];
/// // 10% on the $10,000 above $50,000
/// assert_eq!(marginal_tax(6_000_000, &brackets), 100_000);
/// ```
pub fn marginal_tax(taxable: Cents, brackets: &[TaxBracket]) -> Cents {
    portions(taxable, brackets)
        .map(|(portion, rate_bps)| apply_bps(portion, rate_bps))
        .sum()
}

/// Average rate on `taxable`, basis points rounded down
///
/// Computed from the exact bracket portions, so with non-decreasing bracket
/// rates it never falls as income grows and never exceeds the top rate.
pub fn effective_rate_bps(taxable: Cents, brackets: &[TaxBracket]) -> i64 {
    if taxable <= 0 {
        return 0;
    }
    let weighted: i128 = portions(taxable, brackets)
        .map(|(portion, rate_bps)| portion as i128 * rate_bps as i128)
        .sum();
    (weighted / taxable as i128) as i64
}

/// Tax charged over the taxable amount assessed since day 0, as a fraction
pub fn effective_rate(ledger: &TaxLedger) -> f64 {
    if ledger.total_taxable <= 0 {
        return 0.0;
    }
    ledger.total_tax as f64 / ledger.total_taxable as f64
}

/// `(portion, rate_bps)` of `taxable` falling into each bracket
fn portions(taxable: Cents, brackets: &[TaxBracket]) -> impl Iterator<Item = (Cents, i64)> + '_ {
    brackets
        .iter()
        .enumerate()
        .take_while(move |(_, bracket)| taxable > bracket.threshold)
        .map(move |(i, bracket)| {
            let upper = brackets
                .get(i + 1)
                .map(|next| next.threshold)
                .unwrap_or(Cents::MAX);
            (taxable.min(upper) - bracket.threshold, bracket.rate_bps)
        })
}

#[derive(Debug, Clone)]
pub struct Taxation {
    brackets: Vec<TaxBracket>,
}

impl Taxation {
    pub fn new(brackets: Vec<TaxBracket>) -> Self {
        Self { brackets }
    }
}

impl Component for Taxation {
    fn id(&self) -> &str {
        ID
    }

    fn dependencies(&self) -> Vec<ComponentId> {
        vec![currency::ID.to_string(), cashflow::ID.to_string()]
    }

    fn writes(&self) -> Vec<WriteScope> {
        vec![WriteScope::Tax]
    }

    fn transform(
        &self,
        ctx: &DayContext<'_>,
        _rng: &mut RandomSource,
    ) -> Result<StateDelta, ComponentError> {
        let day = ctx.day();
        let prior = ctx.prior();
        let mut ledger = prior.tax().clone();
        let mut delta = StateDelta::new();

        if ctx.calendar().is_year_end(day) {
            let gains = prior.gains();
            let taxable = ledger.period_income + ledger.pending_gains(gains);
            let tax = marginal_tax(taxable, &self.brackets);

            delta.post(prior.reporting_currency(), -tax, PostingReason::Tax);
            delta.events.push(Event::TaxAssessed { day, taxable, tax });
            debug!(day, taxable, tax, "tax assessed");

            ledger.period_income = 0;
            ledger.gains_assessed_through = gains.realized_reporting;
            ledger.last_assessment = tax;
            ledger.last_assessment_day = Some(day);
            ledger.total_tax += tax;
            ledger.total_taxable = ledger.total_taxable.saturating_add(taxable);
        }

        let income: Cents = ctx.signals().map(|s| s.income_reporting).sum();
        ledger.period_income += income;

        if ledger != *prior.tax() {
            delta.tax = Some(ledger);
        }
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_brackets() -> Vec<TaxBracket> {
        vec![
            TaxBracket::new(0, 0),
            TaxBracket::new(5_000_000, 1_000),
            TaxBracket::new(10_000_000, 2_000),
            TaxBracket::new(20_000_000, 3_000),
        ]
    }

    #[test]
    fn test_marginal_brackets() {
        let b = default_brackets();
        assert_eq!(marginal_tax(0, &b), 0);
        assert_eq!(marginal_tax(5_000_000, &b), 0);
        // $50k at 10% + $100k at 20% + $50k at 30%
        assert_eq!(marginal_tax(25_000_000, &b), 500_000 + 2_000_000 + 1_500_000);
    }

    #[test]
    fn test_negative_taxable_is_untaxed() {
        assert_eq!(marginal_tax(-10, &default_brackets()), 0);
        assert_eq!(effective_rate_bps(-10, &default_brackets()), 0);
    }

    #[test]
    fn test_effective_rate_averages_brackets() {
        let b = default_brackets();
        assert_eq!(effective_rate_bps(5_000_000, &b), 0);
        // 4_000_000 of tax on 25_000_000 is 16%
        assert_eq!(effective_rate_bps(25_000_000, &b), 1_600);

        let ledger = TaxLedger {
            total_tax: 900_000,
            total_taxable: 12_000_000,
            ..TaxLedger::default()
        };
        assert!((effective_rate(&ledger) - 0.075).abs() < 1e-12);
        assert_eq!(effective_rate(&TaxLedger::default()), 0.0);
    }
}
