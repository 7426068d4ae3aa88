//! Simulation State
//!
//! One day's complete economic snapshot.
//!
//! # Critical Invariants
//!
//! 1. **Immutability**: a `SimulationState` is never mutated after it is
//!    constructed. Each day produces a new value.
//! 2. **Structural Sharing**: every sub-tree (cash, rates, asset and
//!    liability maps, individual records, ledgers) sits behind an `Arc`.
//!    The next day's state clones only the sub-trees its delta touches;
//!    everything else is the same allocation as the predecessor.
//! 3. **Fixed-point Money**: balances, valuations and ledgers are `i64`
//!    cents. Only the credit score is a float.
//! 4. **Referential Integrity**: every currency in `cash` has a rate in
//!    `rates`; every asset and liability currency is in `cash`.

use crate::core::time::DayIndex;
use crate::models::asset::{Asset, AssetClass, AssetId};
use crate::models::event::Event;
use crate::models::ledger::{GainsLedger, TaxLedger};
use crate::models::liability::{Liability, LiabilityId};
use crate::models::money::{Cents, CurrencyCode, RateTable};
use crate::rng::SubstreamCursor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Running counters carried from day to day for metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulators {
    /// Consecutive deficit days ending today
    pub deficit_streak: u32,

    /// Deficit days since day 0
    pub total_deficit_days: u32,

    /// First day of the current deficit streak
    pub streak_start: Option<DayIndex>,

    /// Liquidation sales since day 0
    pub liquidation_count: u32,

    /// Highest net worth observed, reporting currency
    pub peak_net_worth: Cents,

    /// Largest fall from peak net worth, basis points of the peak
    pub max_drawdown_bps: i64,
}

/// Complete simulation state for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub(crate) day: DayIndex,
    pub(crate) cash: Arc<BTreeMap<CurrencyCode, Cents>>,
    pub(crate) rates: Arc<RateTable>,
    pub(crate) assets: Arc<BTreeMap<AssetId, Arc<Asset>>>,
    pub(crate) liabilities: Arc<BTreeMap<LiabilityId, Arc<Liability>>>,
    pub(crate) credit_score: f64,
    pub(crate) gains: Arc<GainsLedger>,
    pub(crate) tax: Arc<TaxLedger>,
    pub(crate) accumulators: Accumulators,
    pub(crate) cursor: SubstreamCursor,

    /// Events recorded while producing this day
    pub(crate) events: Arc<Vec<Event>>,
}

impl SimulationState {
    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn day(&self) -> DayIndex {
        self.day
    }

    pub fn cash(&self) -> &BTreeMap<CurrencyCode, Cents> {
        &self.cash
    }

    /// Cash in one currency (zero when the currency is unknown)
    pub fn balance(&self, currency: &str) -> Cents {
        self.cash.get(currency).copied().unwrap_or(0)
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn reporting_currency(&self) -> &str {
        self.rates.reporting()
    }

    pub fn assets(&self) -> &BTreeMap<AssetId, Arc<Asset>> {
        &self.assets
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id).map(|a| a.as_ref())
    }

    pub fn liabilities(&self) -> &BTreeMap<LiabilityId, Arc<Liability>> {
        &self.liabilities
    }

    pub fn liability(&self, id: &str) -> Option<&Liability> {
        self.liabilities.get(id).map(|l| l.as_ref())
    }

    pub fn credit_score(&self) -> f64 {
        self.credit_score
    }

    pub fn gains(&self) -> &GainsLedger {
        &self.gains
    }

    pub fn tax(&self) -> &TaxLedger {
        &self.tax
    }

    pub fn accumulators(&self) -> &Accumulators {
        &self.accumulators
    }

    pub fn cursor(&self) -> SubstreamCursor {
        self.cursor
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // ========================================================================
    // Derived Quantities (reporting currency, today's rates)
    // ========================================================================

    fn reporting(&self, amount: Cents, currency: &str) -> Cents {
        self.rates.to_reporting(amount, currency).unwrap_or(0)
    }

    /// Sum of all cash balances
    pub fn total_cash(&self) -> Cents {
        self.cash
            .iter()
            .map(|(ccy, amount)| self.reporting(*amount, ccy))
            .sum()
    }

    /// Sum of all asset market values
    pub fn total_asset_value(&self) -> Cents {
        self.assets
            .values()
            .map(|a| self.reporting(a.market_value(), a.currency()))
            .sum()
    }

    /// Sum of all outstanding liabilities
    pub fn total_debt(&self) -> Cents {
        self.liabilities
            .values()
            .map(|l| self.reporting(l.outstanding(), l.currency()))
            .sum()
    }

    /// Net asset value: asset value minus liabilities
    pub fn net_asset_value(&self) -> Cents {
        self.total_asset_value() - self.total_debt()
    }

    /// Cash plus net asset value
    pub fn net_worth(&self) -> Cents {
        self.total_cash() + self.net_asset_value()
    }

    /// True when any currency balance is negative
    pub fn is_deficit(&self) -> bool {
        self.cash.values().any(|amount| *amount < 0)
    }

    /// Magnitude of all negative balances
    pub fn deficit_amount(&self) -> Cents {
        self.cash
            .iter()
            .filter(|(_, amount)| **amount < 0)
            .map(|(ccy, amount)| -self.reporting(*amount, ccy))
            .sum()
    }

    /// Positive cash plus unlocked liquid assets
    pub fn liquid_value(&self) -> Cents {
        let cash: Cents = self
            .cash
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(ccy, amount)| self.reporting(*amount, ccy))
            .sum();
        let liquid_assets: Cents = self
            .assets
            .values()
            .filter(|a| a.class() == AssetClass::Liquid && !a.is_locked(self.day))
            .map(|a| self.reporting(a.market_value(), a.currency()))
            .sum();
        cash + liquid_assets
    }

    /// Scheduled payments plus arrears due within the next billing month
    pub fn near_term_obligations(&self) -> Cents {
        self.liabilities
            .values()
            .filter(|l| !l.is_paid_off())
            .map(|l| self.reporting(l.amount_due(), l.currency()))
            .sum()
    }

    /// Liabilities whose currency balance cannot meet their amount due
    pub fn liabilities_at_default_risk(&self) -> impl Iterator<Item = &Liability> + '_ {
        self.liabilities
            .values()
            .map(|l| l.as_ref())
            .filter(|l| l.at_default_risk(self.balance(l.currency())))
    }

    pub fn at_default_risk(&self) -> bool {
        self.liabilities_at_default_risk().next().is_some()
    }

    /// Liquid value over near-term obligations; `None` without obligations
    pub fn liquidity_ratio(&self) -> Option<f64> {
        let obligations = self.near_term_obligations();
        if obligations <= 0 {
            return None;
        }
        Some(self.liquid_value() as f64 / obligations as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::money::RATE_SCALE;

    fn sample_state() -> SimulationState {
        let mut rates = RateTable::new("USD".to_string());
        rates.set_rate("EUR".to_string(), RATE_SCALE / 2);
        let mut cash = BTreeMap::new();
        cash.insert("USD".to_string(), 10_000);
        cash.insert("EUR".to_string(), -1_000);
        let mut assets = BTreeMap::new();
        assets.insert(
            "fund".to_string(),
            Arc::new(Asset::new("fund", AssetClass::Liquid, "USD", 10, 5_000)),
        );
        assets.insert(
            "house".to_string(),
            Arc::new(Asset::new("house", AssetClass::Illiquid, "USD", 1, 100_000)),
        );
        let mut liabilities = BTreeMap::new();
        liabilities.insert(
            "loan".to_string(),
            Arc::new(Liability::new("loan", "USD", 50_000, 0, 1_000)),
        );
        SimulationState {
            day: 3,
            cash: Arc::new(cash),
            rates: Arc::new(rates),
            assets: Arc::new(assets),
            liabilities: Arc::new(liabilities),
            credit_score: 650.0,
            gains: Arc::new(GainsLedger::default()),
            tax: Arc::new(TaxLedger::default()),
            accumulators: Accumulators::default(),
            cursor: SubstreamCursor { seed: 1, day: 3 },
            events: Arc::new(Vec::new()),
        }
    }

    #[test]
    fn test_reporting_totals() {
        let state = sample_state();
        // 1000 EUR cents at 0.5 EUR per USD is 2000 USD cents
        assert_eq!(state.total_cash(), 8_000);
        assert_eq!(state.deficit_amount(), 2_000);
        assert!(state.is_deficit());
        assert_eq!(state.net_asset_value(), 105_000 - 50_000);
        assert_eq!(state.net_worth(), 8_000 + 55_000);
    }

    #[test]
    fn test_liquidity_ratio_counts_liquid_assets_and_positive_cash() {
        let state = sample_state();
        assert_eq!(state.liquid_value(), 15_000);
        assert_eq!(state.near_term_obligations(), 1_000);
        assert_eq!(state.liquidity_ratio(), Some(15.0));
    }

    #[test]
    fn test_default_risk_reads_the_liability_currency() {
        let mut state = sample_state();
        assert!(!state.at_default_risk());

        let mut liabilities = state.liabilities.as_ref().clone();
        liabilities.insert(
            "eu_loan".to_string(),
            Arc::new(Liability::new("eu_loan", "EUR", 20_000, 0, 500)),
        );
        state.liabilities = Arc::new(liabilities);
        let at_risk: Vec<&str> = state.liabilities_at_default_risk().map(|l| l.id()).collect();
        assert_eq!(at_risk, vec!["eu_loan"]);
        assert!(state.at_default_risk());
    }
}
