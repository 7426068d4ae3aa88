//! State deltas
//!
//! A delta is the partial state change one component produces for one day.
//! It carries two kinds of change:
//!
//! - **Postings**: additive cash movements. Integer addition is associative,
//!   so postings from any number of components merge without conflict.
//! - **Writes**: record overwrites (rate table, asset, liability, credit
//!   score, ledgers). Two components writing the same [`FieldKey`] must be
//!   connected by a dependency path, otherwise the merge is ambiguous.
//!
//! Deltas also carry [`DaySignals`], same-day outputs that dependents read
//! but that never enter the state.

use crate::models::asset::{Asset, AssetId};
use crate::models::event::Event;
use crate::models::ledger::{GainsLedger, TaxLedger};
use crate::models::liability::{Liability, LiabilityId};
use crate::models::money::{Cents, CurrencyCode, RateTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why cash moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingReason {
    Income,
    Expense,
    LiabilityPayment,
    Tax,
    LiquidationProceeds,
    /// Surplus in one currency exchanged to cover a deficit in another
    Conversion,
    Override,
}

/// An additive cash movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub currency: CurrencyCode,
    pub amount: Cents,
    pub reason: PostingReason,
}

impl Posting {
    pub fn new(currency: impl Into<CurrencyCode>, amount: Cents, reason: PostingReason) -> Self {
        Self {
            currency: currency.into(),
            amount,
            reason,
        }
    }
}

/// Overwrite of a keyed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordWrite<T> {
    /// Record absent from the prior state, declared new
    Insert(T),
    /// Replacement of an existing record
    Update(T),
    /// Removal of an existing record
    Remove,
}

/// Category of state a component may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WriteScope {
    Rates,
    Assets,
    Liabilities,
    CreditScore,
    Gains,
    Tax,
}

impl fmt::Display for WriteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteScope::Rates => "rates",
            WriteScope::Assets => "assets",
            WriteScope::Liabilities => "liabilities",
            WriteScope::CreditScore => "credit_score",
            WriteScope::Gains => "gains",
            WriteScope::Tax => "tax",
        };
        f.write_str(name)
    }
}

/// Individual state field addressed by a write
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Rates,
    Asset(AssetId),
    Liability(LiabilityId),
    CreditScore,
    Gains,
    Tax,
}

impl FieldKey {
    pub fn scope(&self) -> WriteScope {
        match self {
            FieldKey::Rates => WriteScope::Rates,
            FieldKey::Asset(_) => WriteScope::Assets,
            FieldKey::Liability(_) => WriteScope::Liabilities,
            FieldKey::CreditScore => WriteScope::CreditScore,
            FieldKey::Gains => WriteScope::Gains,
            FieldKey::Tax => WriteScope::Tax,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Rates => write!(f, "rates"),
            FieldKey::Asset(id) => write!(f, "asset:{}", id),
            FieldKey::Liability(id) => write!(f, "liability:{}", id),
            FieldKey::CreditScore => write!(f, "credit_score"),
            FieldKey::Gains => write!(f, "gains"),
            FieldKey::Tax => write!(f, "tax"),
        }
    }
}

/// Same-day outputs published for dependents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySignals {
    /// Income received today, converted to reporting currency at today's rate
    pub income_reporting: Cents,

    /// Configured income run-rate per year, reporting currency
    pub annualized_income: Option<Cents>,

    /// Scheduled payments made today
    pub payments_on_time: u32,

    /// Scheduled payments missed today
    pub payments_missed: u32,

    /// Liabilities restructured today
    pub restructurings: u32,

    /// Cash raised by liquidation today, reporting currency
    pub liquidated: Cents,

    /// Deficit left uncovered after liquidation, reporting currency
    pub uncovered_deficit: Cents,
}

/// Partial state change produced by one component for one day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub postings: Vec<Posting>,
    pub new_currencies: BTreeSet<CurrencyCode>,
    pub rates: Option<RateTable>,
    pub assets: BTreeMap<AssetId, RecordWrite<Asset>>,
    pub liabilities: BTreeMap<LiabilityId, RecordWrite<Liability>>,
    pub credit_score: Option<f64>,
    pub gains: Option<GainsLedger>,
    pub tax: Option<TaxLedger>,
    pub events: Vec<Event>,
    pub signals: DaySignals,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cash posting
    pub fn post(&mut self, currency: impl Into<CurrencyCode>, amount: Cents, reason: PostingReason) {
        if amount != 0 {
            self.postings.push(Posting::new(currency, amount, reason));
        }
    }

    /// Net postings per currency
    pub fn net_postings(&self) -> BTreeMap<CurrencyCode, Cents> {
        let mut totals = BTreeMap::new();
        for posting in &self.postings {
            *totals.entry(posting.currency.clone()).or_insert(0) += posting.amount;
        }
        totals
    }

    /// Fields overwritten by this delta, in deterministic order
    pub fn written_fields(&self) -> Vec<FieldKey> {
        let mut fields = Vec::new();
        if self.rates.is_some() {
            fields.push(FieldKey::Rates);
        }
        fields.extend(self.assets.keys().cloned().map(FieldKey::Asset));
        fields.extend(self.liabilities.keys().cloned().map(FieldKey::Liability));
        if self.credit_score.is_some() {
            fields.push(FieldKey::CreditScore);
        }
        if self.gains.is_some() {
            fields.push(FieldKey::Gains);
        }
        if self.tax.is_some() {
            fields.push(FieldKey::Tax);
        }
        fields
    }

    /// Fold `other` into `self`: postings and events append, writes overlay
    ///
    /// Callers are responsible for conflict detection; `absorb` only fixes the
    /// accumulation order.
    pub fn absorb(&mut self, other: &StateDelta) {
        self.postings.extend(other.postings.iter().cloned());
        self.new_currencies.extend(other.new_currencies.iter().cloned());
        if let Some(rates) = &other.rates {
            self.rates = Some(rates.clone());
        }
        for (id, write) in &other.assets {
            self.assets.insert(id.clone(), write.clone());
        }
        for (id, write) in &other.liabilities {
            self.liabilities.insert(id.clone(), write.clone());
        }
        if other.credit_score.is_some() {
            self.credit_score = other.credit_score;
        }
        if let Some(gains) = &other.gains {
            self.gains = Some(gains.clone());
        }
        if let Some(tax) = &other.tax {
            self.tax = Some(tax.clone());
        }
        self.events.extend(other.events.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
            && self.new_currencies.is_empty()
            && self.written_fields().is_empty()
            && self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_postings_are_skipped() {
        let mut delta = StateDelta::new();
        delta.post("USD", 0, PostingReason::Income);
        assert!(delta.postings.is_empty());
    }

    #[test]
    fn test_net_postings() {
        let mut delta = StateDelta::new();
        delta.post("USD", 500, PostingReason::Income);
        delta.post("USD", -200, PostingReason::Expense);
        delta.post("EUR", 10, PostingReason::Income);
        let net = delta.net_postings();
        assert_eq!(net["USD"], 300);
        assert_eq!(net["EUR"], 10);
    }

    #[test]
    fn test_absorb_overlays_writes() {
        let mut base = StateDelta::new();
        base.credit_score = Some(600.0);
        let mut later = StateDelta::new();
        later.credit_score = Some(610.0);
        later.post("USD", 5, PostingReason::Income);
        base.absorb(&later);
        assert_eq!(base.credit_score, Some(610.0));
        assert_eq!(base.postings.len(), 1);
        assert_eq!(base.written_fields(), vec![FieldKey::CreditScore]);
    }
}
