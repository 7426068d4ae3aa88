//! Initial economic state supplied by the caller

use crate::models::asset::Asset;
use crate::models::liability::Liability;
use crate::models::money::{Cents, CurrencyCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Starting position of a run (day 0)
///
/// # Example
/// ```
/// use future_wallet_core_rs::{Asset, AssetClass, InitialState};
///
/// let initial = InitialState::new()
///     .with_cash("USD", 250_000)
///     .with_asset(Asset::new("savings", AssetClass::Liquid, "USD", 100, 1_000_000));
/// assert_eq!(initial.cash["USD"], 250_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    /// Opening cash per currency
    pub cash: BTreeMap<CurrencyCode, Cents>,

    pub assets: Vec<Asset>,

    pub liabilities: Vec<Liability>,

    /// Opening credit score; falls back to the configured initial score
    pub credit_score: Option<f64>,
}

impl Default for InitialState {
    fn default() -> Self {
        Self::new()
    }
}

impl InitialState {
    pub fn new() -> Self {
        Self {
            cash: BTreeMap::new(),
            assets: Vec::new(),
            liabilities: Vec::new(),
            credit_score: None,
        }
    }

    pub fn with_cash(mut self, currency: impl Into<CurrencyCode>, amount: Cents) -> Self {
        self.cash.insert(currency.into(), amount);
        self
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_liability(mut self, liability: Liability) -> Self {
        self.liabilities.push(liability);
        self
    }

    pub fn with_credit_score(mut self, score: f64) -> Self {
        self.credit_score = Some(score);
        self
    }
}
