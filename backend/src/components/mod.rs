//! Financial Components
//!
//! Every financial subsystem implements the [`Component`] contract: a
//! named node that declares which components it reads, which state it
//! writes, and a pure daily transform producing a [`StateDelta`].
//!
//! # Transform Contract
//!
//! ```text
//! (prior state, same-day deltas of dependencies, substream, day) -> delta
//! ```
//!
//! Components never mutate state. The stepper merges their deltas in
//! resolution order and the state store builds the next day from the
//! merged result.
//!
//! # Built-in Components
//!
//! | id            | reads                                   | writes            |
//! |---------------|-----------------------------------------|-------------------|
//! | `currency`    | -                                       | rates             |
//! | `cashflow`    | currency                                | (postings only)   |
//! | `liabilities` | currency, cashflow                      | liabilities       |
//! | `taxation`    | currency, cashflow                      | tax               |
//! | `assets`      | currency, cashflow, liabilities, taxation | assets, gains   |
//! | `credit`      | currency, cashflow, liabilities         | credit score      |
//!
//! `currency` has no same-day dependencies so it always executes first and
//! every dependent converts at the day's published table.

pub mod assets;
pub mod cashflow;
pub mod credit;
pub mod currency;
pub mod liabilities;
pub mod taxation;

use crate::core::error::ComponentError;
use crate::core::time::{Calendar, DayIndex};
use crate::models::delta::{DaySignals, PostingReason, StateDelta, WriteScope};
use crate::models::money::{Cents, RateTable};
use crate::models::state::SimulationState;
use crate::orchestrator::config::SimulationConfig;
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use assets::{AssetPortfolio, VolatilityRange};
pub use cashflow::{CashFlow, CashFlowItem, Frequency};
pub use credit::{CreditConfig, CreditRating, CreditScore};
pub use currency::CurrencyExchange;
pub use liabilities::{Liabilities, RestructurePolicy};
pub use taxation::{effective_rate, effective_rate_bps, marginal_tax, TaxBracket, Taxation};

/// Identifier of a component node
pub type ComponentId = String;

// ============================================================================
// Day Context
// ============================================================================

/// Read-only view handed to a component transform
pub struct DayContext<'a> {
    day: DayIndex,
    calendar: Calendar,
    prior: &'a SimulationState,
    inputs: BTreeMap<&'a str, &'a StateDelta>,
}

impl<'a> DayContext<'a> {
    pub fn new(day: DayIndex, calendar: Calendar, prior: &'a SimulationState) -> Self {
        Self {
            day,
            calendar,
            prior,
            inputs: BTreeMap::new(),
        }
    }

    /// Attach the same-day delta of a dependency
    pub fn with_input(mut self, component_id: &'a str, delta: &'a StateDelta) -> Self {
        self.inputs.insert(component_id, delta);
        self
    }

    pub fn day(&self) -> DayIndex {
        self.day
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// State at the end of the previous day
    pub fn prior(&self) -> &SimulationState {
        self.prior
    }

    /// Same-day delta of a declared dependency
    pub fn input(&self, component_id: &str) -> Option<&StateDelta> {
        self.inputs.get(component_id).copied()
    }

    /// Today's rate table: the one published by a dependency, else the prior day's
    pub fn rates(&self) -> &RateTable {
        self.inputs
            .values()
            .find_map(|delta| delta.rates.as_ref())
            .unwrap_or_else(|| self.prior.rates())
    }

    /// Income posted today by dependencies in `currency`
    pub fn income_today(&self, currency: &str) -> Cents {
        self.inputs
            .values()
            .flat_map(|delta| delta.postings.iter())
            .filter(|p| p.reason == PostingReason::Income && p.currency == currency)
            .map(|p| p.amount)
            .sum()
    }

    /// Net postings of dependencies per currency
    pub fn posted_today(&self, currency: &str) -> Cents {
        self.inputs
            .values()
            .flat_map(|delta| delta.postings.iter())
            .filter(|p| p.currency == currency)
            .map(|p| p.amount)
            .sum()
    }

    /// Signals published by dependencies, in id order
    pub fn signals(&self) -> impl Iterator<Item = &DaySignals> + '_ {
        self.inputs.values().map(|delta| &delta.signals)
    }

    /// Build a failure attributed to `component` on this day
    pub fn error(&self, component: &str, reason: impl Into<String>) -> ComponentError {
        ComponentError {
            component: component.to_string(),
            day: self.day,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Component Contract
// ============================================================================

/// A financial subsystem participating in the daily step
///
/// Implementations must be pure: the same context and random source
/// always yield the same delta.
pub trait Component: Send + Sync + fmt::Debug {
    /// Unique identifier; also the tie-break key of the execution order
    fn id(&self) -> &str;

    /// Components whose same-day output this one reads
    fn dependencies(&self) -> Vec<ComponentId>;

    /// State categories this component may overwrite
    fn writes(&self) -> Vec<WriteScope>;

    /// Produce today's delta
    fn transform(
        &self,
        ctx: &DayContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<StateDelta, ComponentError>;
}

// ============================================================================
// Registry
// ============================================================================

/// Built-in component variants selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Currency,
    CashFlow,
    Liabilities,
    Taxation,
    Assets,
    Credit,
}

impl ComponentKind {
    pub fn all() -> [ComponentKind; 6] {
        [
            ComponentKind::Currency,
            ComponentKind::CashFlow,
            ComponentKind::Liabilities,
            ComponentKind::Taxation,
            ComponentKind::Assets,
            ComponentKind::Credit,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            ComponentKind::Currency => currency::ID,
            ComponentKind::CashFlow => cashflow::ID,
            ComponentKind::Liabilities => liabilities::ID,
            ComponentKind::Taxation => taxation::ID,
            ComponentKind::Assets => assets::ID,
            ComponentKind::Credit => credit::ID,
        }
    }

    /// Instantiate this component from configuration
    pub fn build(&self, config: &SimulationConfig) -> Arc<dyn Component> {
        match self {
            ComponentKind::Currency => Arc::new(CurrencyExchange::new(config.fx_volatility_ppm)),
            ComponentKind::CashFlow => Arc::new(CashFlow::new(
                config.income.clone(),
                config.expenses.clone(),
            )),
            ComponentKind::Liabilities => Arc::new(Liabilities::new(config.restructuring)),
            ComponentKind::Taxation => Arc::new(Taxation::new(config.tax_brackets.clone())),
            ComponentKind::Assets => Arc::new(AssetPortfolio::new(config.asset_volatility.clone())),
            ComponentKind::Credit => Arc::new(CreditScore::new(config.credit)),
        }
    }
}

/// Instantiate every enabled component, in configuration order
pub fn build_components(config: &SimulationConfig) -> Vec<Arc<dyn Component>> {
    config
        .components
        .iter()
        .map(|kind| kind.build(config))
        .collect()
}
