//! Gain and tax ledgers
//!
//! Gains are tracked per currency in native units. Realized gains are also
//! accumulated in the reporting currency at the rate of the day they were
//! realized, so a later rate move never re-expresses a past realization.

use crate::core::time::DayIndex;
use crate::models::money::{Cents, CurrencyCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Realized and unrealized capital gains
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainsLedger {
    /// Cumulative realized gains per currency (native units)
    pub realized: BTreeMap<CurrencyCode, Cents>,

    /// Cumulative realized gains in reporting currency, converted at realization
    pub realized_reporting: Cents,

    /// Current mark-to-market gains per currency (native units)
    pub unrealized: BTreeMap<CurrencyCode, Cents>,
}

impl GainsLedger {
    /// Record a realization converted at the day's rate
    pub fn realize(&mut self, currency: &str, native: Cents, reporting: Cents) {
        *self.realized.entry(currency.to_string()).or_insert(0) += native;
        self.realized_reporting += reporting;
    }
}

/// Income and gains awaiting assessment plus assessment history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxLedger {
    /// Income of the open tax period, reporting currency
    pub period_income: Cents,

    /// `GainsLedger::realized_reporting` already covered by an assessment
    pub gains_assessed_through: Cents,

    /// Tax charged by the most recent assessment
    pub last_assessment: Cents,

    /// Day of the most recent assessment
    pub last_assessment_day: Option<DayIndex>,

    /// Total tax charged since day 0
    pub total_tax: Cents,

    /// Total taxable amount assessed since day 0
    #[serde(default)]
    pub total_taxable: Cents,
}

impl TaxLedger {
    /// Realized gains not yet covered by an assessment (floored at zero)
    pub fn pending_gains(&self, gains: &GainsLedger) -> Cents {
        (gains.realized_reporting - self.gains_assessed_through).max(0)
    }
}
