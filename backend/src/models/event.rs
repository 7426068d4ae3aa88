//! Per-day event log
//!
//! Every state carries the events that produced it, in the component
//! resolution order. Events are informational: replaying a run reproduces
//! the same events, and metrics read them without re-simulating.

use crate::core::time::DayIndex;
use crate::models::money::{Cents, CurrencyCode};
use serde::{Deserialize, Serialize};

/// Simulation event capturing a state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Exchange-rate table published for the day
    RatesPublished { day: DayIndex },

    /// Recurring income posted
    Income {
        day: DayIndex,
        source_id: String,
        currency: CurrencyCode,
        amount: Cents,
    },

    /// Recurring expense posted
    Expense {
        day: DayIndex,
        item_id: String,
        currency: CurrencyCode,
        amount: Cents,
    },

    /// Scheduled liability payment made
    PaymentMade {
        day: DayIndex,
        liability_id: String,
        amount: Cents,
    },

    /// Scheduled liability payment missed
    PaymentMissed {
        day: DayIndex,
        liability_id: String,
        due: Cents,
        arrears_count: u32,
    },

    /// Liability restructured after repeated misses
    Restructured {
        day: DayIndex,
        liability_id: String,
        new_payment: Cents,
    },

    /// Units of an asset sold to cover a deficit
    Liquidation {
        day: DayIndex,
        asset_id: String,
        units: i64,
        gross: Cents,
        penalty: Cents,
        /// Proceeds credited, in the deficit currency
        proceeds: Cents,
        deficit_currency: CurrencyCode,
    },

    /// Surplus cash exchanged at the day's rate to cover a deficit
    CurrencyConverted {
        day: DayIndex,
        from: CurrencyCode,
        to: CurrencyCode,
        /// Amount taken, in `from`
        debited: Cents,
        /// Amount credited, in `to`
        credited: Cents,
    },

    /// Deficit left after every eligible asset was sold
    DeficitUncovered {
        day: DayIndex,
        currency: CurrencyCode,
        shortfall: Cents,
    },

    /// Annual tax assessed
    TaxAssessed {
        day: DayIndex,
        taxable: Cents,
        tax: Cents,
    },
}

impl Event {
    /// Day the event occurred
    pub fn day(&self) -> DayIndex {
        match self {
            Event::RatesPublished { day }
            | Event::Income { day, .. }
            | Event::Expense { day, .. }
            | Event::PaymentMade { day, .. }
            | Event::PaymentMissed { day, .. }
            | Event::Restructured { day, .. }
            | Event::Liquidation { day, .. }
            | Event::CurrencyConverted { day, .. }
            | Event::DeficitUncovered { day, .. }
            | Event::TaxAssessed { day, .. } => *day,
        }
    }

    pub fn is_liquidation(&self) -> bool {
        matches!(self, Event::Liquidation { .. })
    }
}
