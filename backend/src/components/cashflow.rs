//! Recurring income and expenses
//!
//! Posts each item in its own currency on the days its frequency fires.
//! Publishes today's income and the annualized income run-rate, both in
//! reporting currency at today's rate, for taxation and credit scoring.

use crate::components::{currency, Component, ComponentId, DayContext};
use crate::core::error::ComponentError;
use crate::core::time::{Calendar, DayIndex};
use crate::models::delta::{PostingReason, StateDelta, WriteScope};
use crate::models::event::Event;
use crate::models::money::{Cents, CurrencyCode};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};

pub const ID: &str = "cashflow";

/// How often a recurring item is posted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// True if an item with this frequency posts on `day`
    pub fn fires_on(&self, day: DayIndex, calendar: &Calendar) -> bool {
        match self {
            Frequency::Daily => day > 0,
            Frequency::Weekly => calendar.is_week_end(day),
            Frequency::Monthly => calendar.is_month_end(day),
            Frequency::Yearly => calendar.is_year_end(day),
        }
    }

    /// Postings per calendar year
    pub fn per_year(&self, calendar: &Calendar) -> i64 {
        match self {
            Frequency::Daily => calendar.days_per_year as i64,
            Frequency::Weekly => (calendar.days_per_year / calendar.days_per_week.max(1)) as i64,
            Frequency::Monthly => calendar.months_per_year() as i64,
            Frequency::Yearly => 1,
        }
    }
}

/// A recurring income source or expense item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowItem {
    pub id: String,
    pub currency: CurrencyCode,

    /// Amount per occurrence (cents, positive)
    pub amount: Cents,

    pub frequency: Frequency,
}

impl CashFlowItem {
    pub fn new(
        id: impl Into<String>,
        currency: impl Into<CurrencyCode>,
        amount: Cents,
        frequency: Frequency,
    ) -> Self {
        Self {
            id: id.into(),
            currency: currency.into(),
            amount,
            frequency,
        }
    }

    /// Shorthand for a monthly item
    pub fn monthly(id: impl Into<String>, currency: impl Into<CurrencyCode>, amount: Cents) -> Self {
        Self::new(id, currency, amount, Frequency::Monthly)
    }

    /// Amount per calendar year in the item's currency; `None` on overflow
    pub fn annual_amount(&self, calendar: &Calendar) -> Option<Cents> {
        self.amount.checked_mul(self.frequency.per_year(calendar))
    }
}

#[derive(Debug, Clone)]
pub struct CashFlow {
    income: Vec<CashFlowItem>,
    expenses: Vec<CashFlowItem>,
}

impl CashFlow {
    pub fn new(income: Vec<CashFlowItem>, expenses: Vec<CashFlowItem>) -> Self {
        Self { income, expenses }
    }
}

impl Component for CashFlow {
    fn id(&self) -> &str {
        ID
    }

    fn dependencies(&self) -> Vec<ComponentId> {
        vec![currency::ID.to_string()]
    }

    fn writes(&self) -> Vec<WriteScope> {
        Vec::new()
    }

    fn transform(
        &self,
        ctx: &DayContext<'_>,
        _rng: &mut RandomSource,
    ) -> Result<StateDelta, ComponentError> {
        let day = ctx.day();
        let calendar = ctx.calendar();
        let rates = ctx.rates();
        let mut delta = StateDelta::new();
        let mut annualized: Cents = 0;

        for item in &self.income {
            let to_reporting = |amount: Cents| {
                rates.to_reporting(amount, &item.currency).ok_or_else(|| {
                    ctx.error(ID, format!("no rate for income currency {}", item.currency))
                })
            };
            let yearly = item
                .annual_amount(calendar)
                .ok_or_else(|| ctx.error(ID, format!("annual amount of {} overflows", item.id)))?;
            annualized = annualized
                .checked_add(to_reporting(yearly)?)
                .ok_or_else(|| ctx.error(ID, "annualized income overflows"))?;

            if item.frequency.fires_on(day, calendar) {
                delta.post(item.currency.clone(), item.amount, PostingReason::Income);
                delta.signals.income_reporting += to_reporting(item.amount)?;
                delta.events.push(Event::Income {
                    day,
                    source_id: item.id.clone(),
                    currency: item.currency.clone(),
                    amount: item.amount,
                });
            }
        }

        for item in &self.expenses {
            if item.frequency.fires_on(day, calendar) {
                delta.post(item.currency.clone(), -item.amount, PostingReason::Expense);
                delta.events.push(Event::Expense {
                    day,
                    item_id: item.id.clone(),
                    currency: item.currency.clone(),
                    amount: item.amount,
                });
            }
        }

        delta.signals.annualized_income = Some(annualized);
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_schedule() {
        let cal = Calendar::default();
        assert!(!Frequency::Monthly.fires_on(0, &cal));
        assert!(Frequency::Monthly.fires_on(30, &cal));
        assert!(!Frequency::Monthly.fires_on(31, &cal));
        assert!(Frequency::Weekly.fires_on(14, &cal));
        assert!(Frequency::Yearly.fires_on(365, &cal));
        assert!(Frequency::Daily.fires_on(1, &cal));
    }

    #[test]
    fn test_per_year() {
        let cal = Calendar::default();
        assert_eq!(Frequency::Monthly.per_year(&cal), 12);
        assert_eq!(Frequency::Weekly.per_year(&cal), 52);
        assert_eq!(Frequency::Daily.per_year(&cal), 365);
    }

    #[test]
    fn test_annual_amount_overflow_is_none() {
        let cal = Calendar::default();
        let rent = CashFlowItem::monthly("rent", "USD", 150_000);
        assert_eq!(rent.annual_amount(&cal), Some(1_800_000));
        let absurd = CashFlowItem::new("absurd", "USD", Cents::MAX / 100, Frequency::Daily);
        assert_eq!(absurd.annual_amount(&cal), None);
    }
}
