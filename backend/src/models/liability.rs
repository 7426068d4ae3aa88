//! Liability records
//!
//! Interest accrues daily on the outstanding balance. The sub-cent part of
//! each day's interest is carried forward exactly, so that long horizons
//! never drift from the closed-form accrual.
//!
//! CRITICAL: All money values are i64 (cents)

use crate::models::money::{apply_bps, Cents, CurrencyCode, BPS_SCALE};
use serde::{Deserialize, Serialize};

/// Identifier of a liability
pub type LiabilityId = String;

/// A debt with a fixed monthly payment schedule
///
/// # Example
/// ```
/// use future_wallet_core_rs::models::liability::Liability;
///
/// let loan = Liability::new("car", "USD", 1_000_000, 500, 30_000);
/// let after = loan.accrue_interest(365);
/// assert!(after.outstanding() >= loan.outstanding());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liability {
    id: LiabilityId,
    currency: CurrencyCode,

    /// Original principal (cents)
    principal: Cents,

    /// Principal plus accrued interest not yet paid (cents)
    outstanding: Cents,

    /// Annual interest rate in basis points
    annual_rate_bps: i64,

    /// Scheduled payment per billing month (cents)
    monthly_payment: Cents,

    /// Consecutive missed payments
    arrears_count: u32,

    /// Missed scheduled amounts still owed (cents)
    arrears_amount: Cents,

    /// Times this liability has been restructured
    restructure_count: u32,

    /// Sub-cent interest remainder, in units of 1 / (BPS_SCALE * days_per_year) cents
    interest_carry: i64,
}

impl Liability {
    pub fn new(
        id: impl Into<LiabilityId>,
        currency: impl Into<CurrencyCode>,
        principal: Cents,
        annual_rate_bps: i64,
        monthly_payment: Cents,
    ) -> Self {
        Self {
            id: id.into(),
            currency: currency.into(),
            principal,
            outstanding: principal,
            annual_rate_bps,
            monthly_payment,
            arrears_count: 0,
            arrears_amount: 0,
            restructure_count: 0,
            interest_carry: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn principal(&self) -> Cents {
        self.principal
    }

    pub fn outstanding(&self) -> Cents {
        self.outstanding
    }

    pub fn annual_rate_bps(&self) -> i64 {
        self.annual_rate_bps
    }

    pub fn monthly_payment(&self) -> Cents {
        self.monthly_payment
    }

    pub fn arrears_count(&self) -> u32 {
        self.arrears_count
    }

    pub fn arrears_amount(&self) -> Cents {
        self.arrears_amount
    }

    pub fn restructure_count(&self) -> u32 {
        self.restructure_count
    }

    pub fn is_paid_off(&self) -> bool {
        self.outstanding <= 0
    }

    /// Amount due on a payment day: schedule plus arrears, capped at outstanding
    pub fn amount_due(&self) -> Cents {
        (self.monthly_payment + self.arrears_amount).min(self.outstanding.max(0))
    }

    /// True when `cash` in the liability's currency cannot meet the amount due
    pub fn at_default_risk(&self, cash: Cents) -> bool {
        !self.is_paid_off() && cash < self.amount_due()
    }

    /// Accrue one day of interest
    pub fn accrue_interest(&self, days_per_year: u32) -> Self {
        let mut next = self.clone();
        if self.outstanding <= 0 || self.annual_rate_bps <= 0 {
            return next;
        }
        let denominator = BPS_SCALE as i128 * days_per_year.max(1) as i128;
        let numerator =
            self.outstanding as i128 * self.annual_rate_bps as i128 + self.interest_carry as i128;
        next.outstanding += (numerator / denominator) as i64;
        next.interest_carry = (numerator % denominator) as i64;
        next
    }

    /// Apply a payment covering the amount due; clears arrears
    pub fn pay(&self, amount: Cents) -> Self {
        let mut next = self.clone();
        next.outstanding = (self.outstanding - amount).max(0);
        next.arrears_amount = 0;
        next.arrears_count = 0;
        if next.outstanding == 0 {
            next.interest_carry = 0;
        }
        next
    }

    /// Record a missed scheduled payment
    pub fn miss_payment(&self) -> Self {
        let mut next = self.clone();
        next.arrears_count += 1;
        next.arrears_amount = (self.arrears_amount + self.monthly_payment).min(self.outstanding);
        next
    }

    /// Restructure: reduce the scheduled payment by `relief_bps`, optionally
    /// reprice to `new_rate_bps`, and capitalise arrears (they remain inside
    /// `outstanding`)
    pub fn restructure(&self, relief_bps: i64, new_rate_bps: Option<i64>) -> Self {
        let mut next = self.clone();
        if let Some(rate) = new_rate_bps {
            next.annual_rate_bps = rate;
        }
        let relieved = self.monthly_payment - apply_bps(self.monthly_payment, relief_bps);
        next.monthly_payment = relieved.max(self.monthly_payment.min(1));
        next.arrears_amount = 0;
        next.arrears_count = 0;
        next.restructure_count += 1;
        next
    }
}
