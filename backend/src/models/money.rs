//! Fixed-precision money and exchange rates
//!
//! CRITICAL: All money values are i64 (cents). Exchange rates are i64
//! fixed-point values scaled by [`RATE_SCALE`]. Intermediate products use
//! i128 so that no conversion ever touches binary floating point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Amount of money in minor units (cents)
pub type Cents = i64;

/// ISO-style currency code (e.g. "USD")
pub type CurrencyCode = String;

/// Fixed-point scale of exchange rates (1.0 == 1_000_000_000)
pub const RATE_SCALE: i64 = 1_000_000_000;

/// Basis points per unit (100% == 10_000 bps)
pub const BPS_SCALE: i64 = 10_000;

/// Parts per million per unit
pub const PPM_SCALE: i64 = 1_000_000;

/// Divide with rounding half away from zero
pub fn div_round(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator != 0, "division by zero");
    let denominator_abs = denominator.abs();
    let sign = if (numerator < 0) != (denominator < 0) { -1 } else { 1 };
    let n = numerator.abs();
    sign * ((n + denominator_abs / 2) / denominator_abs)
}

/// Saturating narrowing from i128 to i64
pub fn clamp_i64(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Apply a basis-point fraction to an amount (rounded half away from zero)
///
/// # Example
/// ```
/// use future_wallet_core_rs::models::money::apply_bps;
///
/// assert_eq!(apply_bps(10_000, 250), 250); // 2.5% of $100.00
/// ```
pub fn apply_bps(amount: Cents, bps: i64) -> Cents {
    clamp_i64(div_round(amount as i128 * bps as i128, BPS_SCALE as i128))
}

/// Scale an amount by `(1 + ppm / 1e6)`
pub fn apply_ppm_change(amount: Cents, change_ppm: i64) -> Cents {
    let factor = PPM_SCALE as i128 + change_ppm as i128;
    clamp_i64(div_round(amount as i128 * factor, PPM_SCALE as i128))
}

/// Exchange rates quoted against the reporting currency
///
/// `units_per_reporting[c]` is how many units of `c` one unit of the
/// reporting currency buys, scaled by [`RATE_SCALE`]. Cross rates are
/// always derived through the reporting currency so that A→B→A round
/// trips never drift beyond one cent of rounding.
///
/// # Example
/// ```
/// use future_wallet_core_rs::models::money::{RateTable, RATE_SCALE};
///
/// let mut table = RateTable::new("USD".to_string());
/// table.set_rate("EUR".to_string(), 920_000_000); // 1 USD = 0.92 EUR
///
/// assert_eq!(table.convert(10_000, "USD", "EUR"), Some(9_200));
/// assert_eq!(table.convert(9_200, "EUR", "USD"), Some(10_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    reporting: CurrencyCode,
    units_per_reporting: BTreeMap<CurrencyCode, i64>,
}

impl RateTable {
    /// Create a table containing only the reporting currency at par
    pub fn new(reporting: CurrencyCode) -> Self {
        let mut units_per_reporting = BTreeMap::new();
        units_per_reporting.insert(reporting.clone(), RATE_SCALE);
        Self {
            reporting,
            units_per_reporting,
        }
    }

    /// Reporting currency all rates are quoted against
    pub fn reporting(&self) -> &str {
        &self.reporting
    }

    /// Set the rate of `currency` (scaled units per reporting unit)
    ///
    /// The reporting currency is pinned at par and cannot be overwritten.
    pub fn set_rate(&mut self, currency: CurrencyCode, scaled_rate: i64) {
        if currency != self.reporting {
            self.units_per_reporting.insert(currency, scaled_rate);
        }
    }

    /// Scaled rate of `currency`, if quoted
    pub fn rate(&self, currency: &str) -> Option<i64> {
        self.units_per_reporting.get(currency).copied()
    }

    /// Quoted currencies in lexical order
    pub fn currencies(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.units_per_reporting.keys()
    }

    /// Convert `amount` between two quoted currencies
    ///
    /// Returns `None` if either currency is not quoted or a rate is zero.
    pub fn convert(&self, amount: Cents, from: &str, to: &str) -> Option<Cents> {
        if from == to {
            return Some(amount);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        if from_rate <= 0 || to_rate <= 0 {
            return None;
        }
        let converted = div_round(amount as i128 * to_rate as i128, from_rate as i128);
        Some(clamp_i64(converted))
    }

    /// Convert `amount` into the reporting currency
    pub fn to_reporting(&self, amount: Cents, from: &str) -> Option<Cents> {
        self.convert(amount, from, &self.reporting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_round_half_away_from_zero() {
        assert_eq!(div_round(5, 2), 3);
        assert_eq!(div_round(-5, 2), -3);
        assert_eq!(div_round(4, 3), 1);
        assert_eq!(div_round(-4, 3), -1);
    }

    #[test]
    fn test_apply_ppm_change() {
        assert_eq!(apply_ppm_change(1_000_000, 1_000), 1_001_000);
        assert_eq!(apply_ppm_change(1_000_000, -1_000_000), 0);
    }

    #[test]
    fn test_reporting_rate_pinned() {
        let mut table = RateTable::new("USD".to_string());
        table.set_rate("USD".to_string(), 5);
        assert_eq!(table.rate("USD"), Some(RATE_SCALE));
    }

    #[test]
    fn test_round_trip_drift_bounded() {
        let mut table = RateTable::new("USD".to_string());
        table.set_rate("PKR".to_string(), 278_500_000_000);
        let original = 1_234_567;
        let pkr = table.convert(original, "USD", "PKR").unwrap();
        let back = table.convert(pkr, "PKR", "USD").unwrap();
        assert!((back - original).abs() <= 1);
    }

    #[test]
    fn test_unknown_currency() {
        let table = RateTable::new("USD".to_string());
        assert_eq!(table.convert(100, "USD", "JPY"), None);
    }
}
