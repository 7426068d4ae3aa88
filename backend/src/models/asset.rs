//! Asset holdings
//!
//! An asset is a quantity of whole units carrying a total market value,
//! a cost basis (for gain tracking) and a volatility class that decides
//! how it is revalued each day and in which order it is liquidated.
//!
//! CRITICAL: All money values are i64 (cents)

use crate::core::time::DayIndex;
use crate::models::money::{clamp_i64, div_round, Cents, CurrencyCode, BPS_SCALE};
use serde::{Deserialize, Serialize};

/// Identifier of an asset holding
pub type AssetId = String;

/// Volatility class of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    /// Cash-like holdings: value drifts only by small noise
    Liquid,
    /// Property and similar: valuation changes only on realization
    Illiquid,
    /// Deterministic accrual plus noise (bonds, deposits)
    YieldGenerating,
    /// Noise-driven valuation (equities, crypto)
    Volatile,
}

impl AssetClass {
    /// Liquidation rank (lower sells first)
    pub fn liquidity_rank(&self) -> u8 {
        match self {
            AssetClass::Liquid => 0,
            AssetClass::Volatile => 1,
            AssetClass::YieldGenerating => 2,
            AssetClass::Illiquid => 3,
        }
    }

    /// All classes in liquidation order
    pub fn all() -> [AssetClass; 4] {
        [
            AssetClass::Liquid,
            AssetClass::Volatile,
            AssetClass::YieldGenerating,
            AssetClass::Illiquid,
        ]
    }
}

/// Result of selling part (or all) of a holding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleOutcome {
    /// Units sold
    pub units: i64,
    /// Market value removed from the holding
    pub gross: Cents,
    /// Sale penalty withheld
    pub penalty: Cents,
    /// Cash received (`gross - penalty`), in the asset's currency
    pub net: Cents,
    /// Cost basis of the units sold
    pub basis: Cents,
}

impl SaleOutcome {
    /// Realized gain of the sale (net proceeds minus basis)
    pub fn realized_gain(&self) -> Cents {
        self.net - self.basis
    }
}

/// An asset holding
///
/// # Example
/// ```
/// use future_wallet_core_rs::models::asset::{Asset, AssetClass};
///
/// let savings = Asset::new("savings", AssetClass::Liquid, "USD", 100, 1_000_000)
///     .with_sale_penalty_bps(50);
/// assert_eq!(savings.market_value(), 1_000_000);
/// assert_eq!(savings.unrealized_gain(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    id: AssetId,
    class: AssetClass,
    currency: CurrencyCode,

    /// Whole units held
    quantity: i64,

    /// Total market value of all units (cents)
    market_value: Cents,

    /// Total cost basis of all units (cents)
    cost_basis: Cents,

    /// Fraction of gross value lost on sale, in basis points
    sale_penalty_bps: i64,

    /// Daily noise standard deviation in parts per million
    volatility_ppm: i64,

    /// Annual deterministic accrual in basis points (yield-generating only)
    annual_yield_bps: i64,

    /// Asset cannot be sold before this day
    locked_until: Option<DayIndex>,

    /// Sub-cent remainder of yield accrual
    yield_carry: i64,
}

impl Asset {
    /// Create a holding whose cost basis equals its market value
    pub fn new(
        id: impl Into<AssetId>,
        class: AssetClass,
        currency: impl Into<CurrencyCode>,
        quantity: i64,
        market_value: Cents,
    ) -> Self {
        Self {
            id: id.into(),
            class,
            currency: currency.into(),
            quantity,
            market_value,
            cost_basis: market_value,
            sale_penalty_bps: 0,
            volatility_ppm: 0,
            annual_yield_bps: 0,
            locked_until: None,
            yield_carry: 0,
        }
    }

    pub fn with_cost_basis(mut self, cost_basis: Cents) -> Self {
        self.cost_basis = cost_basis;
        self
    }

    pub fn with_sale_penalty_bps(mut self, bps: i64) -> Self {
        self.sale_penalty_bps = bps;
        self
    }

    pub fn with_volatility_ppm(mut self, ppm: i64) -> Self {
        self.volatility_ppm = ppm;
        self
    }

    pub fn with_annual_yield_bps(mut self, bps: i64) -> Self {
        self.annual_yield_bps = bps;
        self
    }

    pub fn locked_until(mut self, day: DayIndex) -> Self {
        self.locked_until = Some(day);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn market_value(&self) -> Cents {
        self.market_value
    }

    pub fn cost_basis(&self) -> Cents {
        self.cost_basis
    }

    pub fn sale_penalty_bps(&self) -> i64 {
        self.sale_penalty_bps
    }

    pub fn volatility_ppm(&self) -> i64 {
        self.volatility_ppm
    }

    pub fn annual_yield_bps(&self) -> i64 {
        self.annual_yield_bps
    }

    pub fn lock_day(&self) -> Option<DayIndex> {
        self.locked_until
    }

    pub fn yield_carry(&self) -> i64 {
        self.yield_carry
    }

    /// Locked assets cannot be liquidated
    pub fn is_locked(&self, day: DayIndex) -> bool {
        matches!(self.locked_until, Some(until) if day < until)
    }

    /// Mark-to-market gain not yet realized
    pub fn unrealized_gain(&self) -> Cents {
        self.market_value - self.cost_basis
    }

    /// Copy of this holding at a new market value
    pub fn revalued(&self, market_value: Cents, yield_carry: i64) -> Self {
        let mut next = self.clone();
        next.market_value = market_value.max(0);
        next.yield_carry = yield_carry;
        next
    }

    /// Gross value of `units` units at the current valuation (rounded down)
    pub fn gross_for_units(&self, units: i64) -> Cents {
        if self.quantity <= 0 {
            return 0;
        }
        clamp_i64(self.market_value as i128 * units as i128 / self.quantity as i128)
    }

    /// Net proceeds of selling `units` units
    pub fn net_for_units(&self, units: i64) -> Cents {
        let gross = self.gross_for_units(units);
        gross - self.penalty_on(gross)
    }

    fn penalty_on(&self, gross: Cents) -> Cents {
        clamp_i64(div_round(
            gross as i128 * self.sale_penalty_bps as i128,
            BPS_SCALE as i128,
        ))
    }

    /// Smallest unit count whose net proceeds cover `needed`
    ///
    /// Returns the full quantity if even a full sale does not cover it.
    pub fn units_to_cover(&self, needed: Cents) -> i64 {
        if needed <= 0 || self.quantity <= 0 {
            return 0;
        }
        if self.net_for_units(self.quantity) <= needed {
            return self.quantity;
        }
        // Binary search: net_for_units is monotone in units
        let (mut lo, mut hi) = (1_i64, self.quantity);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.net_for_units(mid) >= needed {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }

    /// Sell `units` whole units
    ///
    /// Returns the remaining holding (`None` if fully sold) and the outcome.
    pub fn sell(&self, units: i64) -> (Option<Asset>, SaleOutcome) {
        let units = units.clamp(0, self.quantity);
        let gross = self.gross_for_units(units);
        let penalty = self.penalty_on(gross);
        let basis = if self.quantity > 0 {
            clamp_i64(self.cost_basis as i128 * units as i128 / self.quantity as i128)
        } else {
            0
        };
        let outcome = SaleOutcome {
            units,
            gross,
            penalty,
            net: gross - penalty,
            basis,
        };

        if units == self.quantity {
            return (None, outcome);
        }
        let mut remaining = self.clone();
        remaining.quantity -= units;
        remaining.market_value -= gross;
        remaining.cost_basis -= basis;
        (Some(remaining), outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock() -> Asset {
        Asset::new("stock", AssetClass::Volatile, "USD", 100, 1_000_000)
            .with_cost_basis(800_000)
            .with_sale_penalty_bps(100)
    }

    #[test]
    fn test_partial_sale_preserves_value() {
        let asset = stock();
        let (remaining, outcome) = asset.sell(25);
        let remaining = remaining.unwrap();
        assert_eq!(outcome.gross, 250_000);
        assert_eq!(outcome.penalty, 2_500);
        assert_eq!(outcome.net, 247_500);
        assert_eq!(outcome.basis, 200_000);
        assert_eq!(remaining.market_value() + outcome.gross, asset.market_value());
        assert_eq!(remaining.quantity(), 75);
    }

    #[test]
    fn test_full_sale_removes_holding() {
        let (remaining, outcome) = stock().sell(100);
        assert!(remaining.is_none());
        assert_eq!(outcome.gross, 1_000_000);
        assert_eq!(outcome.realized_gain(), 990_000 - 800_000);
    }

    #[test]
    fn test_units_to_cover_is_minimal() {
        let asset = stock();
        let units = asset.units_to_cover(300_000);
        assert!(asset.net_for_units(units) >= 300_000);
        assert!(asset.net_for_units(units - 1) < 300_000);
    }

    #[test]
    fn test_lock_expires() {
        let asset = stock().locked_until(10);
        assert!(asset.is_locked(9));
        assert!(!asset.is_locked(10));
    }

    #[test]
    fn test_liquidity_rank_order() {
        let ranks: Vec<u8> = AssetClass::all().iter().map(|c| c.liquidity_rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }
}
