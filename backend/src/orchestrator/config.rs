//! Simulation configuration
//!
//! The core receives configuration as an already-structured value; file
//! parsing belongs to the caller. [`SimulationConfig::validate`] rejects
//! every statically detectable defect before a run starts.

use crate::components::{
    CashFlowItem, ComponentKind, CreditConfig, RestructurePolicy, TaxBracket, VolatilityRange,
};
use crate::core::error::SimulationError;
use crate::core::time::{Calendar, DayIndex};
use crate::metrics::MetricsConfig;
use crate::models::asset::AssetClass;
use crate::models::money::{Cents, CurrencyCode, BPS_SCALE, PPM_SCALE, RATE_SCALE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Longest supported horizon (30 years)
pub const MAX_HORIZON_DAYS: DayIndex = 10_950;

/// Complete simulation configuration
///
/// # Example
/// ```
/// use future_wallet_core_rs::{CashFlowItem, SimulationConfig};
///
/// let config = SimulationConfig {
///     horizon_days: 365,
///     income: vec![CashFlowItem::monthly("salary", "USD", 500_000)],
///     ..SimulationConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Supported currency set
    pub currencies: BTreeSet<CurrencyCode>,

    /// Currency all metrics and taxes are expressed in
    pub reporting_currency: CurrencyCode,

    /// Day-0 rates: units of currency per reporting unit, scaled by 1e9
    pub initial_rates: BTreeMap<CurrencyCode, i64>,

    /// Daily FX volatility, parts per million
    pub fx_volatility_ppm: i64,

    /// Marginal tax brackets, ascending thresholds starting at zero
    pub tax_brackets: Vec<TaxBracket>,

    /// Per-class bounds on asset volatility
    pub asset_volatility: BTreeMap<AssetClass, VolatilityRange>,

    /// Number of days to simulate
    pub horizon_days: DayIndex,

    pub seed: u64,

    /// Enabled components; dependencies on disabled ones are dropped
    pub components: Vec<ComponentKind>,

    pub credit: CreditConfig,

    pub restructuring: RestructurePolicy,

    pub calendar: Calendar,

    pub metrics: MetricsConfig,

    pub income: Vec<CashFlowItem>,

    pub expenses: Vec<CashFlowItem>,

    /// Run components of one dependency level on the rayon pool
    pub parallel_components: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let currencies: BTreeSet<CurrencyCode> = ["USD", "EUR", "GBP", "PKR"]
            .iter()
            .map(|c| c.to_string())
            .collect();

        let initial_rates: BTreeMap<CurrencyCode, i64> = [
            ("USD", RATE_SCALE),
            ("EUR", 920_000_000),
            ("GBP", 790_000_000),
            ("PKR", 278_500_000_000),
        ]
        .iter()
        .map(|(c, r)| (c.to_string(), *r))
        .collect();

        let asset_volatility: BTreeMap<AssetClass, VolatilityRange> = [
            (AssetClass::Liquid, VolatilityRange::new(0, 500)),
            (AssetClass::Illiquid, VolatilityRange::new(0, 0)),
            (AssetClass::YieldGenerating, VolatilityRange::new(0, 2_000)),
            (AssetClass::Volatile, VolatilityRange::new(5_000, 50_000)),
        ]
        .into_iter()
        .collect();

        Self {
            currencies,
            reporting_currency: "USD".to_string(),
            initial_rates,
            fx_volatility_ppm: 10_000,
            tax_brackets: vec![
                TaxBracket::new(0, 0),
                TaxBracket::new(5_000_000, 1_000),
                TaxBracket::new(10_000_000, 2_000),
                TaxBracket::new(20_000_000, 3_000),
            ],
            asset_volatility,
            horizon_days: 1_825,
            seed: 42,
            components: ComponentKind::all().to_vec(),
            credit: CreditConfig::default(),
            restructuring: RestructurePolicy::default(),
            calendar: Calendar::default(),
            metrics: MetricsConfig::default(),
            income: Vec::new(),
            expenses: Vec::new(),
            parallel_components: false,
        }
    }
}

fn invalid(message: impl Into<String>) -> SimulationError {
    SimulationError::Configuration(message.into())
}

impl SimulationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.currencies.is_empty() {
            return Err(invalid("currency set must not be empty"));
        }
        if !self.currencies.contains(&self.reporting_currency) {
            return Err(invalid(format!(
                "reporting currency {} is not supported",
                self.reporting_currency
            )));
        }
        for currency in &self.currencies {
            match self.initial_rates.get(currency) {
                None if *currency != self.reporting_currency => {
                    return Err(invalid(format!("no initial rate for {}", currency)));
                }
                Some(rate) if *rate <= 0 => {
                    return Err(invalid(format!("rate for {} must be positive", currency)));
                }
                _ => {}
            }
        }
        if let Some(unknown) = self.initial_rates.keys().find(|c| !self.currencies.contains(*c)) {
            return Err(invalid(format!("rate given for unsupported currency {}", unknown)));
        }
        if !(0..PPM_SCALE).contains(&self.fx_volatility_ppm) {
            return Err(invalid("fx_volatility_ppm must be in [0, 1e6)"));
        }

        self.validate_brackets()?;

        for (class, range) in &self.asset_volatility {
            if !range.is_valid() || range.max_ppm >= PPM_SCALE {
                return Err(invalid(format!("invalid volatility range for {:?}", class)));
            }
        }

        if self.horizon_days == 0 {
            return Err(invalid("horizon_days must be > 0"));
        }
        if self.horizon_days > MAX_HORIZON_DAYS {
            return Err(invalid(format!(
                "horizon_days must not exceed {} (30 years)",
                MAX_HORIZON_DAYS
            )));
        }
        if !self.calendar.is_valid() {
            return Err(invalid("calendar cadences must be > 0"));
        }

        let mut kinds = BTreeSet::new();
        for kind in &self.components {
            if !kinds.insert(kind) {
                return Err(invalid(format!("component {} enabled twice", kind.id())));
            }
        }

        let credit = &self.credit;
        let finite = [credit.k1, credit.k2, credit.k3, credit.min_score, credit.max_score]
            .iter()
            .all(|v| v.is_finite());
        if !finite || credit.min_score >= credit.max_score {
            return Err(invalid("credit score range is invalid"));
        }
        if !(0.0..=1.0).contains(&credit.k1) || credit.k2 < 0.0 || credit.k3 < 0.0 {
            return Err(invalid("credit gains must be non-negative and k1 <= 1"));
        }
        if !(credit.min_score..=credit.max_score).contains(&credit.initial_score) {
            return Err(invalid("initial credit score outside the score range"));
        }
        if !(credit.debt_ratio_ceiling > 0.0 && credit.debt_ratio_ceiling.is_finite()) {
            return Err(invalid("debt_ratio_ceiling must be positive"));
        }

        let relief = self.restructuring.relief_bps;
        if !(0..=BPS_SCALE).contains(&relief) || self.restructuring.after_missed == 0 {
            return Err(invalid("restructuring policy is invalid"));
        }
        if self.restructuring.new_rate_bps.is_some_and(|r| r < 0) {
            return Err(invalid("restructured interest rate must not be negative"));
        }

        let mut item_ids = BTreeSet::new();
        for item in self.income.iter().chain(self.expenses.iter()) {
            if !self.currencies.contains(&item.currency) {
                return Err(invalid(format!(
                    "cash-flow item {} uses unsupported currency {}",
                    item.id, item.currency
                )));
            }
            if item.amount < 0 {
                return Err(invalid(format!("cash-flow item {} has a negative amount", item.id)));
            }
            if !item_ids.insert(&item.id) {
                return Err(invalid(format!("duplicate cash-flow item id {}", item.id)));
            }
            if item.annual_amount(&self.calendar).is_none() {
                return Err(invalid(format!("annual amount of cash-flow item {} overflows", item.id)));
            }
        }
        self.income
            .iter()
            .try_fold(0 as Cents, |total, item| {
                item.annual_amount(&self.calendar)
                    .and_then(|yearly| total.checked_add(yearly))
            })
            .ok_or_else(|| invalid("annualized income overflows"))?;

        self.metrics.validate()?;
        Ok(())
    }

    fn validate_brackets(&self) -> Result<(), SimulationError> {
        let first = self
            .tax_brackets
            .first()
            .ok_or_else(|| invalid("tax bracket table must not be empty"))?;
        if first.threshold != 0 {
            return Err(invalid("first tax bracket must start at 0"));
        }
        for pair in self.tax_brackets.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(invalid("tax brackets must have strictly ascending thresholds"));
            }
        }
        if self
            .tax_brackets
            .iter()
            .any(|b| !(0..=BPS_SCALE).contains(&b.rate_bps))
        {
            return Err(invalid("tax rates must be within [0, 10000] bps"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Frequency;

    #[test]
    fn test_default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_horizon_bounds() {
        let mut config = SimulationConfig::default();
        config.horizon_days = 0;
        assert!(config.validate().is_err());
        config.horizon_days = MAX_HORIZON_DAYS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsorted_brackets_rejected() {
        let mut config = SimulationConfig::default();
        config.tax_brackets.swap(1, 2);
        assert!(matches!(config.validate(), Err(SimulationError::Configuration(_))));
    }

    #[test]
    fn test_unknown_cashflow_currency_rejected() {
        let mut config = SimulationConfig::default();
        config.expenses.push(CashFlowItem::monthly("rent", "JPY", 100));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overflowing_annual_income_rejected() {
        let mut config = SimulationConfig::default();
        config.income.push(CashFlowItem::new(
            "windfall",
            "USD",
            i64::MAX / 100,
            Frequency::Daily,
        ));
        assert!(matches!(config.validate(), Err(SimulationError::Configuration(_))));

        let mut config = SimulationConfig::default();
        for id in ["a", "b"] {
            config.income.push(CashFlowItem::new(
                id,
                "USD",
                i64::MAX / 20,
                Frequency::Monthly,
            ));
        }
        assert!(matches!(config.validate(), Err(SimulationError::Configuration(_))));
    }

    #[test]
    fn test_negative_restructured_rate_rejected() {
        let mut config = SimulationConfig::default();
        config.restructuring.new_rate_bps = Some(-1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = SimulationConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
