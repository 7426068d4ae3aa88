//! Asset portfolio
//!
//! Revalues every holding once per day according to its class and covers
//! cash deficits by liquidation.
//!
//! # Revaluation
//!
//! - **Liquid**: small noise only
//! - **Illiquid**: unchanged; value moves only when units are sold
//! - **YieldGenerating**: deterministic daily accrual plus noise
//! - **Volatile**: noise-driven
//!
//! Noise is drawn from the component's substream in asset-id order, with a
//! per-class volatility range bounding each asset's configured volatility.
//!
//! # Liquidation
//!
//! After revaluation, every currency whose projected balance (prior cash
//! plus today's postings of dependencies) is negative is covered, in
//! currency order. Positive balances in other currencies are exchanged
//! first, in currency order, at today's rate. Whatever remains is covered
//! by selling unlocked holdings ranked by
//! `(liquidity rank, sale penalty, asset id)`. Each sale is the smallest
//! whole-unit count covering the remaining deficit. Proceeds are converted
//! into the deficit currency at today's rate. A deficit that outlasts every
//! eligible holding is recorded, not raised.

use crate::components::{cashflow, currency, liabilities, taxation, Component, ComponentId, DayContext};
use crate::core::error::ComponentError;
use crate::models::asset::{Asset, AssetClass, AssetId};
use crate::models::delta::{PostingReason, RecordWrite, StateDelta, WriteScope};
use crate::models::event::Event;
use crate::models::money::{apply_ppm_change, Cents, CurrencyCode, RateTable, BPS_SCALE};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const ID: &str = "assets";

/// Bounds on the daily volatility of an asset class, parts per million
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityRange {
    pub min_ppm: i64,
    pub max_ppm: i64,
}

impl VolatilityRange {
    pub fn new(min_ppm: i64, max_ppm: i64) -> Self {
        Self { min_ppm, max_ppm }
    }

    pub fn clamp(&self, ppm: i64) -> i64 {
        ppm.clamp(self.min_ppm, self.max_ppm)
    }

    pub fn is_valid(&self) -> bool {
        self.min_ppm >= 0 && self.min_ppm <= self.max_ppm
    }
}

#[derive(Debug, Clone)]
pub struct AssetPortfolio {
    volatility: BTreeMap<AssetClass, VolatilityRange>,
}

impl AssetPortfolio {
    pub fn new(volatility: BTreeMap<AssetClass, VolatilityRange>) -> Self {
        Self { volatility }
    }

    fn sigma(&self, asset: &Asset) -> i64 {
        match self.volatility.get(&asset.class()) {
            Some(range) => range.clamp(asset.volatility_ppm()),
            None => asset.volatility_ppm().max(0),
        }
    }

    /// Today's valuation of one holding
    fn revalue(&self, asset: &Asset, days_per_year: u32, rng: &mut RandomSource) -> Asset {
        let value = asset.market_value();
        match asset.class() {
            AssetClass::Illiquid => asset.clone(),
            AssetClass::Liquid | AssetClass::Volatile => {
                let noise = rng.gaussian_ppm(self.sigma(asset));
                asset.revalued(apply_ppm_change(value, noise), asset.yield_carry())
            }
            AssetClass::YieldGenerating => {
                let denominator = BPS_SCALE as i128 * days_per_year.max(1) as i128;
                let numerator = value as i128 * asset.annual_yield_bps() as i128
                    + asset.yield_carry() as i128;
                let accrual = (numerator / denominator) as i64;
                let carry = (numerator % denominator) as i64;
                let noise = rng.gaussian_ppm(self.sigma(asset));
                asset.revalued(apply_ppm_change(value + accrual, noise), carry)
            }
        }
    }
}

/// Outcome of covering one currency's deficit
struct Coverage {
    raised: Cents,
    shortfall: Cents,
}

impl AssetPortfolio {
    /// Exchange positive balances of other currencies into `deficit_ccy`
    /// until `needed` is covered; returns the amount credited
    fn exchange_surplus(
        &self,
        ctx: &DayContext<'_>,
        rates: &RateTable,
        deficit_ccy: &str,
        needed: Cents,
        balances: &mut BTreeMap<CurrencyCode, Cents>,
        delta: &mut StateDelta,
    ) -> Result<Cents, ComponentError> {
        let day = ctx.day();
        let sources: Vec<CurrencyCode> = balances
            .iter()
            .filter(|(ccy, balance)| ccy.as_str() != deficit_ccy && **balance > 0)
            .map(|(ccy, _)| ccy.clone())
            .collect();

        let mut credited_total = 0;
        for source in sources {
            if credited_total >= needed {
                break;
            }
            let surplus = balances.get(&source).copied().unwrap_or(0);
            let wanted = rates
                .convert(needed - credited_total, deficit_ccy, &source)
                .ok_or_else(|| ctx.error(ID, format!("no rate for {}", source)))?;
            // One cent of headroom against conversion rounding
            let debited = wanted.saturating_add(1).min(surplus);
            let credited = rates
                .convert(debited, &source, deficit_ccy)
                .ok_or_else(|| ctx.error(ID, format!("no rate for {}", deficit_ccy)))?;
            if credited <= 0 {
                continue;
            }

            delta.post(source.clone(), -debited, PostingReason::Conversion);
            delta.post(deficit_ccy, credited, PostingReason::Conversion);
            balances.insert(source.clone(), surplus - debited);
            debug!(day, from = %source, to = deficit_ccy, debited, credited, "surplus exchanged");
            delta.events.push(Event::CurrencyConverted {
                day,
                from: source,
                to: deficit_ccy.to_string(),
                debited,
                credited,
            });
            credited_total += credited;
        }
        Ok(credited_total)
    }

    /// Sell holdings from `book` until `needed` (in `deficit_ccy`) is covered
    fn liquidate(
        &self,
        ctx: &DayContext<'_>,
        rates: &RateTable,
        deficit_ccy: &str,
        needed: Cents,
        book: &mut BTreeMap<AssetId, Asset>,
        delta: &mut StateDelta,
    ) -> Result<Coverage, ComponentError> {
        let day = ctx.day();
        let mut candidates: Vec<(u8, i64, AssetId)> = book
            .values()
            .filter(|a| !a.is_locked(day) && a.quantity() > 0 && a.market_value() > 0)
            .map(|a| (a.class().liquidity_rank(), a.sale_penalty_bps(), a.id().to_string()))
            .collect();
        candidates.sort();

        let mut remaining = needed;
        let mut raised = 0;
        for (_, _, id) in candidates {
            if remaining <= 0 {
                break;
            }
            let Some(asset) = book.get(&id) else { continue };
            let asset_ccy = asset.currency().to_string();

            let mut need_native = rates
                .convert(remaining, deficit_ccy, &asset_ccy)
                .ok_or_else(|| ctx.error(ID, format!("no rate for {}", asset_ccy)))?;
            if asset_ccy != deficit_ccy {
                // One cent of headroom against conversion rounding
                need_native += 1;
            }

            let units = asset.units_to_cover(need_native);
            if units == 0 {
                continue;
            }
            let (rest, outcome) = asset.sell(units);
            let proceeds = rates
                .convert(outcome.net, &asset_ccy, deficit_ccy)
                .ok_or_else(|| ctx.error(ID, format!("no rate for {}", deficit_ccy)))?;

            let gain = outcome.realized_gain();
            let gain_reporting = rates
                .to_reporting(gain, &asset_ccy)
                .ok_or_else(|| ctx.error(ID, format!("no rate for {}", asset_ccy)))?;
            let gains = delta.gains.get_or_insert_with(Default::default);
            gains.realize(&asset_ccy, gain, gain_reporting);

            delta.post(deficit_ccy, proceeds, PostingReason::LiquidationProceeds);
            delta.events.push(Event::Liquidation {
                day,
                asset_id: id.clone(),
                units: outcome.units,
                gross: outcome.gross,
                penalty: outcome.penalty,
                proceeds,
                deficit_currency: deficit_ccy.to_string(),
            });
            warn!(
                day,
                asset = %id,
                units = outcome.units,
                proceeds,
                currency = deficit_ccy,
                "asset liquidated to cover deficit"
            );

            match rest {
                Some(rest) => {
                    book.insert(id.clone(), rest);
                }
                None => {
                    book.remove(&id);
                }
            }
            remaining -= proceeds;
            raised += proceeds;
        }

        Ok(Coverage {
            raised,
            shortfall: remaining.max(0),
        })
    }
}

impl Component for AssetPortfolio {
    fn id(&self) -> &str {
        ID
    }

    fn dependencies(&self) -> Vec<ComponentId> {
        vec![
            currency::ID.to_string(),
            cashflow::ID.to_string(),
            liabilities::ID.to_string(),
            taxation::ID.to_string(),
        ]
    }

    fn writes(&self) -> Vec<WriteScope> {
        vec![WriteScope::Assets, WriteScope::Gains]
    }

    fn transform(
        &self,
        ctx: &DayContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<StateDelta, ComponentError> {
        let day = ctx.day();
        let prior = ctx.prior();
        let rates = ctx.rates();
        let days_per_year = ctx.calendar().days_per_year;
        let mut delta = StateDelta::new();

        // Revaluation in id order
        let mut book: BTreeMap<AssetId, Asset> = prior
            .assets()
            .iter()
            .map(|(id, asset)| (id.clone(), self.revalue(asset, days_per_year, rng)))
            .collect();

        // Realizations accumulate on top of the prior ledger
        delta.gains = Some(prior.gains().clone());

        let mut balances: BTreeMap<CurrencyCode, Cents> = BTreeMap::new();
        for ccy in prior.cash().keys() {
            let projected = prior
                .balance(ccy)
                .checked_add(ctx.posted_today(ccy))
                .ok_or_else(|| ctx.error(ID, format!("{} cash overflows", ccy)))?;
            balances.insert(ccy.clone(), projected);
        }

        let currencies: Vec<CurrencyCode> = balances.keys().cloned().collect();
        for ccy in currencies {
            let projected = balances.get(&ccy).copied().unwrap_or(0);
            if projected >= 0 {
                continue;
            }
            let exchanged = self.exchange_surplus(ctx, rates, &ccy, -projected, &mut balances, &mut delta)?;
            let needed = -projected - exchanged;
            if needed <= 0 {
                balances.insert(ccy, projected + exchanged);
                continue;
            }

            let coverage = self.liquidate(ctx, rates, &ccy, needed, &mut book, &mut delta)?;
            balances.insert(ccy.clone(), projected + exchanged + coverage.raised);
            delta.signals.liquidated += rates.to_reporting(coverage.raised, &ccy).unwrap_or(0);

            if coverage.shortfall > 0 {
                warn!(day, currency = %ccy, shortfall = coverage.shortfall, "deficit left uncovered");
                delta.signals.uncovered_deficit +=
                    rates.to_reporting(coverage.shortfall, &ccy).unwrap_or(0);
                delta.events.push(Event::DeficitUncovered {
                    day,
                    currency: ccy.clone(),
                    shortfall: coverage.shortfall,
                });
            }
        }

        // Record writes for every holding that changed or disappeared
        for (id, original) in prior.assets() {
            match book.get(id) {
                Some(current) if current != original.as_ref() => {
                    delta.assets.insert(id.clone(), RecordWrite::Update(current.clone()));
                }
                Some(_) => {}
                None => {
                    delta.assets.insert(id.clone(), RecordWrite::Remove);
                }
            }
        }

        let mut unrealized: BTreeMap<CurrencyCode, Cents> = BTreeMap::new();
        for asset in book.values() {
            *unrealized.entry(asset.currency().to_string()).or_insert(0) += asset.unrealized_gain();
        }
        let mut gains = delta.gains.take().unwrap_or_default();
        gains.unrealized = unrealized;
        if gains != *prior.gains() {
            delta.gains = Some(gains);
        }

        Ok(delta)
    }
}
