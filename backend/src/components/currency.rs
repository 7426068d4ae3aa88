//! Currency exchange
//!
//! Publishes the day's rate table. Each non-reporting currency follows a
//! multiplicative random walk against the reporting currency; the
//! reporting currency stays at par.

use crate::components::{Component, ComponentId, DayContext};
use crate::core::error::ComponentError;
use crate::models::delta::{StateDelta, WriteScope};
use crate::models::event::Event;
use crate::models::money::apply_ppm_change;
use crate::rng::RandomSource;

pub const ID: &str = "currency";

#[derive(Debug, Clone)]
pub struct CurrencyExchange {
    /// Daily rate volatility in parts per million
    volatility_ppm: i64,
}

impl CurrencyExchange {
    pub fn new(volatility_ppm: i64) -> Self {
        Self { volatility_ppm }
    }
}

impl Component for CurrencyExchange {
    fn id(&self) -> &str {
        ID
    }

    fn dependencies(&self) -> Vec<ComponentId> {
        Vec::new()
    }

    fn writes(&self) -> Vec<WriteScope> {
        vec![WriteScope::Rates]
    }

    fn transform(
        &self,
        ctx: &DayContext<'_>,
        rng: &mut RandomSource,
    ) -> Result<StateDelta, ComponentError> {
        let prior = ctx.prior().rates();
        let mut table = prior.clone();

        // BTreeMap order fixes the draw sequence
        let quoted: Vec<(String, i64)> = prior
            .currencies()
            .filter(|ccy| ccy.as_str() != prior.reporting())
            .filter_map(|ccy| prior.rate(ccy).map(|r| (ccy.clone(), r)))
            .collect();

        for (currency, rate) in quoted {
            let change = rng.gaussian_ppm(self.volatility_ppm);
            let next = apply_ppm_change(rate, change).max(1);
            table.set_rate(currency, next);
        }

        let mut delta = StateDelta::new();
        delta.rates = Some(table);
        delta.events.push(Event::RatesPublished { day: ctx.day() });
        Ok(delta)
    }
}
