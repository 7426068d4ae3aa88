//! Liabilities
//!
//! Interest accrues daily on the outstanding balance. On each billing
//! month end the scheduled payment (plus arrears) is drawn from cash in the
//! liability's currency before any discretionary spending: the prior
//! balance plus today's income must cover it, otherwise the payment is
//! missed and arrears grow. Repeated misses trigger a restructuring.

use crate::components::{cashflow, currency, Component, ComponentId, DayContext};
use crate::core::error::ComponentError;
use crate::models::delta::{PostingReason, RecordWrite, StateDelta, WriteScope};
use crate::models::event::Event;
use crate::models::money::{Cents, CurrencyCode};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const ID: &str = "liabilities";

/// When and how a liability in arrears is restructured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestructurePolicy {
    pub enabled: bool,

    /// Consecutive misses that trigger a restructuring
    pub after_missed: u32,

    /// Reduction of the scheduled payment, basis points
    pub relief_bps: i64,

    /// Annual rate after restructuring, basis points; `None` keeps the rate
    #[serde(default)]
    pub new_rate_bps: Option<i64>,
}

impl Default for RestructurePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            after_missed: 3,
            relief_bps: 2_500,
            new_rate_bps: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Liabilities {
    policy: RestructurePolicy,
}

impl Liabilities {
    pub fn new(policy: RestructurePolicy) -> Self {
        Self { policy }
    }
}

impl Component for Liabilities {
    fn id(&self) -> &str {
        ID
    }

    fn dependencies(&self) -> Vec<ComponentId> {
        vec![currency::ID.to_string(), cashflow::ID.to_string()]
    }

    fn writes(&self) -> Vec<WriteScope> {
        vec![WriteScope::Liabilities]
    }

    fn transform(
        &self,
        ctx: &DayContext<'_>,
        _rng: &mut RandomSource,
    ) -> Result<StateDelta, ComponentError> {
        let day = ctx.day();
        let calendar = ctx.calendar();
        let prior = ctx.prior();
        let payment_day = calendar.is_month_end(day);
        let mut delta = StateDelta::new();

        // Cash already committed to earlier liabilities today, per currency
        let mut committed: BTreeMap<CurrencyCode, Cents> = BTreeMap::new();

        for (id, liability) in prior.liabilities() {
            if liability.is_paid_off() {
                continue;
            }
            let mut next = liability.accrue_interest(calendar.days_per_year);

            if payment_day {
                let due = next.amount_due();
                if due > 0 {
                    let ccy = next.currency().to_string();
                    let spent = committed.entry(ccy.clone()).or_insert(0);
                    let available = prior
                        .balance(&ccy)
                        .checked_add(ctx.income_today(&ccy))
                        .and_then(|cash| cash.checked_sub(*spent))
                        .ok_or_else(|| ctx.error(ID, format!("{} cash overflows", ccy)))?;

                    if available >= due {
                        next = next.pay(due);
                        *spent = spent
                            .checked_add(due)
                            .ok_or_else(|| ctx.error(ID, format!("{} payments overflow", ccy)))?;
                        delta.post(ccy, -due, PostingReason::LiabilityPayment);
                        delta.signals.payments_on_time += 1;
                        delta.events.push(Event::PaymentMade {
                            day,
                            liability_id: id.clone(),
                            amount: due,
                        });
                    } else {
                        next = next.miss_payment();
                        delta.signals.payments_missed += 1;
                        warn!(
                            day,
                            liability = %id,
                            due,
                            available,
                            arrears = next.arrears_count(),
                            "scheduled payment missed"
                        );
                        delta.events.push(Event::PaymentMissed {
                            day,
                            liability_id: id.clone(),
                            due,
                            arrears_count: next.arrears_count(),
                        });

                        if self.policy.enabled && next.arrears_count() >= self.policy.after_missed {
                            next = next.restructure(self.policy.relief_bps, self.policy.new_rate_bps);
                            delta.signals.restructurings += 1;
                            warn!(
                                day,
                                liability = %id,
                                new_payment = next.monthly_payment(),
                                rate_bps = next.annual_rate_bps(),
                                "liability restructured"
                            );
                            delta.events.push(Event::Restructured {
                                day,
                                liability_id: id.clone(),
                                new_payment: next.monthly_payment(),
                            });
                        }
                    }
                }
            }

            if next != **liability {
                delta.liabilities.insert(id.clone(), RecordWrite::Update(next));
            }
        }

        Ok(delta)
    }
}
