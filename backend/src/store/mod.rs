//! Versioned State Store
//!
//! Builds day 0 from initial inputs and every later day from its
//! predecessor plus a merged delta.
//!
//! # Critical Invariants
//!
//! 1. **Copy-on-write**: `advance` clones only the sub-trees the delta
//!    touches. Untouched maps, records and ledgers are the predecessor's
//!    `Arc`s.
//! 2. **Referential Integrity**: a delta may only post to a currency,
//!    update an asset or update a liability that exists in the prior
//!    state, unless it declares the record as new. Violations raise
//!    `InvalidDelta` and produce no state.
//! 3. **Snapshots are References**: a snapshot pins a recorded state and
//!    its lineage; creating one never copies a state.

pub mod checkpoint;
pub mod trajectory;

pub use checkpoint::{compute_config_hash, state_digest, validate_state, SnapshotRecord};
pub use trajectory::{Lineage, Trajectory};

use crate::core::error::{DeltaError, SimulationError};
use crate::core::time::DayIndex;
use crate::models::asset::Asset;
use crate::models::delta::{RecordWrite, StateDelta};
use crate::models::inputs::InitialState;
use crate::models::liability::Liability;
use crate::models::money::{Cents, CurrencyCode, RateTable, BPS_SCALE};
use crate::models::state::{Accumulators, SimulationState};
use crate::orchestrator::config::SimulationConfig;
use crate::rng::SubstreamCursor;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable reference to a recorded day
///
/// Holds the state, the substream cursor at that day, the lineage of all
/// earlier days and the configuration the run was using. Cloning a snapshot
/// clones references only.
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: Uuid,
    state: Arc<SimulationState>,
    lineage: Lineage,
    config: Arc<SimulationConfig>,
}

impl Snapshot {
    pub(crate) fn new(lineage: Lineage, config: Arc<SimulationConfig>) -> Option<Self> {
        let state = lineage.get(lineage.day())?;
        Some(Self {
            id: Uuid::new_v4(),
            state,
            lineage,
            config,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn day(&self) -> DayIndex {
        self.state.day()
    }

    pub fn cursor(&self) -> SubstreamCursor {
        self.state.cursor()
    }

    pub fn state(&self) -> &Arc<SimulationState> {
        &self.state
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    pub fn config(&self) -> &Arc<SimulationConfig> {
        &self.config
    }

    /// Export for an external storage collaborator
    pub fn to_record(&self) -> Result<SnapshotRecord, SimulationError> {
        Ok(SnapshotRecord {
            day: self.day(),
            cursor: self.cursor(),
            state: self.state.as_ref().clone(),
            config_hash: compute_config_hash(self.config.as_ref())?,
        })
    }

    /// Rebuild a snapshot from a persisted record
    ///
    /// The restored snapshot has no history before its own day.
    pub fn from_record(record: SnapshotRecord, config: SimulationConfig) -> Result<Self, SimulationError> {
        record.validate(&config)?;
        let state = Arc::new(record.state);
        Ok(Self {
            id: Uuid::new_v4(),
            lineage: Lineage::detached(Arc::clone(&state)),
            state,
            config: Arc::new(config),
        })
    }
}

// ============================================================================
// State Store
// ============================================================================

/// Constructs and advances simulation states
#[derive(Debug, Clone)]
pub struct StateStore {
    currencies: BTreeSet<CurrencyCode>,
    initial_rates: RateTable,
    initial_credit: f64,
}

impl StateStore {
    pub fn new(config: &SimulationConfig) -> Self {
        let mut initial_rates = RateTable::new(config.reporting_currency.clone());
        for (currency, rate) in &config.initial_rates {
            initial_rates.set_rate(currency.clone(), *rate);
        }
        Self {
            currencies: config.currencies.clone(),
            initial_rates,
            initial_credit: config.credit.initial_score,
        }
    }

    /// Build the day-0 state
    ///
    /// Every supported currency receives a cash entry (zero when the inputs
    /// name none).
    pub fn initialize(&self, inputs: &InitialState, seed: u64) -> Result<Arc<SimulationState>, SimulationError> {
        let mut cash: BTreeMap<CurrencyCode, Cents> =
            self.currencies.iter().map(|c| (c.clone(), 0)).collect();
        for (currency, amount) in &inputs.cash {
            if !self.currencies.contains(currency) {
                return Err(SimulationError::Configuration(format!(
                    "Initial cash in unsupported currency {}",
                    currency
                )));
            }
            cash.insert(currency.clone(), *amount);
        }

        let mut assets = BTreeMap::new();
        for asset in &inputs.assets {
            self.check_currency("Asset", asset.id(), asset.currency())?;
            if assets
                .insert(asset.id().to_string(), Arc::new(asset.clone()))
                .is_some()
            {
                return Err(SimulationError::Configuration(format!(
                    "Duplicate asset id {}",
                    asset.id()
                )));
            }
        }

        let mut liabilities = BTreeMap::new();
        for liability in &inputs.liabilities {
            self.check_currency("Liability", liability.id(), liability.currency())?;
            if liabilities
                .insert(liability.id().to_string(), Arc::new(liability.clone()))
                .is_some()
            {
                return Err(SimulationError::Configuration(format!(
                    "Duplicate liability id {}",
                    liability.id()
                )));
            }
        }

        let mut state = SimulationState {
            day: 0,
            cash: Arc::new(cash),
            rates: Arc::new(self.initial_rates.clone()),
            assets: Arc::new(assets),
            liabilities: Arc::new(liabilities),
            credit_score: inputs.credit_score.unwrap_or(self.initial_credit),
            gains: Arc::default(),
            tax: Arc::default(),
            accumulators: Accumulators::default(),
            cursor: SubstreamCursor { seed, day: 0 },
            events: Arc::default(),
        };
        state.accumulators = accumulate(&Accumulators::default(), &state, true);
        Ok(Arc::new(state))
    }

    fn check_currency(&self, kind: &str, id: &str, currency: &str) -> Result<(), SimulationError> {
        if self.currencies.contains(currency) {
            Ok(())
        } else {
            Err(SimulationError::Configuration(format!(
                "{} {} uses unsupported currency {}",
                kind, id, currency
            )))
        }
    }

    /// Build day N+1 from day N and the day's merged delta
    pub fn advance(&self, prior: &SimulationState, delta: &StateDelta) -> Result<SimulationState, SimulationError> {
        let day = prior.day + 1;
        let mut next = apply(prior, delta).map_err(|source| SimulationError::InvalidDelta { day, source })?;
        next.day = day;
        next.cursor = prior.cursor.next_day();
        next.accumulators = accumulate(&prior.accumulators, &next, false);
        Ok(next)
    }

    /// Apply a delta without advancing the day (branch overrides)
    ///
    /// The result replaces the predecessor of the next stepped day; it is
    /// never recorded as a day of its own. Deficit counters are recounted
    /// for the overridden state, continuing from `predecessor` (the state of
    /// the day before) when it is still available.
    pub fn rebase(
        &self,
        prior: &SimulationState,
        predecessor: Option<&SimulationState>,
        delta: &StateDelta,
    ) -> Result<SimulationState, SimulationError> {
        let mut next = apply(prior, delta).map_err(|source| SimulationError::InvalidDelta {
            day: prior.day,
            source,
        })?;
        let carried = match predecessor {
            Some(before) => before.accumulators,
            None => withdraw(&prior.accumulators, prior),
        };
        let mut acc = accumulate(&carried, &next, false);
        // Sales of the fork day happened before the override
        acc.liquidation_count = prior.accumulators.liquidation_count;
        next.accumulators = acc;
        Ok(next)
    }
}

// ============================================================================
// Delta Application
// ============================================================================

fn apply(prior: &SimulationState, delta: &StateDelta) -> Result<SimulationState, DeltaError> {
    let mut next = prior.clone();
    next.events = Arc::new(delta.events.clone());

    if !delta.postings.is_empty() || !delta.new_currencies.is_empty() {
        let mut cash = prior.cash.as_ref().clone();
        for currency in &delta.new_currencies {
            cash.entry(currency.clone()).or_insert(0);
        }
        for posting in &delta.postings {
            let balance = cash
                .get_mut(&posting.currency)
                .ok_or_else(|| DeltaError::UnknownCurrency(posting.currency.clone()))?;
            *balance = balance
                .checked_add(posting.amount)
                .ok_or_else(|| DeltaError::Overflow(posting.currency.clone()))?;
        }
        next.cash = Arc::new(cash);
    }

    if let Some(rates) = &delta.rates {
        next.rates = Arc::new(rates.clone());
    }
    if delta.rates.is_some() || !delta.new_currencies.is_empty() {
        if let Some(unquoted) = next.cash.keys().find(|c| next.rates.rate(c).is_none()) {
            return Err(DeltaError::UnknownCurrency(unquoted.clone()));
        }
    }

    if !delta.assets.is_empty() {
        let mut assets = prior.assets.as_ref().clone();
        for (id, write) in &delta.assets {
            apply_write(&mut assets, id, write, &next.cash, |a: &Asset| a.currency().to_string(), Record::Asset)?;
        }
        next.assets = Arc::new(assets);
    }

    if !delta.liabilities.is_empty() {
        let mut liabilities = prior.liabilities.as_ref().clone();
        for (id, write) in &delta.liabilities {
            apply_write(
                &mut liabilities,
                id,
                write,
                &next.cash,
                |l: &Liability| l.currency().to_string(),
                Record::Liability,
            )?;
        }
        next.liabilities = Arc::new(liabilities);
    }

    if let Some(score) = delta.credit_score {
        next.credit_score = score;
    }
    if let Some(gains) = &delta.gains {
        next.gains = Arc::new(gains.clone());
    }
    if let Some(tax) = &delta.tax {
        next.tax = Arc::new(tax.clone());
    }
    Ok(next)
}

#[derive(Clone, Copy)]
enum Record {
    Asset,
    Liability,
}

impl Record {
    fn unknown(self, id: &str) -> DeltaError {
        match self {
            Record::Asset => DeltaError::UnknownAsset(id.to_string()),
            Record::Liability => DeltaError::UnknownLiability(id.to_string()),
        }
    }

    fn exists(self, id: &str) -> DeltaError {
        match self {
            Record::Asset => DeltaError::AssetExists(id.to_string()),
            Record::Liability => DeltaError::LiabilityExists(id.to_string()),
        }
    }
}

fn apply_write<T: Clone>(
    map: &mut BTreeMap<String, Arc<T>>,
    id: &str,
    write: &RecordWrite<T>,
    cash: &BTreeMap<CurrencyCode, Cents>,
    currency_of: impl Fn(&T) -> String,
    kind: Record,
) -> Result<(), DeltaError> {
    match write {
        RecordWrite::Insert(record) => {
            if map.contains_key(id) {
                return Err(kind.exists(id));
            }
            let currency = currency_of(record);
            if !cash.contains_key(&currency) {
                return Err(DeltaError::UnknownCurrency(currency));
            }
            map.insert(id.to_string(), Arc::new(record.clone()));
        }
        RecordWrite::Update(record) => {
            if !map.contains_key(id) {
                return Err(kind.unknown(id));
            }
            let currency = currency_of(record);
            if !cash.contains_key(&currency) {
                return Err(DeltaError::UnknownCurrency(currency));
            }
            map.insert(id.to_string(), Arc::new(record.clone()));
        }
        RecordWrite::Remove => {
            if map.remove(id).is_none() {
                return Err(kind.unknown(id));
            }
        }
    }
    Ok(())
}

/// Roll the accumulators forward to `state`
fn accumulate(prior: &Accumulators, state: &SimulationState, initial: bool) -> Accumulators {
    let mut acc = *prior;
    if state.is_deficit() {
        acc.deficit_streak += 1;
        acc.total_deficit_days += 1;
        if acc.deficit_streak == 1 {
            acc.streak_start = Some(state.day);
        }
    } else {
        acc.deficit_streak = 0;
        acc.streak_start = None;
    }
    acc.liquidation_count += state.events.iter().filter(|e| e.is_liquidation()).count() as u32;

    let worth = state.net_worth();
    if initial || worth > acc.peak_net_worth {
        acc.peak_net_worth = worth;
    }
    if acc.peak_net_worth > 0 && worth < acc.peak_net_worth {
        let drop = (acc.peak_net_worth - worth) as i128 * BPS_SCALE as i128 / acc.peak_net_worth as i128;
        acc.max_drawdown_bps = acc.max_drawdown_bps.max(drop as i64);
    }
    acc
}

/// Remove a day's own deficit contribution from its accumulators
fn withdraw(acc: &Accumulators, state: &SimulationState) -> Accumulators {
    let mut acc = *acc;
    if state.is_deficit() {
        acc.deficit_streak = acc.deficit_streak.saturating_sub(1);
        acc.total_deficit_days = acc.total_deficit_days.saturating_sub(1);
        if acc.deficit_streak == 0 {
            acc.streak_start = None;
        }
    }
    acc
}
