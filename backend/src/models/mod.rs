//! Domain models for the financial simulation

pub mod asset;
pub mod delta;
pub mod event;
pub mod inputs;
pub mod ledger;
pub mod liability;
pub mod money;
pub mod state;

// Re-exports
pub use asset::{Asset, AssetClass, AssetId, SaleOutcome};
pub use delta::{DaySignals, FieldKey, Posting, PostingReason, RecordWrite, StateDelta, WriteScope};
pub use event::Event;
pub use inputs::InitialState;
pub use ledger::{GainsLedger, TaxLedger};
pub use liability::{Liability, LiabilityId};
pub use money::{Cents, CurrencyCode, RateTable};
pub use state::{Accumulators, SimulationState};
