//! Checkpoint - Serializable Snapshot Form
//!
//! The persistence boundary: snapshots are exported as
//! [`SnapshotRecord`] values for an external storage collaborator and
//! restored from them. The core never touches files or databases.
//!
//! # Critical Invariants
//!
//! - **Determinism**: restoring a record and stepping forward reproduces
//!   the original run bit-exactly (the substream cursor is part of the record)
//! - **Config Matching**: a record can only be restored with the
//!   configuration that produced it
//! - **Referential Integrity**: every currency held or owed is quoted and
//!   has a cash entry

use crate::core::error::SimulationError;
use crate::core::time::DayIndex;
use crate::models::state::SimulationState;
use crate::orchestrator::config::SimulationConfig;
use crate::rng::SubstreamCursor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Snapshot Record
// ============================================================================

/// Persistable form of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub day: DayIndex,

    /// Substream cursor at the snapshot day (CRITICAL for determinism)
    pub cursor: SubstreamCursor,

    pub state: SimulationState,

    /// SHA256 hash of the producing config (for validation)
    pub config_hash: String,
}

impl SnapshotRecord {
    pub fn to_json(&self) -> Result<String, SimulationError> {
        serde_json::to_string(self)
            .map_err(|e| SimulationError::Serialization(format!("Snapshot export failed: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        serde_json::from_str(json)
            .map_err(|e| SimulationError::Serialization(format!("Snapshot import failed: {}", e)))
    }

    /// Check the record against the configuration it is restored under
    pub fn validate(&self, config: &SimulationConfig) -> Result<(), SimulationError> {
        let expected = compute_config_hash(config)?;
        if self.config_hash != expected {
            return Err(SimulationError::StateValidation(format!(
                "Config hash mismatch: snapshot {} vs current {}",
                self.config_hash, expected
            )));
        }
        if self.cursor.seed != config.seed {
            return Err(SimulationError::StateValidation(format!(
                "Snapshot seed {} differs from configured seed {}",
                self.cursor.seed, config.seed
            )));
        }
        if self.day != self.state.day() || self.cursor != self.state.cursor() {
            return Err(SimulationError::StateValidation(format!(
                "Snapshot header day {} does not match state day {}",
                self.day,
                self.state.day()
            )));
        }
        validate_state(&self.state, config)
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of a serializable value
///
/// Uses canonical JSON serialization with sorted keys, so the hash does not
/// depend on map iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::Serialization(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of a full state, for bit-exact comparisons across runs
pub fn state_digest(state: &SimulationState) -> Result<String, SimulationError> {
    compute_config_hash(state)
}

// ============================================================================
// Validation
// ============================================================================

/// Validate state integrity
///
/// Checks:
/// - every cash currency is supported and quoted
/// - every asset and liability currency has a cash entry
/// - holdings are non-negative
/// - the credit score lies in the configured range
pub fn validate_state(state: &SimulationState, config: &SimulationConfig) -> Result<(), SimulationError> {
    if state.reporting_currency() != config.reporting_currency {
        return Err(SimulationError::StateValidation(format!(
            "Reporting currency {} differs from configured {}",
            state.reporting_currency(),
            config.reporting_currency
        )));
    }

    for currency in state.cash().keys() {
        if !config.currencies.contains(currency) {
            return Err(SimulationError::StateValidation(format!(
                "Unsupported currency in cash: {}",
                currency
            )));
        }
        if state.rates().rate(currency).is_none() {
            return Err(SimulationError::StateValidation(format!(
                "Currency {} has no exchange rate",
                currency
            )));
        }
    }

    for (id, asset) in state.assets() {
        if id != asset.id() {
            return Err(SimulationError::StateValidation(format!(
                "Asset keyed {} carries id {}",
                id,
                asset.id()
            )));
        }
        if !state.cash().contains_key(asset.currency()) {
            return Err(SimulationError::StateValidation(format!(
                "Asset {} held in unknown currency {}",
                id,
                asset.currency()
            )));
        }
        if asset.quantity() < 0 || asset.market_value() < 0 {
            return Err(SimulationError::StateValidation(format!(
                "Asset {} has negative holdings",
                id
            )));
        }
    }

    for (id, liability) in state.liabilities() {
        if id != liability.id() || !state.cash().contains_key(liability.currency()) {
            return Err(SimulationError::StateValidation(format!(
                "Liability {} is inconsistent with the cash book",
                id
            )));
        }
    }

    let score = state.credit_score();
    if !(config.credit.min_score..=config.credit.max_score).contains(&score) {
        return Err(SimulationError::StateValidation(format!(
            "Credit score {} outside [{}, {}]",
            score, config.credit.min_score, config.credit.max_score
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_config_hash_deterministic() {
        #[derive(Serialize)]
        struct TestConfig {
            value: i32,
            name: String,
        }

        let hash1 = compute_config_hash(&TestConfig {
            value: 42,
            name: "test".to_string(),
        })
        .unwrap();
        let hash2 = compute_config_hash(&TestConfig {
            value: 42,
            name: "test".to_string(),
        })
        .unwrap();

        assert_eq!(hash1, hash2, "Same config should produce same hash");
    }

    #[test]
    fn test_config_hash_tracks_changes() {
        let base = SimulationConfig::default();
        let mut changed = base.clone();
        changed.seed += 1;
        assert_ne!(
            compute_config_hash(&base).unwrap(),
            compute_config_hash(&changed).unwrap()
        );
    }
}
