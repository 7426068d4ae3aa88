//! Error taxonomy for the simulation core
//!
//! Graph and configuration faults surface before any day is stepped.
//! Per-day faults abort only the owning run; sibling runs, branches and
//! every previously recorded snapshot stay valid.

use crate::core::time::DayIndex;
use thiserror::Error;

/// Errors raised while building or querying the dependency graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Component already registered: {0}")]
    DuplicateComponent(String),

    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    #[error("Edge {from} -> {to} would close a cycle")]
    Cycle { from: String, to: String },

    #[error("Dependency graph contains a cycle through: {}", .remaining.join(", "))]
    CyclicGraph { remaining: Vec<String> },
}

/// Referential integrity violations detected while applying a delta
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("Posting references unknown currency {0}")]
    UnknownCurrency(String),

    #[error("Delta updates unknown asset {0}")]
    UnknownAsset(String),

    #[error("Delta updates unknown liability {0}")]
    UnknownLiability(String),

    #[error("Delta declares asset {0} as new but it already exists")]
    AssetExists(String),

    #[error("Delta declares liability {0} as new but it already exists")]
    LiabilityExists(String),

    #[error("Cash balance overflow in {0}")]
    Overflow(String),
}

/// A component transform failed to produce a valid delta
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Component {component} failed on day {day}: {reason}")]
pub struct ComponentError {
    pub component: String,
    pub day: DayIndex,
    pub reason: String,
}

/// Top-level simulation error
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error("Unresolved write conflict on {field}: {first} and {second} share no dependency path")]
    UnresolvedConflict {
        field: String,
        first: String,
        second: String,
    },

    #[error("Invalid delta on day {day}: {source}")]
    InvalidDelta {
        day: DayIndex,
        #[source]
        source: DeltaError,
    },

    #[error("Random substream capacity exceeded: {0}")]
    SeedExhaustion(String),

    #[error("Day {requested} is outside the recorded range 0..={latest}")]
    DayOutOfRange { requested: DayIndex, latest: DayIndex },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("State validation failed: {0}")]
    StateValidation(String),
}

impl SimulationError {
    /// True for the cycle family of graph errors
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            SimulationError::Graph(GraphError::Cycle { .. })
                | SimulationError::Graph(GraphError::CyclicGraph { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_error_names_component_and_day() {
        let err = ComponentError {
            component: "taxation".to_string(),
            day: 365,
            reason: "no brackets".to_string(),
        };
        let msg = SimulationError::from(err).to_string();
        assert!(msg.contains("taxation"));
        assert!(msg.contains("365"));
    }

    #[test]
    fn test_is_cycle() {
        let err = SimulationError::from(GraphError::Cycle {
            from: "a".to_string(),
            to: "b".to_string(),
        });
        assert!(err.is_cycle());
        assert!(!SimulationError::Configuration("x".to_string()).is_cycle());
    }
}
