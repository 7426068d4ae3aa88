//! Core primitives: calendar and error taxonomy

pub mod error;
pub mod time;

pub use error::SimulationError;
pub use time::{Calendar, DayIndex};
