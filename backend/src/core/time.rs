//! Simulation calendar
//!
//! The simulation advances in whole days. Day 0 is the initial state and
//! the first stepped day is 1. Recurring events (monthly payments, annual
//! tax assessments) fire on fixed day cadences so that the schedule is a
//! pure function of the day index.

use serde::{Deserialize, Serialize};

/// Index of a simulated day (0 = initial state)
pub type DayIndex = u32;

/// Fixed day cadences used by recurring financial events
///
/// # Example
/// ```
/// use future_wallet_core_rs::Calendar;
///
/// let calendar = Calendar::default();
/// assert!(calendar.is_month_end(30));
/// assert!(!calendar.is_month_end(0));
/// assert!(calendar.is_year_end(365));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Days in one billing month
    pub days_per_month: u32,

    /// Days in one tax year
    pub days_per_year: u32,

    /// Days in one week
    pub days_per_week: u32,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            days_per_month: 30,
            days_per_year: 365,
            days_per_week: 7,
        }
    }
}

impl Calendar {
    /// True on days that close a billing month (day 0 never does)
    pub fn is_month_end(&self, day: DayIndex) -> bool {
        day > 0 && day % self.days_per_month == 0
    }

    /// True on days that close a tax year (day 0 never does)
    pub fn is_year_end(&self, day: DayIndex) -> bool {
        day > 0 && day % self.days_per_year == 0
    }

    /// True on days that close a week (day 0 never does)
    pub fn is_week_end(&self, day: DayIndex) -> bool {
        day > 0 && day % self.days_per_week == 0
    }

    /// Number of billing months per tax year, rounded down
    pub fn months_per_year(&self) -> u32 {
        self.days_per_year / self.days_per_month
    }

    /// Check that every cadence is non-zero
    pub fn is_valid(&self) -> bool {
        self.days_per_month > 0 && self.days_per_year > 0 && self.days_per_week > 0
    }
}
