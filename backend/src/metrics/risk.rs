//! Bankruptcy and resilience statistics
//!
//! A run is bankrupt once it stays in deficit (some cash balance negative)
//! for at least `sustain_days` consecutive days. The bankruptcy day is the
//! first day of that streak.

use crate::core::time::DayIndex;
use serde::{Deserialize, Serialize};

/// First day of the first deficit streak lasting `sustain_days` or more
///
/// `deficits[i]` is the deficit flag of day `first_day + i`.
pub fn bankruptcy_day(deficits: &[bool], first_day: DayIndex, sustain_days: u32) -> Option<DayIndex> {
    let sustain = sustain_days.max(1) as usize;
    let mut streak = 0usize;
    for (i, &deficit) in deficits.iter().enumerate() {
        if deficit {
            streak += 1;
            if streak >= sustain {
                return Some(first_day + (i + 1 - streak) as DayIndex);
            }
        } else {
            streak = 0;
        }
    }
    None
}

/// Ensemble-level bankruptcy statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankruptcyStats {
    /// Fraction of runs that went bankrupt
    pub probability: f64,

    /// Bankruptcy day of each bankrupt run, ascending
    pub days: Vec<DayIndex>,

    pub mean_day: Option<f64>,

    /// Fraction of runs collapsing within each equal slice of the horizon
    pub timing_density: Vec<f64>,
}

impl BankruptcyStats {
    pub fn from_runs(bankruptcies: &[Option<DayIndex>], horizon: DayIndex, bins: usize) -> Self {
        let runs = bankruptcies.len();
        let mut days: Vec<DayIndex> = bankruptcies.iter().flatten().copied().collect();
        days.sort_unstable();

        let probability = if runs == 0 {
            0.0
        } else {
            days.len() as f64 / runs as f64
        };
        let mean_day = if days.is_empty() {
            None
        } else {
            Some(days.iter().map(|d| *d as f64).sum::<f64>() / days.len() as f64)
        };

        let bins = bins.max(1);
        let mut timing_density = vec![0.0; bins];
        if runs > 0 {
            let span = horizon.max(1) as f64 / bins as f64;
            for day in &days {
                let bin = ((*day as f64 / span) as usize).min(bins - 1);
                timing_density[bin] += 1.0 / runs as f64;
            }
        }

        Self {
            probability,
            days,
            mean_day,
            timing_density,
        }
    }
}

/// Fraction of deficit days in each of `bins` equal periods of one or more runs
///
/// Every run contributes its own period slices, so the density is averaged
/// across the ensemble.
pub fn collapse_density(runs: &[Vec<bool>], bins: usize) -> Vec<f64> {
    let bins = bins.max(1);
    let mut totals = vec![0usize; bins];
    let mut counts = vec![0usize; bins];
    for deficits in runs {
        if deficits.is_empty() {
            continue;
        }
        let chunk = (deficits.len() / bins).max(1);
        for (i, &deficit) in deficits.iter().enumerate() {
            let bin = (i / chunk).min(bins - 1);
            counts[bin] += 1;
            if deficit {
                totals[bin] += 1;
            }
        }
    }
    totals
        .iter()
        .zip(counts.iter())
        .map(|(t, c)| if *c == 0 { 0.0 } else { *t as f64 / *c as f64 })
        .collect()
}

/// Resilience score index in `[0, 100]`
///
/// `0.4 * (1 - bankruptcy) + 0.3 * (1 - drawdown) + 0.3 * recovery`
pub fn resilience_score(bankruptcy_probability: f64, worst_drawdown: f64, recovery_ratio: f64) -> f64 {
    let bp = bankruptcy_probability.clamp(0.0, 1.0);
    let dd = worst_drawdown.clamp(0.0, 1.0);
    let rec = recovery_ratio.clamp(0.0, 1.0);
    ((0.40 * (1.0 - bp) + 0.30 * (1.0 - dd) + 0.30 * rec) * 100.0).clamp(0.0, 100.0)
}
