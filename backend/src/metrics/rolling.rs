//! Rolling windowed signals over a single trajectory

use crate::models::money::Cents;

/// A single-day balance drop beyond the shock threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shock {
    /// Index into the series
    pub index: usize,
    /// Fractional drop (0.08 = 8%)
    pub magnitude: f64,
}

/// Days whose balance fell by more than `drop_bps` from a positive predecessor
pub fn detect_shocks(balances: &[Cents], drop_bps: i64) -> Vec<Shock> {
    let threshold = drop_bps as f64 / 10_000.0;
    balances
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let (prev, curr) = (pair[0], pair[1]);
            if prev <= 0 {
                return None;
            }
            let change = (curr - prev) as f64 / prev as f64;
            (change < -threshold).then_some(Shock {
                index: i + 1,
                magnitude: -change,
            })
        })
        .collect()
}

/// Frequency times mean magnitude of shocks in the window ending at the last shock
pub fn shock_clustering(shocks: &[Shock], window: usize) -> f64 {
    let Some(last) = shocks.last() else {
        return 0.0;
    };
    if window == 0 {
        return 0.0;
    }
    let recent: Vec<&Shock> = shocks
        .iter()
        .filter(|s| s.index + window > last.index)
        .collect();
    let mean = recent.iter().map(|s| s.magnitude).sum::<f64>() / recent.len() as f64;
    recent.len() as f64 / window as f64 * mean
}

/// Fraction of deficit days in the trailing window ending at each day
pub fn deficit_density(deficits: &[bool], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(deficits.len());
    let mut count = 0usize;
    for (i, &deficit) in deficits.iter().enumerate() {
        if deficit {
            count += 1;
        }
        if i >= window && deficits[i - window] {
            count -= 1;
        }
        let span = (i + 1).min(window);
        out.push(count as f64 / span as f64);
    }
    out
}

/// Mean deficit amount over the trailing window ending at each day
pub fn deficit_intensity(deficit_amounts: &[Cents], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(deficit_amounts.len());
    let mut sum: i128 = 0;
    for (i, &amount) in deficit_amounts.iter().enumerate() {
        sum += amount as i128;
        if i >= window {
            sum -= deficit_amounts[i - window] as i128;
        }
        let span = (i + 1).min(window);
        out.push(sum as f64 / span as f64);
    }
    out
}

/// Least-squares slope of `ys` against their index
pub fn ols_slope(ys: &[f64]) -> Option<f64> {
    if ys.len() < 2 {
        return None;
    }
    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    Some(num / den)
}

/// Balance slope (cents per day) over the window following the last deficit
///
/// Without any deficit, the segment after the trough of the trailing window
/// is used instead. `None` when fewer than two points follow.
pub fn recovery_slope(balances: &[Cents], window: usize) -> Option<f64> {
    let window = window.max(2);
    let start = match balances.iter().rposition(|b| *b < 0) {
        Some(last_deficit) => last_deficit,
        None => {
            let from = balances.len().saturating_sub(window);
            let tail = &balances[from..];
            let trough = tail
                .iter()
                .enumerate()
                .min_by_key(|(_, b)| **b)
                .map(|(i, _)| i)?;
            from + trough
        }
    };
    let end = (start + window).min(balances.len());
    let segment: Vec<f64> = balances[start..end].iter().map(|b| *b as f64).collect();
    ols_slope(&segment)
}

/// Population standard deviation of daily changes over the trailing window
pub fn rolling_volatility(balances: &[Cents], window: usize) -> f64 {
    let from = balances.len().saturating_sub(window.max(2));
    let tail = &balances[from..];
    if tail.len() < 2 {
        return 0.0;
    }
    let changes: Vec<f64> = tail.windows(2).map(|p| (p[1] - p[0]) as f64).collect();
    let mean = changes.iter().sum::<f64>() / changes.len() as f64;
    let variance = changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / changes.len() as f64;
    variance.sqrt()
}

/// Largest fractional fall from a running positive peak, capped at 1
pub fn worst_drawdown(values: &[Cents]) -> f64 {
    let mut peak: Cents = 0;
    let mut worst: f64 = 0.0;
    for &v in values {
        peak = peak.max(v);
        if peak > 0 {
            worst = worst.max((peak - v) as f64 / peak as f64);
        }
    }
    worst.min(1.0)
}

/// How far the final balance climbed back from the trough towards the peak
pub fn recovery_ratio(balances: &[Cents]) -> f64 {
    if balances.len() < 2 {
        return 1.0;
    }
    let peak = balances.iter().copied().max().unwrap_or(0);
    let trough = balances.iter().copied().min().unwrap_or(0);
    let last = balances[balances.len() - 1];
    if peak > 0 && trough < peak {
        ((last - trough) as f64 / (peak - trough) as f64).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_shocks_threshold() {
        let shocks = detect_shocks(&[1_000, 960, 900, 900], 500);
        // 4% drop is below threshold; 6.25% is not
        assert_eq!(shocks.len(), 1);
        assert_eq!(shocks[0].index, 2);
    }

    #[test]
    fn test_deficit_density_window() {
        let density = deficit_density(&[false, true, true, false], 2);
        assert_eq!(density, vec![0.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_ols_slope_on_line() {
        let slope = ols_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_recovery_slope_after_deficit() {
        let slope = recovery_slope(&[100, -50, 0, 50, 100], 30).unwrap();
        assert!((slope - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_worst_drawdown() {
        assert!((worst_drawdown(&[100, 50, 200, 150]) - 0.5).abs() < 1e-12);
        assert_eq!(worst_drawdown(&[-5, -10]), 0.0);
    }
}
