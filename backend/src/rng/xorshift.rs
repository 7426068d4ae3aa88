//! xorshift64* random source
//!
//! Fast 64-bit generator (passes BigCrush) used for every random draw on
//! the simulation path.
//!
//! # Determinism
//!
//! Same seed → same sequence. Only integer arithmetic is used, including
//! for the Gaussian approximation, so sequences are bit-exact on every
//! platform.

use crate::models::money::{div_round, PPM_SCALE};
use serde::{Deserialize, Serialize};

/// Draws one substream may make before it reports exhaustion
pub const MAX_DRAWS_PER_SUBSTREAM: u64 = 1 << 40;

/// Deterministic random source using xorshift64*
///
/// # Example
/// ```
/// use future_wallet_core_rs::RandomSource;
///
/// let mut rng = RandomSource::new(12345);
/// let value = rng.next_u64();
/// let bounded = rng.range(0, 100); // [0, 100)
/// assert!((0..100).contains(&bounded));
/// # let _ = value;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomSource {
    state: u64,
    draws: u64,
}

impl RandomSource {
    /// Create a source from a seed (zero is remapped, xorshift requires a nonzero state)
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state, draws: 0 }
    }

    /// Next raw 64-bit value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        self.draws = self.draws.saturating_add(1);
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform value in `[min, max)`
    ///
    /// # Panics
    /// Panics if `min >= max`
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");
        let span = (max as i128 - min as i128) as u128;
        let value = self.next_u64() as u128 % span;
        (min as i128 + value as i128) as i64
    }

    /// Approximately normal draw with standard deviation `sigma_ppm`, in ppm
    ///
    /// Irwin–Hall sum of twelve uniforms: the sum of 12 U(0,1) has mean 6 and
    /// variance 1. Computed entirely in integers.
    pub fn gaussian_ppm(&mut self, sigma_ppm: i64) -> i64 {
        if sigma_ppm == 0 {
            return 0;
        }
        let mut sum: i64 = 0;
        for _ in 0..12 {
            sum += self.range(0, PPM_SCALE);
        }
        let z_ppm = sum - 6 * PPM_SCALE;
        div_round(z_ppm as i128 * sigma_ppm as i128, PPM_SCALE as i128) as i64
    }

    /// Draws made so far
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// True once the per-substream draw budget has been exceeded
    pub fn is_exhausted(&self) -> bool {
        self.draws > MAX_DRAWS_PER_SUBSTREAM
    }

    /// Current internal state (for checkpointing/replay)
    pub fn get_state(&self) -> u64 {
        self.state
    }
}
