//! Deterministic random number generation
//!
//! CRITICAL: All randomness in the simulation MUST go through this module.
//! Components receive a [`RandomSource`] derived by the
//! [`RandomSubstreamManager`] and never construct their own.

mod substream;
mod xorshift;

pub use substream::{RandomSubstreamManager, SubstreamCursor, MAX_SUBSTREAMS_PER_RUN};
pub use xorshift::{RandomSource, MAX_DRAWS_PER_SUBSTREAM};
