//! Deterministic stream-keyed PRNG.
//!
//! Every draw mixes an FNV-1a hash of a named stream into the shared state,
//! takes one xorshift32 step, and writes the result back. Draws on different
//! streams therefore still advance one global sequence, so prior player
//! actions (which also draw) influence later outcomes, yet the same seed and
//! the same call sequence always reproduce bit-identical values.
//!
//! No platform RNG is ever consulted by the simulation.

use serde::{Deserialize, Serialize};

/// Fallback state used whenever the mix would hit xorshift32's absorbing zero.
pub const ZERO_GUARD: u32 = 0xA5A5_A5A5;

/// Seed assigned to saves that reach their first tick without one.
pub const FALLBACK_SEED: u32 = 0x9E37_79B9;

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;
const STREAM_SEPARATOR: u8 = b':';

/// FNV-1a over the stream parts joined by `:`, without allocating.
pub fn stream_hash(parts: &[&str]) -> u32 {
    let mut h = FNV_OFFSET;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            h ^= STREAM_SEPARATOR as u32;
            h = h.wrapping_mul(FNV_PRIME);
        }
        for byte in part.bytes() {
            h ^= byte as u32;
            h = h.wrapping_mul(FNV_PRIME);
        }
    }
    h
}

/// One xorshift32 step (13, 17, 5).
pub fn xorshift32(mut x: u32) -> u32 {
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

/// The evolving PRNG state carried inside the simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prng(u32);

impl Prng {
    pub fn from_seed(seed: u32) -> Self {
        Self(if seed == 0 { ZERO_GUARD } else { seed })
    }

    pub fn state(self) -> u32 {
        self.0
    }

    /// Raw 32-bit draw from the named stream.
    pub fn next_u32(&mut self, stream: &[&str]) -> u32 {
        let mut x = self.0 ^ stream_hash(stream);
        if x == 0 {
            x = ZERO_GUARD;
        }
        let out = xorshift32(x);
        self.0 = out;
        out
    }

    /// Uniform float in `[0, 1)`.
    pub fn uniform01(&mut self, stream: &[&str]) -> f64 {
        self.next_u32(stream) as f64 / 4_294_967_296.0
    }

    /// Sum of six uniforms, recentred and scaled into `[-1, 1]`.
    ///
    /// A cheap central-limit approximation: bell-shaped with standard
    /// deviation ~0.236, bounded, and NOT a true Gaussian. Price tunables are
    /// calibrated against this exact shape.
    pub fn normalish(&mut self, stream: &[&str]) -> f64 {
        let mut sum = 0.0;
        for _ in 0..6 {
            sum += self.uniform01(stream);
        }
        (sum - 3.0) / 3.0
    }

    /// Uniform float in `[min, max)`; degenerate ranges return `min`.
    pub fn range(&mut self, stream: &[&str], min: f64, max: f64) -> f64 {
        let roll = self.uniform01(stream);
        if max > min { min + roll * (max - min) } else { min }
    }

    /// Uniform index in `[0, n)`; returns 0 for an empty range without drawing.
    pub fn index(&mut self, stream: &[&str], n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let roll = self.uniform01(stream);
        ((roll * n as f64) as usize).min(n - 1)
    }

    /// Bernoulli trial. Always draws, so the sequence does not depend on `p`.
    pub fn chance(&mut self, stream: &[&str], p: f64) -> bool {
        self.uniform01(stream) < p
    }
}

impl Default for Prng {
    fn default() -> Self {
        Self::from_seed(FALLBACK_SEED)
    }
}
