//! Random number generator abstraction for determinism.
//!
//! In production, this wraps a real RNG. In tests and replays,
//! a seeded or recorded implementation is injected.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Abstraction over random number generation.
pub trait DeterministicRng: Send + Sync {
    /// Generate a random `u32` in the range `[min, max]` inclusive.
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32;

    /// Roll a single die with `faces` sides, returning a value in
    /// `[1, faces]`.
    #[allow(clippy::cast_possible_truncation)]
    fn roll_die(&mut self, faces: u8) -> u8 {
        let faces = faces.max(1);
        self.next_u32_range(1, u32::from(faces)).min(u32::from(faces)) as u8
    }
}

/// Production RNG backed by `StdRng`.
#[derive(Debug)]
pub struct SeededRng(StdRng);

impl SeededRng {
    /// Create an RNG with a fixed seed (replays, reproducible sessions).
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Create an RNG seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl DeterministicRng for SeededRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.0.random_range(min..=max)
    }
}
