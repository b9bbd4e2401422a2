//! Injectable randomness for exploration sampling

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform indices
pub trait RandomSource: Send {
    /// Uniform index in `0..len`; `len` is never zero
    fn next_index(&mut self, len: usize) -> usize;
}

/// `StdRng`-backed source
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Reproducible sequence for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded from the thread-local generator
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len.max(1))
    }
}
