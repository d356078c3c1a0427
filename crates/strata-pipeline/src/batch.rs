//! Per-run seeds for batch generation.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Distinct run seeds drawn from a base seed, cached so that repeating a
/// batch reproduces the same runs.
#[derive(Debug, Clone)]
pub struct SeedCache {
    base_seed: u64,
    rng: ChaCha8Rng,
    seeds: Vec<u64>,
}

impl SeedCache {
    pub fn new(base_seed: u64) -> Self {
        Self {
            base_seed,
            rng: ChaCha8Rng::seed_from_u64(base_seed),
            seeds: Vec::new(),
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// The first `runs` cached seeds, drawing and appending fresh ones when
    /// fewer are cached.
    pub fn seeds_for_batch(&mut self, runs: usize) -> Vec<u64> {
        while self.seeds.len() < runs {
            let candidate: u64 = self.rng.random();
            if !self.seeds.contains(&candidate) {
                self.seeds.push(candidate);
            }
        }
        self.seeds[..runs].to_vec()
    }
}
