//! Deterministic seed derivation.
//!
//! Every random stream used by a run is derived from the run's base seed so a
//! run can be replayed exactly from its seed alone. Streams are separated with
//! ChaCha's stream counter rather than by hashing, so the derivation is fixed
//! by `rand_chacha` and does not change between toolchains.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// ChaCha stream used to place erosion droplets.
pub const EROSION_STREAM: u64 = 1;

/// A ChaCha8 generator for one named stream of a run.
pub fn stream_rng(base_seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    rng.set_stream(stream);
    rng
}

/// RNG used to place erosion droplets.
pub fn erosion_rng(base_seed: u64) -> ChaCha8Rng {
    stream_rng(base_seed, EROSION_STREAM)
}

/// Permutation-table seed for the noise function.
pub fn noise_seed(base_seed: u64) -> u32 {
    base_seed as u32
}

/// Coordinate offset added to every noise lookup so that different seeds
/// sample different regions of the noise plane.
pub fn noise_offset(base_seed: u64) -> f64 {
    (base_seed % 1024) as f64 * 0.731
}
