//! Deterministic randomness for reproducible splits and forests
//!
//! Every random draw in the pipeline comes from a ChaCha stream seeded from
//! the user seed, so identical inputs and seeds produce identical models on
//! every platform.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seeded generator used for all sampling
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Derive an independent sub-seed for a named stream (e.g. one per tree)
///
/// Keyed on the base seed, a stream label, and an index so that adding
/// trees never perturbs the draws of earlier ones.
pub fn derive_seed(base: u64, stream: &str, index: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&base.to_le_bytes());
    hasher.update(stream.as_bytes());
    hasher.update(&index.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
