//! Derivation of independent random streams from the run seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

pub(crate) const RNG_STREAM_SPAWNING: &str = "spawning";
pub(crate) const RNG_STREAM_PATHFINDING: &str = "pathfinding";

/// Seeds a generator from the run seed and a purpose label.
pub(crate) fn stream(seed: u64, label: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_labeled_seed(seed, label))
}

fn derive_labeled_seed(seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
