//! Deterministic hash-seeded pseudo-embeddings for offline and test use.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default vector width when no provider dictates one.
pub const FALLBACK_DIMENSION: usize = 128;

/// Generate a reproducible pseudo-embedding for `text`.
///
/// The blake3 digest of the text seeds the generator, so the same text
/// always yields the identical vector and different texts yield effectively
/// uncorrelated vectors, good enough for cosine comparison when no real
/// provider is reachable.
#[must_use]
pub fn fallback_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let digest = blake3::hash(text.as_bytes());
    let mut rng = StdRng::from_seed(*digest.as_bytes());
    (0..dimension).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}
