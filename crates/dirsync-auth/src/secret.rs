//! Random credential generation.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

/// Generate an alphanumeric secret of `len` characters.
///
/// SECURITY: Uses `OsRng` (CSPRNG) for cryptographic randomness.
#[must_use]
pub fn generate_random_secret(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
