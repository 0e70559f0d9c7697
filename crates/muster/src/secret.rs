//! Shared secret generation.
//!
//! Secrets travel inside shell command lines, environment files, and URLs, so
//! the encoding must never require quoting: random bytes are hashed, base64
//! encoded, and the `+`, `=`, `/` characters are stripped before truncation.

use base64::{Engine, engine::general_purpose::STANDARD};
use muster_common::MusterError;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Generate a random, shell- and URL-safe credential of at most `max_len`
/// characters.
///
/// An unreadable entropy source is fatal and never retried.
pub fn generate_secret(max_len: usize) -> Result<String, MusterError> {
    let mut seed = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|e| MusterError::EntropyUnavailable(e.to_string()))?;

    let digest = Sha256::digest(seed);
    let mut encoded = STANDARD.encode(digest);
    encoded.retain(|c| !matches!(c, '+' | '=' | '/'));
    encoded.truncate(max_len);

    Ok(encoded)
}
