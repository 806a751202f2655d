//! SHA-256 hashing for structural identity.

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 hash of in-memory data as lowercase hex.
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
