use sha2::{Digest, Sha256};

/// Unsalted SHA-256 hex digest of the password.
///
/// Login matches on this value directly, so it has to stay deterministic.
/// It is not a password KDF: no salt, no work factor.
pub fn hash_password(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    hex::encode(hasher.finalize())
}
