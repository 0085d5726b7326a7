//! Composite cache key hashing.

use sha2::{Digest, Sha256};

/// Compute the cache key for a `(from, to, text)` triple.
///
/// The key is `SHA-256(from | to | text)` with a literal `|` separator
/// byte between the parts, rendered as 64 lowercase hex digits. It is the
/// primary lookup key in every backend; two live entries must never share
/// one.
pub fn cache_key(from_lang: &str, to_lang: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(from_lang.as_bytes());
    hasher.update(b"|");
    hasher.update(to_lang.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
