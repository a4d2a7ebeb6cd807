use sha2::{Digest, Sha256};

/// Number of hex characters of the content hash that go into archive names.
pub const SHORT_HASH_LEN: usize = 8;

/// Hex-encoded SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Leading slice of a content hash used in archive keys.
pub fn short_hash(hash: &str) -> &str {
    let end = hash
        .char_indices()
        .nth(SHORT_HASH_LEN)
        .map(|(idx, _)| idx)
        .unwrap_or(hash.len());
    &hash[..end]
}
