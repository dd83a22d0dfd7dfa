//! Layer and container identifier generation.
//!
//! Identifiers are content addresses: the hex encoding of the first 8 bytes
//! of a SHA-256 digest. Fresh identifiers hash UUID-v4 entropy, so
//! uniqueness holds for the process lifetime without any counter state.

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in an identifier (16 hex characters).
const ID_BYTES: usize = 8;

/// Compute the identifier for a piece of content.
#[must_use]
pub fn content_id(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(&digest[..ID_BYTES])
}

/// Generate a fresh, collision-resistant identifier.
///
/// Hashing fresh entropy rather than incrementing a counter means collisions
/// are a theoretical zero-probability event, not a case to handle.
#[must_use]
pub fn fresh_id() -> String {
    content_id(uuid::Uuid::new_v4().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_is_deterministic() {
        assert_eq!(content_id(b"layer"), content_id(b"layer"));
        assert_ne!(content_id(b"layer"), content_id(b"other"));
    }

    #[test]
    fn id_shape() {
        let id = fresh_id();
        assert_eq!(id.len(), ID_BYTES * 2);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fresh_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(fresh_id()));
        }
    }
}
