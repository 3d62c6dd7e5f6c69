//! Token digest utilities for service authentication.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares a presented token against a stored digest without branching
/// on the first mismatching byte.
///
/// Both sides are hashed first, so the comparison always runs over two
/// equal-length hex strings.
pub fn token_matches(presented: &str, expected_digest: &str) -> bool {
    let presented_digest = sha256_hex(presented);
    if presented_digest.len() != expected_digest.len() {
        return false;
    }
    presented_digest
        .bytes()
        .zip(expected_digest.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        let hash = sha256_hex("");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_deterministic() {
        assert_eq!(sha256_hex("same_input"), sha256_hex("same_input"));
    }

    #[test]
    fn test_token_matches() {
        let digest = sha256_hex("gate-secret");
        assert!(token_matches("gate-secret", &digest));
        assert!(!token_matches("wrong-secret", &digest));
    }

    #[test]
    fn test_token_matches_rejects_garbage_digest() {
        assert!(!token_matches("anything", "not-a-digest"));
        assert!(!token_matches("anything", ""));
    }
}
