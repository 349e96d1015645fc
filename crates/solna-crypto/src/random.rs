#![forbid(unsafe_code)]

//! Random session-key generation.
//!
//! Used by the encrypted-key processor when an asymmetric unwrap fails:
//! instead of surfacing the failure, a random key of the size the
//! referenced `EncryptedData` algorithm expects is substituted so that the
//! failure only becomes visible at the downstream integrity check. See the
//! processor for why this must never be turned into an error path.

use rand::RngCore;
use solna_core::algorithm;

/// Generate a random key of the length implied by the given symmetric
/// algorithm URI, falling back to an AES-128 key when the URI does not
/// determine a length.
pub fn random_key_for_algorithm(uri: &str) -> Vec<u8> {
    let len = match algorithm::symmetric_key_length(uri) {
        0 => 16,
        n => n,
    };
    let mut key = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_length_follows_algorithm() {
        assert_eq!(random_key_for_algorithm(algorithm::AES128_CBC).len(), 16);
        assert_eq!(random_key_for_algorithm(algorithm::AES256_GCM).len(), 32);
        assert_eq!(random_key_for_algorithm(algorithm::TRIPLEDES_CBC).len(), 24);
    }

    #[test]
    fn test_unknown_algorithm_falls_back_to_aes128() {
        assert_eq!(random_key_for_algorithm("urn:not-a-cipher").len(), 16);
    }
}
