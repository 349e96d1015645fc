#![forbid(unsafe_code)]

//! Processing configuration and algorithm suite policy.

use chrono::Duration;
use solna_core::{algorithm, Error, Result};

/// How structural profile violations are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enforcement {
    /// Violations abort processing.
    Strict,
    /// Violations are logged and processing continues.
    Lax,
}

impl Enforcement {
    /// Handle a profile violation according to the mode.
    pub fn handle(&self, rule: &str) -> Result<()> {
        match self {
            Enforcement::Strict => Err(Error::PolicyViolation(rule.to_owned())),
            Enforcement::Lax => {
                tracing::warn!(rule, "profile violation ignored (lax enforcement)");
                Ok(())
            }
        }
    }
}

/// Allowed algorithms and key-length bounds per operation.
///
/// Empty lists place no restriction beyond what the implementation
/// supports.
#[derive(Debug, Clone)]
pub struct AlgorithmSuite {
    pub signature_algorithms: Vec<String>,
    pub digest_algorithms: Vec<String>,
    pub key_wrap_algorithms: Vec<String>,
    pub encryption_algorithms: Vec<String>,
    pub min_asymmetric_key_bits: usize,
    pub max_asymmetric_key_bits: usize,
    pub min_symmetric_key_bits: usize,
}

impl Default for AlgorithmSuite {
    fn default() -> Self {
        Self {
            signature_algorithms: Vec::new(),
            digest_algorithms: Vec::new(),
            key_wrap_algorithms: Vec::new(),
            encryption_algorithms: Vec::new(),
            min_asymmetric_key_bits: 1024,
            max_asymmetric_key_bits: 4096,
            min_symmetric_key_bits: 128,
        }
    }
}

impl AlgorithmSuite {
    fn check_allowed(list: &[String], uri: &str, what: &str) -> Result<()> {
        if !list.is_empty() && !list.iter().any(|a| a == uri) {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{what} not permitted by algorithm suite: {uri}"
            )));
        }
        Ok(())
    }

    pub fn check_signature_algorithm(&self, uri: &str) -> Result<()> {
        Self::check_allowed(&self.signature_algorithms, uri, "signature algorithm")
    }

    pub fn check_digest_algorithm(&self, uri: &str) -> Result<()> {
        Self::check_allowed(&self.digest_algorithms, uri, "digest algorithm")
    }

    pub fn check_key_wrap_algorithm(&self, uri: &str) -> Result<()> {
        Self::check_allowed(&self.key_wrap_algorithms, uri, "key wrap algorithm")
    }

    pub fn check_encryption_algorithm(&self, uri: &str) -> Result<()> {
        Self::check_allowed(&self.encryption_algorithms, uri, "encryption algorithm")
    }

    pub fn check_asymmetric_key_length(&self, bits: usize) -> Result<()> {
        if bits < self.min_asymmetric_key_bits || bits > self.max_asymmetric_key_bits {
            return Err(Error::PolicyViolation(format!(
                "asymmetric key length {bits} outside [{}, {}]",
                self.min_asymmetric_key_bits, self.max_asymmetric_key_bits
            )));
        }
        Ok(())
    }

    pub fn check_symmetric_key_length(&self, bits: usize) -> Result<()> {
        if bits < self.min_symmetric_key_bits {
            return Err(Error::PolicyViolation(format!(
                "symmetric key length {bits} below minimum {}",
                self.min_symmetric_key_bits
            )));
        }
        Ok(())
    }
}

/// Whitelist of symmetric content-encryption algorithms accepted for
/// `EncryptedData`, independent of any configured suite.
pub fn is_permitted_data_encryption_algorithm(uri: &str) -> bool {
    matches!(
        uri,
        algorithm::TRIPLEDES_CBC
            | algorithm::AES128_CBC
            | algorithm::AES128_GCM
            | algorithm::AES256_CBC
            | algorithm::AES256_GCM
    )
}

/// Configuration for one processing chain.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Enforce timestamp temporal semantics (default on).
    pub strict_timestamps: bool,
    /// Upper bound on the Created→Expires lifetime a sender may assert.
    pub timestamp_ttl_cap: Option<Duration>,
    /// Implied lifetime when a Timestamp carries Created but no Expires.
    pub default_timestamp_ttl: Option<Duration>,
    /// Accept the RSA PKCS#1 v1.5 key transport algorithm.
    pub allow_rsa15: bool,
    /// Require every decrypted EncryptedData to be covered by a verified
    /// signature.
    pub require_signed_encrypted_parts: bool,
    /// Reject security-header children no handler understands.
    pub reject_unknown_header_children: bool,
    pub enforcement: Enforcement,
    pub algorithm_suite: AlgorithmSuite,
    /// Bound on the buffered event window for one header subtree.
    pub event_queue_capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            strict_timestamps: true,
            timestamp_ttl_cap: None,
            default_timestamp_ttl: None,
            allow_rsa15: false,
            require_signed_encrypted_parts: false,
            reject_unknown_header_children: false,
            enforcement: Enforcement::Lax,
            algorithm_suite: AlgorithmSuite::default(),
            event_queue_capacity: solna_events::queue::DEFAULT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_suite_allows_any_supported_algorithm() {
        let suite = AlgorithmSuite::default();
        suite.check_signature_algorithm(algorithm::RSA_SHA256).unwrap();
        suite.check_encryption_algorithm(algorithm::AES128_GCM).unwrap();
    }

    #[test]
    fn test_restricted_suite_rejects_other_algorithms() {
        let suite = AlgorithmSuite {
            signature_algorithms: vec![algorithm::RSA_SHA256.into()],
            ..AlgorithmSuite::default()
        };
        suite.check_signature_algorithm(algorithm::RSA_SHA256).unwrap();
        assert!(suite.check_signature_algorithm(algorithm::RSA_SHA1).is_err());
    }

    #[test]
    fn test_key_length_bounds() {
        let suite = AlgorithmSuite::default();
        suite.check_asymmetric_key_length(2048).unwrap();
        assert!(suite.check_asymmetric_key_length(512).is_err());
        suite.check_symmetric_key_length(128).unwrap();
        assert!(suite.check_symmetric_key_length(64).is_err());
    }

    #[test]
    fn test_enforcement_modes() {
        assert!(Enforcement::Strict.handle("disallowed attribute").is_err());
        assert!(Enforcement::Lax.handle("disallowed attribute").is_ok());
    }

    #[test]
    fn test_data_encryption_whitelist() {
        assert!(is_permitted_data_encryption_algorithm(algorithm::AES256_GCM));
        assert!(is_permitted_data_encryption_algorithm(algorithm::TRIPLEDES_CBC));
        // AES-192 is not in the permitted set
        assert!(!is_permitted_data_encryption_algorithm(algorithm::AES192_CBC));
    }
}
