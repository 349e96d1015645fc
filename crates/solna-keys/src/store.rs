#![forbid(unsafe_code)]

//! Certificate trust store.

use crate::x509::{self, CertValidationConfig};
use solna_core::Result;

/// Trust anchors and intermediates for certificate path validation.
pub struct TrustStore {
    /// Trusted CA certificates (DER-encoded).
    trusted_certs: Vec<Vec<u8>>,
    /// Untrusted intermediate certificates (DER-encoded).
    untrusted_certs: Vec<Vec<u8>>,
    /// Skip notBefore/notAfter checks (test fixtures with frozen clocks).
    skip_time_checks: bool,
}

impl TrustStore {
    pub fn new() -> Self {
        Self {
            trusted_certs: Vec::new(),
            untrusted_certs: Vec::new(),
            skip_time_checks: false,
        }
    }

    pub fn add_trusted_cert(&mut self, der: Vec<u8>) {
        self.trusted_certs.push(der);
    }

    pub fn add_untrusted_cert(&mut self, der: Vec<u8>) {
        self.untrusted_certs.push(der);
    }

    pub fn set_skip_time_checks(&mut self, skip: bool) {
        self.skip_time_checks = skip;
    }

    /// Validate a leaf certificate (plus extra chain certs from the
    /// message) up to one of the trust anchors.
    pub fn validate_chain(&self, leaf_der: &[u8], additional_certs: &[Vec<u8>]) -> Result<()> {
        x509::validate_cert_chain(
            leaf_der,
            additional_certs,
            &CertValidationConfig {
                trusted_certs: &self.trusted_certs,
                untrusted_certs: &self.untrusted_certs,
                skip_time_checks: self.skip_time_checks,
            },
        )
    }
}

impl Default for TrustStore {
    fn default() -> Self {
        Self::new()
    }
}
