#![forbid(unsafe_code)]

//! Caller-supplied key material.

/// Callback interface through which the application supplies private
/// keys, pre-shared secrets and out-of-band certificates.
///
/// No timeouts are enforced on these calls; a provider that blocks is the
/// caller's responsibility.
pub trait KeyProvider {
    /// Private key matching the given DER certificate, for asymmetric
    /// key transport decryption.
    fn private_key_for(&self, _cert_der: &[u8]) -> Option<rsa::RsaPrivateKey> {
        None
    }

    /// Pre-shared secret by name or identifier hint.
    fn secret_key(&self, _hint: &str) -> Option<Vec<u8>> {
        None
    }

    /// Certificate lookup by issuer distinguished name and serial number
    /// (decimal string), as referenced by `X509IssuerSerial`.
    fn certificate_for_issuer_serial(&self, _issuer: &str, _serial: &str) -> Option<Vec<u8>> {
        None
    }

    /// Certificate lookup by subject key identifier bytes, as referenced
    /// by `wsse:KeyIdentifier`.
    fn certificate_for_key_identifier(&self, _ski: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

/// A provider with no key material; every lookup misses.
pub struct NullKeyProvider;

impl KeyProvider for NullKeyProvider {}
