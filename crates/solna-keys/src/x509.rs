#![forbid(unsafe_code)]

//! X.509 certificate chain validation.
//!
//! Validates leaf certificates against trusted roots with optional
//! intermediate certificates: time validity, issuer chain building and
//! signature verification along the chain.

use der::{Decode, Encode};
use solna_core::{Error, Result};
use x509_cert::Certificate;

/// Configuration for X.509 certificate chain validation.
pub struct CertValidationConfig<'a> {
    /// Trusted CA certificates (DER-encoded).
    pub trusted_certs: &'a [Vec<u8>],
    /// Untrusted intermediate certificates (DER-encoded).
    pub untrusted_certs: &'a [Vec<u8>],
    /// Skip time validity checks.
    pub skip_time_checks: bool,
}

/// Validate a certificate chain from a leaf cert to a trusted root.
///
/// `leaf_der` is the DER-encoded leaf certificate.
/// `additional_certs` are extra certs carried in the message.
pub fn validate_cert_chain(
    leaf_der: &[u8],
    additional_certs: &[Vec<u8>],
    config: &CertValidationConfig<'_>,
) -> Result<()> {
    let leaf = Certificate::from_der(leaf_der)
        .map_err(|e| Error::Certificate(format!("failed to parse leaf certificate: {e}")))?;

    // Certs available for chain building but not trusted: extras from the
    // message plus configured intermediates.
    let mut available: Vec<(Certificate, Vec<u8>)> = Vec::new();
    for der in additional_certs {
        if der == leaf_der {
            continue;
        }
        if let Ok(c) = Certificate::from_der(der) {
            available.push((c, der.clone()));
        }
    }
    for der in config.untrusted_certs {
        if let Ok(c) = Certificate::from_der(der) {
            available.push((c, der.clone()));
        }
    }

    let mut trusted: Vec<(Certificate, Vec<u8>)> = Vec::new();
    for der in config.trusted_certs {
        if let Ok(c) = Certificate::from_der(der) {
            trusted.push((c, der.clone()));
        }
    }

    if trusted.is_empty() {
        return Err(Error::Certificate(
            "no trusted certificates available".into(),
        ));
    }

    if !config.skip_time_checks {
        let now = current_time()?;
        check_cert_time_validity(&leaf, &now)?;
    }

    build_and_verify_chain(&leaf, leaf_der, &available, &trusted, config)
}

/// Current system time as a `der::DateTime`.
fn current_time() -> Result<der::DateTime> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| Error::Certificate(format!("system time error: {e}")))?;
    der::DateTime::from_unix_duration(now)
        .map_err(|e| Error::Certificate(format!("time conversion error: {e}")))
}

/// Check if a certificate is valid at the given time.
fn check_cert_time_validity(cert: &Certificate, at: &der::DateTime) -> Result<()> {
    let not_before = cert.tbs_certificate.validity.not_before.to_date_time();
    let not_after = cert.tbs_certificate.validity.not_after.to_date_time();

    if *at < not_before {
        return Err(Error::Certificate(format!(
            "certificate is not yet valid (notBefore: {not_before:?})"
        )));
    }
    if *at > not_after {
        return Err(Error::Certificate(format!(
            "certificate has expired (notAfter: {not_after:?})"
        )));
    }
    Ok(())
}

/// Build a chain from the leaf to a trusted root, verifying signatures
/// along the way.
fn build_and_verify_chain(
    leaf: &Certificate,
    leaf_der: &[u8],
    available: &[(Certificate, Vec<u8>)],
    trusted: &[(Certificate, Vec<u8>)],
    config: &CertValidationConfig<'_>,
) -> Result<()> {
    // Leaf is itself a trust anchor: verify the self-signature.
    for (tc, tc_der) in trusted {
        if tc_der == leaf_der {
            return verify_cert_signature(leaf, &tc.tbs_certificate.subject_public_key_info);
        }
    }

    let leaf_issuer_der = leaf.tbs_certificate.issuer.to_der().unwrap_or_default();
    let leaf_subject_der = leaf.tbs_certificate.subject.to_der().unwrap_or_default();

    // Self-signed but not directly trusted: accept only when a trust
    // anchor carries the same subject and its key verifies the signature.
    if leaf_issuer_der == leaf_subject_der {
        for (tc, _) in trusted {
            let tc_subject_der = tc.tbs_certificate.subject.to_der().unwrap_or_default();
            if tc_subject_der == leaf_issuer_der
                && verify_cert_signature(leaf, &tc.tbs_certificate.subject_public_key_info)
                    .is_ok()
            {
                return Ok(());
            }
        }
        return Err(Error::Certificate(
            "self-signed certificate not in trusted store".into(),
        ));
    }

    // Walk the chain: find issuer, verify, repeat until a trusted root.
    let mut current = leaf.clone();
    let mut visited: Vec<Vec<u8>> = vec![leaf_der.to_vec()];
    let max_depth = 10;

    for _ in 0..max_depth {
        let issuer_der = current.tbs_certificate.issuer.to_der().unwrap_or_default();

        for (tc, _tc_der) in trusted {
            let tc_subject_der = tc.tbs_certificate.subject.to_der().unwrap_or_default();
            if tc_subject_der == issuer_der
                && verify_cert_signature(&current, &tc.tbs_certificate.subject_public_key_info)
                    .is_ok()
            {
                if !config.skip_time_checks {
                    check_cert_time_validity(tc, &current_time()?)?;
                }
                return Ok(());
            }
        }

        let mut found_intermediate = false;
        for (ic, ic_der) in available {
            if visited.contains(ic_der) {
                continue; // avoid cycles
            }
            let ic_subject_der = ic.tbs_certificate.subject.to_der().unwrap_or_default();
            if ic_subject_der == issuer_der
                && verify_cert_signature(&current, &ic.tbs_certificate.subject_public_key_info)
                    .is_ok()
            {
                if !config.skip_time_checks {
                    check_cert_time_validity(ic, &current_time()?)?;
                }
                visited.push(ic_der.clone());
                current = ic.clone();
                found_intermediate = true;
                break;
            }
        }

        if !found_intermediate {
            return Err(Error::Certificate(
                "cannot find issuer certificate (incomplete chain)".into(),
            ));
        }
    }

    Err(Error::Certificate("certificate chain too long".into()))
}

/// Verify a certificate's signature using the issuer's SPKI.
fn verify_cert_signature(
    cert: &Certificate,
    issuer_spki: &spki::SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let tbs_der = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode TBS: {e}")))?;

    let sig_bytes = cert
        .signature
        .as_bytes()
        .ok_or_else(|| Error::Certificate("no signature bytes".into()))?;

    let spki_der = issuer_spki
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode issuer SPKI: {e}")))?;

    // sha1WithRSAEncryption: 1.2.840.113549.1.1.5
    // sha256WithRSAEncryption: 1.2.840.113549.1.1.11
    // sha384WithRSAEncryption: 1.2.840.113549.1.1.12
    // sha512WithRSAEncryption: 1.2.840.113549.1.1.13
    const SHA1_RSA: &str = "1.2.840.113549.1.1.5";
    const SHA256_RSA: &str = "1.2.840.113549.1.1.11";
    const SHA384_RSA: &str = "1.2.840.113549.1.1.12";
    const SHA512_RSA: &str = "1.2.840.113549.1.1.13";

    // ecdsaWithSHA256: 1.2.840.10045.4.3.2
    // ecdsaWithSHA384: 1.2.840.10045.4.3.3
    const ECDSA_SHA256: &str = "1.2.840.10045.4.3.2";
    const ECDSA_SHA384: &str = "1.2.840.10045.4.3.3";

    let oid_str = cert.signature_algorithm.oid.to_string();

    match oid_str.as_str() {
        SHA1_RSA => verify_rsa_signature::<sha1::Sha1>(&spki_der, &tbs_der, sig_bytes),
        SHA256_RSA => verify_rsa_signature::<sha2::Sha256>(&spki_der, &tbs_der, sig_bytes),
        SHA384_RSA => verify_rsa_signature::<sha2::Sha384>(&spki_der, &tbs_der, sig_bytes),
        SHA512_RSA => verify_rsa_signature::<sha2::Sha512>(&spki_der, &tbs_der, sig_bytes),
        ECDSA_SHA256 | ECDSA_SHA384 => {
            verify_ecdsa_signature_auto_curve(&spki_der, &tbs_der, sig_bytes, issuer_spki)
        }
        _ => Err(Error::Certificate(format!(
            "unsupported signature algorithm: {oid_str}"
        ))),
    }
}

/// Verify an RSA PKCS#1 v1.5 signature.
fn verify_rsa_signature<D>(issuer_spki_der: &[u8], tbs_der: &[u8], signature: &[u8]) -> Result<()>
where
    D: digest::Digest + digest::const_oid::AssociatedOid,
    rsa::pkcs1v15::VerifyingKey<D>: signature::Verifier<rsa::pkcs1v15::Signature>,
{
    use spki::DecodePublicKey;

    let public_key = rsa::RsaPublicKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("invalid RSA public key: {e}")))?;
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(public_key);
    let sig = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| Error::Certificate(format!("invalid RSA signature: {e}")))?;

    use signature::Verifier;
    verifying_key
        .verify(tbs_der, &sig)
        .map_err(|e| Error::Certificate(format!("certificate signature verification failed: {e}")))
}

/// Auto-detect EC curve from SPKI and verify an ECDSA signature.
fn verify_ecdsa_signature_auto_curve(
    issuer_spki_der: &[u8],
    tbs_der: &[u8],
    signature: &[u8],
    issuer_spki: &spki::SubjectPublicKeyInfoOwned,
) -> Result<()> {
    // EC SPKI: algorithm = id-ecPublicKey, parameters = curve OID
    let curve_oid = issuer_spki
        .algorithm
        .parameters
        .as_ref()
        .and_then(|p| der::asn1::ObjectIdentifier::from_der(p.value()).ok())
        .map(|oid| oid.to_string())
        .unwrap_or_default();

    // P-256: 1.2.840.10045.3.1.7, P-384: 1.3.132.0.34
    match curve_oid.as_str() {
        "1.2.840.10045.3.1.7" => verify_ecdsa_p256_signature(issuer_spki_der, tbs_der, signature),
        "1.3.132.0.34" => verify_ecdsa_p384_signature(issuer_spki_der, tbs_der, signature),
        _ => verify_ecdsa_p256_signature(issuer_spki_der, tbs_der, signature)
            .or_else(|_| verify_ecdsa_p384_signature(issuer_spki_der, tbs_der, signature)),
    }
}

/// Verify an ECDSA P-256 signature (DER-encoded).
fn verify_ecdsa_p256_signature(
    issuer_spki_der: &[u8],
    tbs_der: &[u8],
    signature: &[u8],
) -> Result<()> {
    use spki::DecodePublicKey;

    let vk = p256::ecdsa::VerifyingKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("invalid EC P-256 key: {e}")))?;
    let sig = p256::ecdsa::DerSignature::from_bytes(signature)
        .map_err(|e| Error::Certificate(format!("invalid ECDSA signature: {e}")))?;

    use signature::Verifier;
    vk.verify(tbs_der, &sig)
        .map_err(|e| Error::Certificate(format!("certificate signature verification failed: {e}")))
}

/// Verify an ECDSA P-384 signature (DER-encoded).
fn verify_ecdsa_p384_signature(
    issuer_spki_der: &[u8],
    tbs_der: &[u8],
    signature: &[u8],
) -> Result<()> {
    use spki::DecodePublicKey;

    let vk = p384::ecdsa::VerifyingKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("invalid EC P-384 key: {e}")))?;
    let sig = p384::ecdsa::DerSignature::from_bytes(signature)
        .map_err(|e| Error::Certificate(format!("invalid ECDSA signature: {e}")))?;

    use signature::Verifier;
    vk.verify(tbs_der, &sig)
        .map_err(|e| Error::Certificate(format!("certificate signature verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed() -> Vec<u8> {
        rcgen::generate_simple_self_signed(vec!["chain.test".into()])
            .expect("cert")
            .cert
            .der()
            .to_vec()
    }

    #[test]
    fn test_empty_trust_store_fails() {
        let leaf = self_signed();
        let config = CertValidationConfig {
            trusted_certs: &[],
            untrusted_certs: &[],
            skip_time_checks: true,
        };
        assert!(validate_cert_chain(&leaf, &[], &config).is_err());
    }

    #[test]
    fn test_directly_trusted_self_signed_passes() {
        let leaf = self_signed();
        let trusted = vec![leaf.clone()];
        let config = CertValidationConfig {
            trusted_certs: &trusted,
            untrusted_certs: &[],
            skip_time_checks: false,
        };
        validate_cert_chain(&leaf, &[], &config).unwrap();
    }

    #[test]
    fn test_untrusted_self_signed_fails() {
        let leaf = self_signed();
        let other = self_signed();
        let trusted = vec![other];
        let config = CertValidationConfig {
            trusted_certs: &trusted,
            untrusted_certs: &[],
            skip_time_checks: true,
        };
        assert!(validate_cert_chain(&leaf, &[], &config).is_err());
    }

    #[test]
    fn test_garbage_leaf_fails_to_parse() {
        let trusted = vec![self_signed()];
        let config = CertValidationConfig {
            trusted_certs: &trusted,
            untrusted_certs: &[],
            skip_time_checks: true,
        };
        assert!(validate_cert_chain(&[0xde, 0xad], &[], &config).is_err());
    }
}
