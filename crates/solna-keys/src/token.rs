#![forbid(unsafe_code)]

//! Security token types.

use crate::store::TrustStore;
use der::Decode;
use solna_core::{Error, Result};
use solna_crypto::sign::VerifyKey;
use spki::DecodePublicKey;
use x509_cert::Certificate;

/// How a token was located in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    /// wsse:Reference URI pointing at a token in the same document.
    DirectReference,
    /// wsse:KeyIdentifier (e.g. subject key identifier).
    KeyIdentifier,
    /// ds:X509IssuerSerial lookup against the key provider.
    IssuerSerial,
    /// Certificate embedded directly under KeyInfo.
    Embedded,
    /// ds:KeyName lookup of a pre-shared secret.
    KeyName,
}

/// Public key material parsed from a certificate.
#[derive(Debug)]
pub enum PublicKeyData {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

/// The capability a token carries.
#[derive(Debug)]
pub enum TokenData {
    /// Certificate chain (DER, leaf first) and the leaf's public key.
    Asymmetric {
        cert_chain: Vec<Vec<u8>>,
        public_key: PublicKeyData,
    },
    /// A raw pre-shared secret.
    Symmetric { secret: Vec<u8> },
}

/// A resolved security token.
///
/// Lifecycle: created when KeyInfo is resolved, `verify()` must succeed
/// before any key material is handed out, dropped at end of message
/// processing.
#[derive(Debug)]
pub struct SecurityToken {
    pub id: String,
    pub reference: ReferenceType,
    data: TokenData,
    verified: bool,
}

impl SecurityToken {
    /// Build an asymmetric token from a DER certificate chain (leaf first).
    pub fn from_cert_chain(
        id: impl Into<String>,
        reference: ReferenceType,
        cert_chain: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let leaf = cert_chain
            .first()
            .ok_or_else(|| Error::Certificate("empty certificate chain".into()))?;
        let public_key = parse_public_key(leaf)?;
        Ok(Self {
            id: id.into(),
            reference,
            data: TokenData::Asymmetric {
                cert_chain,
                public_key,
            },
            verified: false,
        })
    }

    /// Build a symmetric token from a pre-shared secret.
    pub fn from_secret(
        id: impl Into<String>,
        reference: ReferenceType,
        secret: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            reference,
            data: TokenData::Symmetric { secret },
            verified: false,
        }
    }

    pub fn is_asymmetric(&self) -> bool {
        matches!(self.data, TokenData::Asymmetric { .. })
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// The DER-encoded leaf certificate, for asymmetric tokens.
    pub fn leaf_certificate(&self) -> Option<&[u8]> {
        match &self.data {
            TokenData::Asymmetric { cert_chain, .. } => {
                cert_chain.first().map(|c| c.as_slice())
            }
            TokenData::Symmetric { .. } => None,
        }
    }

    /// Verify trust in the token: certificate path validation for
    /// asymmetric tokens, a no-op bind for pre-shared secrets (the
    /// provider vouches for them).
    pub fn verify(&mut self, store: &TrustStore) -> Result<()> {
        match &self.data {
            TokenData::Asymmetric { cert_chain, .. } => {
                let leaf = &cert_chain[0];
                store
                    .validate_chain(leaf, &cert_chain[1..])
                    .map_err(|e| Error::TrustFailure(e.to_string()))?;
            }
            TokenData::Symmetric { .. } => {}
        }
        self.verified = true;
        tracing::debug!(id = %self.id, "security token verified");
        Ok(())
    }

    /// Key material for signature verification with the given algorithm.
    /// The token must have been verified first.
    pub fn verify_key(&self) -> Result<VerifyKey> {
        self.require_verified()?;
        match &self.data {
            TokenData::Asymmetric { public_key, .. } => Ok(match public_key {
                PublicKeyData::Rsa(pk) => VerifyKey::RsaPublic(pk.clone()),
                PublicKeyData::EcP256(vk) => VerifyKey::EcP256Public(*vk),
                PublicKeyData::EcP384(vk) => VerifyKey::EcP384Public(*vk),
            }),
            TokenData::Symmetric { secret } => Ok(VerifyKey::Hmac(secret.clone())),
        }
    }

    /// The raw secret of a symmetric token.
    pub fn secret_key(&self) -> Result<&[u8]> {
        self.require_verified()?;
        match &self.data {
            TokenData::Symmetric { secret } => Ok(secret),
            TokenData::Asymmetric { .. } => {
                Err(Error::Key("token carries no symmetric key".into()))
            }
        }
    }

    /// Modulus/field size of the asymmetric public key in bits, for
    /// algorithm-suite key length checks.
    pub fn public_key_bits(&self) -> Result<usize> {
        match &self.data {
            TokenData::Asymmetric { public_key, .. } => Ok(match public_key {
                PublicKeyData::Rsa(pk) => {
                    use rsa::traits::PublicKeyParts;
                    pk.size() * 8
                }
                PublicKeyData::EcP256(_) => 256,
                PublicKeyData::EcP384(_) => 384,
            }),
            TokenData::Symmetric { secret } => Ok(secret.len() * 8),
        }
    }

    fn require_verified(&self) -> Result<()> {
        if !self.verified {
            return Err(Error::TrustFailure(format!(
                "token {} used before verification",
                self.id
            )));
        }
        Ok(())
    }
}

/// Parse the subject public key out of a DER certificate.
fn parse_public_key(cert_der: &[u8]) -> Result<PublicKeyData> {
    use der::Encode;

    let cert = Certificate::from_der(cert_der)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;

    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(&spki_der) {
        return Ok(PublicKeyData::Rsa(pk));
    }
    if let Ok(vk) = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
        return Ok(PublicKeyData::EcP256(vk));
    }
    if let Ok(vk) = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der) {
        return Ok(PublicKeyData::EcP384(vk));
    }
    Err(Error::Certificate(
        "unsupported subject public key type".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed_cert() -> Vec<u8> {
        let cert_key = rcgen::generate_simple_self_signed(vec!["test.example".into()])
            .expect("self-signed cert");
        cert_key.cert.der().to_vec()
    }

    #[test]
    fn test_unverified_token_refuses_key_material() {
        let token = SecurityToken::from_secret("t-1", ReferenceType::KeyName, vec![1, 2, 3]);
        assert!(matches!(token.secret_key(), Err(Error::TrustFailure(_))));
    }

    #[test]
    fn test_symmetric_token_verify_and_use() {
        let mut token =
            SecurityToken::from_secret("t-1", ReferenceType::KeyName, vec![0x42; 32]);
        token.verify(&TrustStore::new()).unwrap();
        assert_eq!(token.secret_key().unwrap(), &[0x42; 32]);
        assert!(matches!(token.verify_key(), Ok(VerifyKey::Hmac(_))));
    }

    #[test]
    fn test_asymmetric_token_requires_trust_anchor() {
        let der = self_signed_cert();
        let mut token =
            SecurityToken::from_cert_chain("t-2", ReferenceType::Embedded, vec![der])
                .unwrap();
        // Empty trust store: chain validation must fail.
        let err = token.verify(&TrustStore::new()).unwrap_err();
        assert!(matches!(err, Error::Certificate(_) | Error::TrustFailure(_)));
        assert!(!token.is_verified());
    }

    #[test]
    fn test_asymmetric_token_trusted_self_signed() {
        let der = self_signed_cert();
        let mut store = TrustStore::new();
        store.add_trusted_cert(der.clone());
        let mut token =
            SecurityToken::from_cert_chain("t-3", ReferenceType::Embedded, vec![der])
                .unwrap();
        token.verify(&store).unwrap();
        assert!(token.is_verified());
        assert!(token.is_asymmetric());
        assert_eq!(token.public_key_bits().unwrap(), 256);
    }

    #[test]
    fn test_empty_chain_is_rejected() {
        let err =
            SecurityToken::from_cert_chain("t-4", ReferenceType::Embedded, vec![]).unwrap_err();
        assert!(matches!(err, Error::Certificate(_)));
    }
}
