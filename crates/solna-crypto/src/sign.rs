#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA, ECDSA, HMAC).

use solna_core::{algorithm, Error, Result};

/// Key material for signature operations.
pub enum VerifyKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP256Public(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::SigningKey),
    EcP384Public(p384::ecdsa::VerifyingKey),
    Hmac(Vec<u8>),
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &VerifyKey, data: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, key: &VerifyKey, data: &[u8], signature: &[u8]) -> Result<bool>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256 { uri: algorithm::ECDSA_SHA256 })),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384 { uri: algorithm::ECDSA_SHA384 })),

        algorithm::HMAC_SHA1 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA1, hash: HashType::Sha1 })),
        algorithm::HMAC_SHA256 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA256, hash: HashType::Sha256 })),
        algorithm::HMAC_SHA384 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA384, hash: HashType::Sha384 })),
        algorithm::HMAC_SHA512 => Ok(Box::new(HmacSign { uri: algorithm::HMAC_SHA512, hash: HashType::Sha512 })),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType { Sha1, Sha256, Sha384, Sha512 }

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 { uri: &'static str, hash: HashType }

impl RsaPkcs1v15 {
    fn sign_with_key(&self, private_key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
        use signature::{SignatureEncoding, Signer};
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                Ok(sk.sign(data).to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify_with_key(&self, public_key: &rsa::RsaPublicKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use signature::Verifier;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &VerifyKey, data: &[u8]) -> Result<Vec<u8>> {
        match key {
            VerifyKey::Rsa(pk) => self.sign_with_key(pk, data),
            _ => Err(Error::Key("RSA private key required".into())),
        }
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let pubk = match key {
            VerifyKey::Rsa(pk) => pk.to_public_key(),
            VerifyKey::RsaPublic(pk) => pk.clone(),
            _ => return Err(Error::Key("RSA key required".into())),
        };
        self.verify_with_key(&pubk, data, sig_bytes)
    }
}

// ── ECDSA P-256 ──────────────────────────────────────────────────────

struct EcdsaP256 { uri: &'static str }

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-256.
fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature> {
    if rs.len() != 64 {
        return Err(Error::Crypto(format!(
            "P-256 signature must be 64 bytes, got {}",
            rs.len()
        )));
    }
    let r = p256::FieldBytes::from_slice(&rs[..32]);
    let s = p256::FieldBytes::from_slice(&rs[32..]);
    p256::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))
}

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &VerifyKey, data: &[u8]) -> Result<Vec<u8>> {
        use signature::Signer;
        let VerifyKey::EcP256(sk) = key else {
            return Err(Error::Key("P-256 signing key required".into()));
        };
        let sig: p256::ecdsa::Signature = sk.sign(data);
        let (r, s) = sig.split_bytes();
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&r);
        out.extend_from_slice(&s);
        Ok(out)
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use signature::Verifier;
        let vk = match key {
            VerifyKey::EcP256(sk) => *sk.verifying_key(),
            VerifyKey::EcP256Public(vk) => *vk,
            _ => return Err(Error::Key("P-256 key required".into())),
        };
        let sig = xmldsig_to_p256(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

// ── ECDSA P-384 ──────────────────────────────────────────────────────

struct EcdsaP384 { uri: &'static str }

/// Convert XML-DSig ECDSA r||s to a typed Signature for P-384.
fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature> {
    if rs.len() != 96 {
        return Err(Error::Crypto(format!(
            "P-384 signature must be 96 bytes, got {}",
            rs.len()
        )));
    }
    let r = p384::FieldBytes::from_slice(&rs[..48]);
    let s = p384::FieldBytes::from_slice(&rs[48..]);
    p384::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))
}

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &VerifyKey, data: &[u8]) -> Result<Vec<u8>> {
        use signature::Signer;
        let VerifyKey::EcP384(sk) = key else {
            return Err(Error::Key("P-384 signing key required".into()));
        };
        let sig: p384::ecdsa::Signature = sk.sign(data);
        let (r, s) = sig.split_bytes();
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(&r);
        out.extend_from_slice(&s);
        Ok(out)
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        use signature::Verifier;
        let vk = match key {
            VerifyKey::EcP384(sk) => *sk.verifying_key(),
            VerifyKey::EcP384Public(vk) => *vk,
            _ => return Err(Error::Key("P-384 key required".into())),
        };
        let sig = xmldsig_to_p384(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

// ── HMAC ─────────────────────────────────────────────────────────────

struct HmacSign { uri: &'static str, hash: HashType }

impl SignatureAlgorithm for HmacSign {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &VerifyKey, data: &[u8]) -> Result<Vec<u8>> {
        let VerifyKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        compute_hmac(self.hash, key_bytes, data)
    }

    fn verify(&self, key: &VerifyKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool> {
        let VerifyKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let expected = compute_hmac(self.hash, key_bytes, data)?;
        Ok(constant_time_eq(&expected, sig_bytes))
    }
}

fn compute_hmac(hash: HashType, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use hmac::{Hmac, Mac};
    macro_rules! hmac_compute {
        ($hasher:ty) => {{
            let mut mac = <Hmac<$hasher>>::new_from_slice(key)
                .map_err(|e| Error::Key(format!("HMAC key: {e}")))?;
            mac.update(data);
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match hash {
        HashType::Sha1 => hmac_compute!(sha1::Sha1),
        HashType::Sha256 => hmac_compute!(sha2::Sha256),
        HashType::Sha384 => hmac_compute!(sha2::Sha384),
        HashType::Sha512 => hmac_compute!(sha2::Sha512),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rsa_key() -> rsa::RsaPrivateKey {
        let mut rng = rand::thread_rng();
        rsa::RsaPrivateKey::new(&mut rng, 2048).expect("RSA keygen")
    }

    #[test]
    fn test_rsa_sha256_sign_verify() {
        let key = VerifyKey::Rsa(test_rsa_key());
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        let sig = alg.sign(&key, b"payload").unwrap();
        assert!(alg.verify(&key, b"payload", &sig).unwrap());
        assert!(!alg.verify(&key, b"tampered", &sig).unwrap());
    }

    #[test]
    fn test_rsa_flipped_signature_byte_fails() {
        let key = VerifyKey::Rsa(test_rsa_key());
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        let mut sig = alg.sign(&key, b"payload").unwrap();
        sig[0] ^= 0xFF;
        assert!(!alg.verify(&key, b"payload", &sig).unwrap());
    }

    #[test]
    fn test_hmac_sha256_sign_verify() {
        let key = VerifyKey::Hmac(vec![0x0b; 32]);
        let alg = from_uri(algorithm::HMAC_SHA256).unwrap();
        let sig = alg.sign(&key, b"payload").unwrap();
        assert_eq!(sig.len(), 32);
        assert!(alg.verify(&key, b"payload", &sig).unwrap());
        let wrong = VerifyKey::Hmac(vec![0x0c; 32]);
        assert!(!alg.verify(&wrong, b"payload", &sig).unwrap());
    }

    #[test]
    fn test_ecdsa_p256_sign_verify() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let vk = *sk.verifying_key();
        let alg = from_uri(algorithm::ECDSA_SHA256).unwrap();
        let sig = alg.sign(&VerifyKey::EcP256(sk), b"payload").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(alg
            .verify(&VerifyKey::EcP256Public(vk), b"payload", &sig)
            .unwrap());
    }

    #[test]
    fn test_unsupported_signature_algorithm() {
        assert!(from_uri("http://example.com/fake-sig").is_err());
    }
}
