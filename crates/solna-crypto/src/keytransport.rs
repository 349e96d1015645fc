#![forbid(unsafe_code)]

//! Key transport algorithms (RSA PKCS#1 v1.5, RSA-OAEP).

use solna_core::{algorithm, Error, Result};

/// Trait for key transport algorithms.
pub trait KeyTransportAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, private_key: &rsa::RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>>;
}

/// RSA-OAEP configuration parameters.
///
/// Extracted from the `EncryptionMethod` child elements of an
/// `EncryptedKey`: `DigestMethod`, `MGF` (XML Enc 1.1) and `OAEPparams`.
#[derive(Debug, Clone, Default)]
pub struct OaepParams {
    /// Digest algorithm URI (default: SHA-1)
    pub digest_uri: Option<String>,
    /// MGF algorithm URI (default: MGF1 with SHA-1, or the digest for enc11)
    pub mgf_uri: Option<String>,
    /// OAEPparams (optional label, base64-decoded)
    pub psource: Option<Vec<u8>>,
}

/// Create a key transport algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn KeyTransportAlgorithm>> {
    from_uri_with_params(uri, OaepParams::default())
}

/// Create a key transport algorithm from its URI with RSA-OAEP parameters.
pub fn from_uri_with_params(uri: &str, params: OaepParams) -> Result<Box<dyn KeyTransportAlgorithm>> {
    match uri {
        algorithm::RSA_PKCS1 => Ok(Box::new(RsaPkcs1Transport)),
        algorithm::RSA_OAEP => Ok(Box::new(RsaOaepTransport {
            uri: algorithm::RSA_OAEP,
            params,
        })),
        algorithm::RSA_OAEP_ENC11 => Ok(Box::new(RsaOaepTransport {
            uri: algorithm::RSA_OAEP_ENC11,
            params,
        })),
        _ => Err(Error::UnsupportedAlgorithm(format!("key transport: {uri}"))),
    }
}

struct RsaPkcs1Transport;

impl KeyTransportAlgorithm for RsaPkcs1Transport {
    fn uri(&self) -> &'static str {
        algorithm::RSA_PKCS1
    }

    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>> {
        use rsa::Pkcs1v15Encrypt;
        let mut rng = rand::thread_rng();
        public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, key_data)
            .map_err(|e| Error::Crypto(format!("RSA PKCS#1 encrypt: {e}")))
    }

    fn decrypt(&self, private_key: &rsa::RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>> {
        use rsa::Pkcs1v15Encrypt;
        private_key
            .decrypt(Pkcs1v15Encrypt, encrypted)
            .map_err(|e| Error::Crypto(format!("RSA PKCS#1 decrypt: {e}")))
    }
}

struct RsaOaepTransport {
    uri: &'static str,
    params: OaepParams,
}

/// Resolve the digest URI to a concrete hash identifier.
fn resolve_digest(uri: Option<&str>) -> &'static str {
    match uri {
        Some(algorithm::SHA256) => "sha256",
        Some(algorithm::SHA384) => "sha384",
        Some(algorithm::SHA512) => "sha512",
        Some(algorithm::SHA224) => "sha224",
        _ => "sha1",
    }
}

/// Resolve the MGF URI to a hash identifier.
fn resolve_mgf(uri: Option<&str>) -> Option<&'static str> {
    match uri {
        Some(algorithm::MGF1_SHA1) => Some("sha1"),
        Some(algorithm::MGF1_SHA224) => Some("sha224"),
        Some(algorithm::MGF1_SHA256) => Some("sha256"),
        Some(algorithm::MGF1_SHA384) => Some("sha384"),
        Some(algorithm::MGF1_SHA512) => Some("sha512"),
        _ => None,
    }
}

/// Resolve the MGF hash for OAEP.
///
/// For `rsa-oaep-mgf1p` (XML Enc 1.0): MGF1 always uses SHA-1 unless an
/// explicit MGF element overrides it.  The DigestMethod only controls the
/// OAEP label hash.
///
/// For `rsa-oaep` (XML Enc 1.1): MGF defaults to the same hash as
/// DigestMethod when no explicit MGF element is present.
fn resolve_oaep_mgf(uri: &str, params: &OaepParams, digest: &'static str) -> &'static str {
    if let Some(mgf) = resolve_mgf(params.mgf_uri.as_deref()) {
        return mgf;
    }
    if uri == algorithm::RSA_OAEP {
        return "sha1";
    }
    digest
}

macro_rules! oaep_encrypt {
    ($public_key:expr, $key_data:expr, $digest:ty, $mgf:ty, $label:expr) => {{
        use rsa::Oaep;
        let mut rng = rand::thread_rng();
        let mut padding = Oaep::new_with_mgf_hash::<$digest, $mgf>();
        if let Some(ref label_bytes) = $label {
            padding.label = Some(String::from_utf8_lossy(label_bytes).into_owned());
        }
        $public_key
            .encrypt(&mut rng, padding, $key_data)
            .map_err(|e| Error::Crypto(format!("RSA-OAEP encrypt: {e}")))
    }};
}

macro_rules! oaep_decrypt {
    ($private_key:expr, $encrypted:expr, $digest:ty, $mgf:ty, $label:expr) => {{
        use rsa::Oaep;
        let mut padding = Oaep::new_with_mgf_hash::<$digest, $mgf>();
        if let Some(ref label_bytes) = $label {
            padding.label = Some(String::from_utf8_lossy(label_bytes).into_owned());
        }
        $private_key
            .decrypt(padding, $encrypted)
            .map_err(|e| Error::Crypto(format!("RSA-OAEP decrypt: {e}")))
    }};
}

/// Dispatch to the correct OAEP encrypt based on (digest, mgf) string pair.
macro_rules! oaep_dispatch_encrypt {
    ($pk:expr, $data:expr, $digest:expr, $mgf:expr, $label:expr) => {{
        macro_rules! with_mgf {
            ($d:ty) => {
                match $mgf {
                    "sha224" => oaep_encrypt!($pk, $data, $d, sha2::Sha224, $label),
                    "sha256" => oaep_encrypt!($pk, $data, $d, sha2::Sha256, $label),
                    "sha384" => oaep_encrypt!($pk, $data, $d, sha2::Sha384, $label),
                    "sha512" => oaep_encrypt!($pk, $data, $d, sha2::Sha512, $label),
                    _ => oaep_encrypt!($pk, $data, $d, sha1::Sha1, $label),
                }
            };
        }
        match $digest {
            "sha224" => with_mgf!(sha2::Sha224),
            "sha256" => with_mgf!(sha2::Sha256),
            "sha384" => with_mgf!(sha2::Sha384),
            "sha512" => with_mgf!(sha2::Sha512),
            _ => with_mgf!(sha1::Sha1),
        }
    }};
}

/// Dispatch to the correct OAEP decrypt based on (digest, mgf) string pair.
macro_rules! oaep_dispatch_decrypt {
    ($pk:expr, $data:expr, $digest:expr, $mgf:expr, $label:expr) => {{
        macro_rules! with_mgf {
            ($d:ty) => {
                match $mgf {
                    "sha224" => oaep_decrypt!($pk, $data, $d, sha2::Sha224, $label),
                    "sha256" => oaep_decrypt!($pk, $data, $d, sha2::Sha256, $label),
                    "sha384" => oaep_decrypt!($pk, $data, $d, sha2::Sha384, $label),
                    "sha512" => oaep_decrypt!($pk, $data, $d, sha2::Sha512, $label),
                    _ => oaep_decrypt!($pk, $data, $d, sha1::Sha1, $label),
                }
            };
        }
        match $digest {
            "sha224" => with_mgf!(sha2::Sha224),
            "sha256" => with_mgf!(sha2::Sha256),
            "sha384" => with_mgf!(sha2::Sha384),
            "sha512" => with_mgf!(sha2::Sha512),
            _ => with_mgf!(sha1::Sha1),
        }
    }};
}

impl KeyTransportAlgorithm for RsaOaepTransport {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>> {
        let digest = resolve_digest(self.params.digest_uri.as_deref());
        let mgf = resolve_oaep_mgf(self.uri, &self.params, digest);
        let label = &self.params.psource;

        oaep_dispatch_encrypt!(public_key, key_data, digest, mgf, label)
    }

    fn decrypt(&self, private_key: &rsa::RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>> {
        let digest = resolve_digest(self.params.digest_uri.as_deref());
        let mgf = resolve_oaep_mgf(self.uri, &self.params, digest);
        let label = &self.params.psource;

        oaep_dispatch_decrypt!(private_key, encrypted, digest, mgf, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rsa_key() -> rsa::RsaPrivateKey {
        let mut rng = rand::thread_rng();
        rsa::RsaPrivateKey::new(&mut rng, 2048).expect("RSA keygen")
    }

    #[test]
    fn test_rsa15_roundtrip() {
        let sk = test_rsa_key();
        let pk = sk.to_public_key();
        let transport = from_uri(algorithm::RSA_PKCS1).unwrap();
        let session_key = [0x42u8; 16];
        let wrapped = transport.encrypt(&pk, &session_key).unwrap();
        let unwrapped = transport.decrypt(&sk, &wrapped).unwrap();
        assert_eq!(unwrapped, session_key);
    }

    #[test]
    fn test_oaep_default_sha1_roundtrip() {
        let sk = test_rsa_key();
        let pk = sk.to_public_key();
        let transport = from_uri(algorithm::RSA_OAEP).unwrap();
        let session_key = [0x42u8; 32];
        let wrapped = transport.encrypt(&pk, &session_key).unwrap();
        let unwrapped = transport.decrypt(&sk, &wrapped).unwrap();
        assert_eq!(unwrapped, session_key);
    }

    #[test]
    fn test_oaep_enc11_sha256_roundtrip() {
        let sk = test_rsa_key();
        let pk = sk.to_public_key();
        let params = OaepParams {
            digest_uri: Some(algorithm::SHA256.into()),
            mgf_uri: Some(algorithm::MGF1_SHA256.into()),
            psource: None,
        };
        let transport =
            from_uri_with_params(algorithm::RSA_OAEP_ENC11, params).unwrap();
        let session_key = [0x13u8; 24];
        let wrapped = transport.encrypt(&pk, &session_key).unwrap();
        let unwrapped = transport.decrypt(&sk, &wrapped).unwrap();
        assert_eq!(unwrapped, session_key);
    }

    #[test]
    fn test_oaep_wrong_key_fails() {
        let sk1 = test_rsa_key();
        let sk2 = test_rsa_key();
        let transport = from_uri(algorithm::RSA_OAEP).unwrap();
        let wrapped = transport.encrypt(&sk1.to_public_key(), &[0x42u8; 16]).unwrap();
        assert!(transport.decrypt(&sk2, &wrapped).is_err());
    }

    #[test]
    fn test_unsupported_transport_algorithm() {
        assert!(from_uri(algorithm::KW_AES128).is_err());
    }
}
