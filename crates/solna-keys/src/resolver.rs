#![forbid(unsafe_code)]

//! Security token resolution from KeyInfo content.

use crate::provider::KeyProvider;
use crate::token::{ReferenceType, SecurityToken};
use solna_core::{Error, Result};

/// Parsed content of a `KeyInfo`/`SecurityTokenReference`, as supplied by
/// the structure binding layer.
#[derive(Debug, Clone, Default)]
pub struct KeyInfoDescriptor {
    /// Id of the element the KeyInfo belongs to (for token naming).
    pub owner_id: String,
    /// Reference entries found, in document order.
    pub entries: Vec<KeyInfoEntry>,
}

/// One child entry under KeyInfo/SecurityTokenReference.
#[derive(Debug, Clone)]
pub enum KeyInfoEntry {
    /// `wsse:Reference URI="#id"` to a token elsewhere in the document.
    Reference { uri: String },
    /// An X509Certificate embedded directly (base64-decoded DER).
    EmbeddedCert { der: Vec<u8> },
    /// `ds:X509IssuerSerial` lookup data.
    IssuerSerial { issuer: String, serial: String },
    /// `wsse:KeyIdentifier` bytes (base64-decoded).
    KeyIdentifier {
        value_type: Option<String>,
        bytes: Vec<u8>,
    },
    /// `ds:KeyName` naming a pre-shared secret.
    KeyName { name: String },
}

/// Lookup of tokens already registered during this message's processing
/// (implemented by the document registry).
pub trait TokenLookup {
    /// DER certificate registered under the given element id.
    fn certificate_by_id(&self, id: &str) -> Option<Vec<u8>>;
}

/// An empty lookup for contexts without a registry.
pub struct NoTokens;

impl TokenLookup for NoTokens {
    fn certificate_by_id(&self, _id: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Resolves KeyInfo content to exactly one security token.
pub struct TokenResolver<'a> {
    provider: &'a dyn KeyProvider,
    lookup: &'a dyn TokenLookup,
}

impl<'a> TokenResolver<'a> {
    pub fn new(provider: &'a dyn KeyProvider, lookup: &'a dyn TokenLookup) -> Self {
        Self { provider, lookup }
    }

    /// Resolve the descriptor to a single unverified token.
    ///
    /// Exactly one entry must be present: zero entries is a structural
    /// failure, more than one is a policy violation reported distinctly
    /// from "not found".
    pub fn resolve(&self, key_info: &KeyInfoDescriptor) -> Result<SecurityToken> {
        if key_info.entries.is_empty() {
            return Err(Error::Structural(
                "no security token reference in KeyInfo".into(),
            ));
        }
        if key_info.entries.len() > 1 {
            return Err(Error::PolicyViolation(format!(
                "KeyInfo must have exactly one child, found {}",
                key_info.entries.len()
            )));
        }

        let token = match &key_info.entries[0] {
            KeyInfoEntry::EmbeddedCert { der } => {
                tracing::debug!("resolving embedded certificate token");
                SecurityToken::from_cert_chain(
                    key_info.owner_id.clone(),
                    ReferenceType::Embedded,
                    vec![der.clone()],
                )?
            }
            KeyInfoEntry::Reference { uri } => {
                let id = uri.strip_prefix('#').unwrap_or(uri);
                let der = self.lookup.certificate_by_id(id).ok_or_else(|| {
                    Error::KeyNotFound(format!("no token registered under #{id}"))
                })?;
                SecurityToken::from_cert_chain(
                    id.to_owned(),
                    ReferenceType::DirectReference,
                    vec![der],
                )?
            }
            KeyInfoEntry::IssuerSerial { issuer, serial } => {
                let der = self
                    .provider
                    .certificate_for_issuer_serial(issuer, serial)
                    .ok_or_else(|| {
                        Error::KeyNotFound(format!(
                            "no certificate for issuer={issuer} serial={serial}"
                        ))
                    })?;
                SecurityToken::from_cert_chain(
                    key_info.owner_id.clone(),
                    ReferenceType::IssuerSerial,
                    vec![der],
                )?
            }
            KeyInfoEntry::KeyIdentifier { bytes, .. } => {
                let der = self
                    .provider
                    .certificate_for_key_identifier(bytes)
                    .ok_or_else(|| {
                        Error::KeyNotFound("no certificate for key identifier".into())
                    })?;
                SecurityToken::from_cert_chain(
                    key_info.owner_id.clone(),
                    ReferenceType::KeyIdentifier,
                    vec![der],
                )?
            }
            KeyInfoEntry::KeyName { name } => {
                let secret = self.provider.secret_key(name).ok_or_else(|| {
                    Error::KeyNotFound(format!("no pre-shared key named {name}"))
                })?;
                SecurityToken::from_secret(name.clone(), ReferenceType::KeyName, secret)
            }
        };
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::NullKeyProvider;
    use std::collections::HashMap;

    struct MapProvider {
        secrets: HashMap<String, Vec<u8>>,
    }

    impl KeyProvider for MapProvider {
        fn secret_key(&self, hint: &str) -> Option<Vec<u8>> {
            self.secrets.get(hint).cloned()
        }
    }

    fn descriptor(entries: Vec<KeyInfoEntry>) -> KeyInfoDescriptor {
        KeyInfoDescriptor {
            owner_id: "sig-1".into(),
            entries,
        }
    }

    #[test]
    fn test_empty_key_info_is_structural_failure() {
        let resolver = TokenResolver::new(&NullKeyProvider, &NoTokens);
        let err = resolver.resolve(&descriptor(vec![])).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_ambiguous_key_info_is_policy_violation() {
        let resolver = TokenResolver::new(&NullKeyProvider, &NoTokens);
        let err = resolver
            .resolve(&descriptor(vec![
                KeyInfoEntry::KeyName { name: "a".into() },
                KeyInfoEntry::KeyName { name: "b".into() },
            ]))
            .unwrap_err();
        assert!(matches!(err, Error::PolicyViolation(_)));
    }

    #[test]
    fn test_key_name_resolves_symmetric_token() {
        let mut secrets = HashMap::new();
        secrets.insert("hmac-key".to_owned(), vec![7u8; 32]);
        let provider = MapProvider { secrets };
        let resolver = TokenResolver::new(&provider, &NoTokens);
        let token = resolver
            .resolve(&descriptor(vec![KeyInfoEntry::KeyName {
                name: "hmac-key".into(),
            }]))
            .unwrap();
        assert!(!token.is_asymmetric());
        assert_eq!(token.reference, ReferenceType::KeyName);
    }

    #[test]
    fn test_missing_key_name_is_not_found() {
        let resolver = TokenResolver::new(&NullKeyProvider, &NoTokens);
        let err = resolver
            .resolve(&descriptor(vec![KeyInfoEntry::KeyName {
                name: "missing".into(),
            }]))
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(_)));
    }

    #[test]
    fn test_direct_reference_miss_is_not_found() {
        let resolver = TokenResolver::new(&NullKeyProvider, &NoTokens);
        let err = resolver
            .resolve(&descriptor(vec![KeyInfoEntry::Reference {
                uri: "#cert-1".into(),
            }]))
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound(_)));
    }
}
