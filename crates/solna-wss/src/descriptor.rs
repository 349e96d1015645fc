#![forbid(unsafe_code)]

//! Structure binding: building typed descriptors from a buffered event
//! window.
//!
//! The handlers never walk raw events themselves; a completed header-child
//! subtree is bound to a descriptor here, and processing operates on the
//! descriptor plus (for signatures) a replay of the window.

use base64::Engine;
use solna_core::{algorithm, ns, Error, Result};
use solna_crypto::keytransport::OaepParams;
use solna_events::event::XmlEvent;
use solna_keys::resolver::{KeyInfoDescriptor, KeyInfoEntry};

// ── Window navigation helpers ────────────────────────────────────────

/// Index of the end-element event matching the start element at `start`.
pub fn subtree_end(events: &[XmlEvent], start: usize) -> Result<usize> {
    if !matches!(events.get(start), Some(XmlEvent::StartElement { .. })) {
        return Err(Error::Structural("expected a start element".into()));
    }
    let mut depth = 0usize;
    for (i, event) in events.iter().enumerate().skip(start) {
        match event {
            XmlEvent::StartElement { .. } => depth += 1,
            XmlEvent::EndElement { .. } => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            XmlEvent::Characters { .. } => {}
        }
    }
    Err(Error::Structural("unterminated element subtree".into()))
}

/// Start indices of the direct child elements of the element at `root`.
pub fn direct_child_elements(events: &[XmlEvent], root: usize) -> Result<Vec<usize>> {
    let end = subtree_end(events, root)?;
    let mut children = Vec::new();
    let mut i = root + 1;
    while i < end {
        if matches!(events[i], XmlEvent::StartElement { .. }) {
            children.push(i);
            i = subtree_end(events, i)? + 1;
        } else {
            i += 1;
        }
    }
    Ok(children)
}

/// Concatenated character content of the subtree at `start`.
pub fn text_content(events: &[XmlEvent], start: usize) -> Result<String> {
    let end = subtree_end(events, start)?;
    let mut out = String::new();
    for event in &events[start..end] {
        if let XmlEvent::Characters { text } = event {
            out.push_str(text);
        }
    }
    Ok(out)
}

/// First direct child with the given namespace and local name.
pub fn find_child(
    events: &[XmlEvent],
    root: usize,
    ns_uri: &str,
    local: &str,
) -> Result<Option<usize>> {
    for idx in direct_child_elements(events, root)? {
        if events[idx].is_start_of(ns_uri, local) {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

fn require_child(events: &[XmlEvent], root: usize, ns_uri: &str, local: &str) -> Result<usize> {
    find_child(events, root, ns_uri, local)?
        .ok_or_else(|| Error::MissingElement(local.to_owned()))
}

/// The element's id: `wsu:Id` preferred, unqualified `Id` otherwise.
pub fn element_id(event: &XmlEvent) -> Option<String> {
    event
        .attribute_ns(ns::WSU, ns::attr::ID)
        .or_else(|| event.attribute(ns::attr::ID))
        .map(str::to_owned)
}

fn algorithm_attr(events: &[XmlEvent], idx: usize) -> Result<String> {
    events[idx]
        .attribute(ns::attr::ALGORITHM)
        .map(str::to_owned)
        .ok_or_else(|| Error::MissingAttribute("Algorithm".into()))
}

fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(e.to_string()))
}

/// PrefixList of an InclusiveNamespaces child, if present.
fn inclusive_prefixes(events: &[XmlEvent], parent: usize) -> Result<Vec<String>> {
    if let Some(idx) = find_child(events, parent, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)? {
        if let Some(list) = events[idx].attribute(ns::attr::PREFIX_LIST) {
            return Ok(list.split_whitespace().map(str::to_owned).collect());
        }
    }
    Ok(Vec::new())
}

// ── Timestamp ────────────────────────────────────────────────────────

/// A parsed `wsu:Timestamp` element.
#[derive(Debug, Clone)]
pub struct TimestampDescriptor {
    pub id: Option<String>,
    /// Raw Created text, validated by the timestamp validator.
    pub created: Option<String>,
    /// Raw Expires text.
    pub expires: Option<String>,
}

pub fn bind_timestamp(events: &[XmlEvent]) -> Result<TimestampDescriptor> {
    if !events
        .first()
        .is_some_and(|e| e.is_start_of(ns::WSU, ns::node::TIMESTAMP))
    {
        return Err(Error::Structural("expected a Timestamp element".into()));
    }
    let created = find_child(events, 0, ns::WSU, ns::node::CREATED)?
        .map(|idx| text_content(events, idx))
        .transpose()?
        .map(|s| s.trim().to_owned());
    let expires = find_child(events, 0, ns::WSU, ns::node::EXPIRES)?
        .map(|idx| text_content(events, idx))
        .transpose()?
        .map(|s| s.trim().to_owned());
    Ok(TimestampDescriptor {
        id: element_id(&events[0]),
        created,
        expires,
    })
}

// ── Signature ────────────────────────────────────────────────────────

/// One `ds:Reference` inside SignedInfo.
#[derive(Debug, Clone)]
pub struct ReferenceDescriptor {
    pub uri: String,
    pub transforms: Vec<String>,
    /// PrefixList attached to the canonicalization transform, if any.
    pub inclusive_prefixes: Vec<String>,
    pub digest_method: String,
    pub digest_value: Vec<u8>,
}

impl ReferenceDescriptor {
    /// The referenced element id (`#id` with the hash stripped).
    pub fn target_id(&self) -> Option<&str> {
        self.uri.strip_prefix('#')
    }
}

/// The parsed `ds:SignedInfo` content.
#[derive(Debug, Clone)]
pub struct SignedInfoDescriptor {
    pub c14n_method: String,
    pub inclusive_prefixes: Vec<String>,
    pub signature_method: String,
    pub references: Vec<ReferenceDescriptor>,
}

/// A parsed `ds:Signature` element.
#[derive(Debug, Clone)]
pub struct SignatureDescriptor {
    pub id: Option<String>,
    pub signed_info: SignedInfoDescriptor,
    pub signature_value: Vec<u8>,
    pub key_info: KeyInfoDescriptor,
}

pub fn bind_signature(events: &[XmlEvent]) -> Result<SignatureDescriptor> {
    if !events
        .first()
        .is_some_and(|e| e.is_start_of(ns::DSIG, ns::node::SIGNATURE))
    {
        return Err(Error::Structural("expected a Signature element".into()));
    }
    let id = element_id(&events[0]);

    let signed_info_idx = require_child(events, 0, ns::DSIG, ns::node::SIGNED_INFO)?;
    let signed_info = bind_signed_info(events, signed_info_idx)?;

    let sig_value_idx = require_child(events, 0, ns::DSIG, ns::node::SIGNATURE_VALUE)?;
    let signature_value = decode_base64(&text_content(events, sig_value_idx)?)?;

    let key_info = match find_child(events, 0, ns::DSIG, ns::node::KEY_INFO)? {
        Some(idx) => bind_key_info(events, idx, id.clone().unwrap_or_default())?,
        None => KeyInfoDescriptor::default(),
    };

    Ok(SignatureDescriptor {
        id,
        signed_info,
        signature_value,
        key_info,
    })
}

fn bind_signed_info(events: &[XmlEvent], root: usize) -> Result<SignedInfoDescriptor> {
    let c14n_idx = require_child(events, root, ns::DSIG, ns::node::CANONICALIZATION_METHOD)?;
    let c14n_method = algorithm_attr(events, c14n_idx)?;
    let prefixes = inclusive_prefixes(events, c14n_idx)?;

    let sig_method_idx = require_child(events, root, ns::DSIG, ns::node::SIGNATURE_METHOD)?;
    let signature_method = algorithm_attr(events, sig_method_idx)?;

    let mut references = Vec::new();
    for child in direct_child_elements(events, root)? {
        if events[child].is_start_of(ns::DSIG, ns::node::REFERENCE) {
            references.push(bind_reference(events, child)?);
        }
    }
    if references.is_empty() {
        return Err(Error::MissingElement("Reference".into()));
    }

    Ok(SignedInfoDescriptor {
        c14n_method,
        inclusive_prefixes: prefixes,
        signature_method,
        references,
    })
}

fn bind_reference(events: &[XmlEvent], root: usize) -> Result<ReferenceDescriptor> {
    let uri = events[root]
        .attribute(ns::attr::URI)
        .unwrap_or_default()
        .to_owned();

    let mut transforms = Vec::new();
    let mut prefixes = Vec::new();
    if let Some(transforms_idx) = find_child(events, root, ns::DSIG, ns::node::TRANSFORMS)? {
        for t in direct_child_elements(events, transforms_idx)? {
            if events[t].is_start_of(ns::DSIG, ns::node::TRANSFORM) {
                let uri = algorithm_attr(events, t)?;
                if uri == algorithm::EXC_C14N || uri == algorithm::EXC_C14N_WITH_COMMENTS {
                    prefixes = inclusive_prefixes(events, t)?;
                }
                transforms.push(uri);
            }
        }
    }

    let digest_method_idx = require_child(events, root, ns::DSIG, ns::node::DIGEST_METHOD)?;
    let digest_method = algorithm_attr(events, digest_method_idx)?;

    let digest_value_idx = require_child(events, root, ns::DSIG, ns::node::DIGEST_VALUE)?;
    let digest_value = decode_base64(&text_content(events, digest_value_idx)?)?;

    Ok(ReferenceDescriptor {
        uri,
        transforms,
        inclusive_prefixes: prefixes,
        digest_method,
        digest_value,
    })
}

// ── KeyInfo ──────────────────────────────────────────────────────────

/// Bind a `ds:KeyInfo` subtree into resolver entries.
pub fn bind_key_info(
    events: &[XmlEvent],
    root: usize,
    owner_id: String,
) -> Result<KeyInfoDescriptor> {
    let mut entries = Vec::new();
    for child in direct_child_elements(events, root)? {
        let event = &events[child];
        if event.is_start_of(ns::WSSE, ns::node::SECURITY_TOKEN_REFERENCE) {
            bind_str_entries(events, child, &mut entries)?;
        } else if event.is_start_of(ns::DSIG, ns::node::X509_DATA) {
            bind_x509_data(events, child, &mut entries)?;
        } else if event.is_start_of(ns::DSIG, ns::node::KEY_NAME) {
            entries.push(KeyInfoEntry::KeyName {
                name: text_content(events, child)?.trim().to_owned(),
            });
        }
        // Other KeyInfo content (KeyValue etc.) is not a token reference.
    }
    Ok(KeyInfoDescriptor { owner_id, entries })
}

fn bind_str_entries(
    events: &[XmlEvent],
    root: usize,
    entries: &mut Vec<KeyInfoEntry>,
) -> Result<()> {
    for child in direct_child_elements(events, root)? {
        let event = &events[child];
        if event.is_start_of(ns::WSSE, ns::node::REFERENCE) {
            let uri = event
                .attribute(ns::attr::URI)
                .ok_or_else(|| Error::MissingAttribute("URI on wsse:Reference".into()))?;
            entries.push(KeyInfoEntry::Reference {
                uri: uri.to_owned(),
            });
        } else if event.is_start_of(ns::WSSE, ns::node::KEY_IDENTIFIER) {
            let value_type = event.attribute(ns::attr::VALUE_TYPE).map(str::to_owned);
            let bytes = decode_base64(&text_content(events, child)?)?;
            entries.push(KeyInfoEntry::KeyIdentifier { value_type, bytes });
        } else if event.is_start_of(ns::DSIG, ns::node::X509_DATA) {
            bind_x509_data(events, child, entries)?;
        } else if event.is_start_of(ns::WSSE, ns::node::EMBEDDED) {
            if let Some(bst) =
                find_child(events, child, ns::WSSE, ns::node::BINARY_SECURITY_TOKEN)?
            {
                let der = decode_base64(&text_content(events, bst)?)?;
                entries.push(KeyInfoEntry::EmbeddedCert { der });
            }
        }
    }
    Ok(())
}

fn bind_x509_data(
    events: &[XmlEvent],
    root: usize,
    entries: &mut Vec<KeyInfoEntry>,
) -> Result<()> {
    for child in direct_child_elements(events, root)? {
        let event = &events[child];
        if event.is_start_of(ns::DSIG, ns::node::X509_CERTIFICATE) {
            let der = decode_base64(&text_content(events, child)?)?;
            entries.push(KeyInfoEntry::EmbeddedCert { der });
        } else if event.is_start_of(ns::DSIG, ns::node::X509_ISSUER_SERIAL) {
            let issuer = find_child(events, child, ns::DSIG, ns::node::X509_ISSUER_NAME)?
                .map(|i| text_content(events, i))
                .transpose()?
                .unwrap_or_default();
            let serial = find_child(events, child, ns::DSIG, ns::node::X509_SERIAL_NUMBER)?
                .map(|i| text_content(events, i))
                .transpose()?
                .unwrap_or_default();
            entries.push(KeyInfoEntry::IssuerSerial {
                issuer: issuer.trim().to_owned(),
                serial: serial.trim().to_owned(),
            });
        }
    }
    Ok(())
}

// ── EncryptedKey ─────────────────────────────────────────────────────

/// A parsed `xenc:EncryptedKey` element.
#[derive(Debug, Clone)]
pub struct EncryptedKeyDescriptor {
    pub id: Option<String>,
    pub transport_algorithm: String,
    pub oaep: OaepParams,
    pub key_info: KeyInfoDescriptor,
    pub cipher_value: Vec<u8>,
    /// DataReference targets with the leading `#` stripped.
    pub data_reference_ids: Vec<String>,
    /// Attributes the Basic Security Profile forbids on EncryptedKey.
    pub disallowed_attributes: Vec<String>,
}

pub fn bind_encrypted_key(events: &[XmlEvent]) -> Result<EncryptedKeyDescriptor> {
    if !events
        .first()
        .is_some_and(|e| e.is_start_of(ns::ENC, ns::node::ENCRYPTED_KEY))
    {
        return Err(Error::Structural("expected an EncryptedKey element".into()));
    }
    let root_event = &events[0];
    let id = element_id(root_event);

    let mut disallowed = Vec::new();
    for name in [
        ns::attr::TYPE,
        ns::attr::MIME_TYPE,
        ns::attr::ENCODING,
        ns::attr::RECIPIENT,
    ] {
        if root_event.attribute(name).is_some() {
            disallowed.push(name.to_owned());
        }
    }

    let method_idx = require_child(events, 0, ns::ENC, ns::node::ENCRYPTION_METHOD)?;
    let transport_algorithm = algorithm_attr(events, method_idx)?;
    let oaep = bind_oaep_params(events, method_idx)?;

    let key_info = match find_child(events, 0, ns::DSIG, ns::node::KEY_INFO)? {
        Some(idx) => bind_key_info(events, idx, id.clone().unwrap_or_default())?,
        None => KeyInfoDescriptor::default(),
    };

    let cipher_data_idx = require_child(events, 0, ns::ENC, ns::node::CIPHER_DATA)?;
    let cipher_value_idx =
        require_child(events, cipher_data_idx, ns::ENC, ns::node::CIPHER_VALUE)?;
    let cipher_value = decode_base64(&text_content(events, cipher_value_idx)?)?;

    let mut data_reference_ids = Vec::new();
    if let Some(ref_list_idx) = find_child(events, 0, ns::ENC, ns::node::REFERENCE_LIST)? {
        for r in direct_child_elements(events, ref_list_idx)? {
            if events[r].is_start_of(ns::ENC, ns::node::DATA_REFERENCE) {
                let uri = events[r]
                    .attribute(ns::attr::URI)
                    .ok_or_else(|| Error::MissingAttribute("URI on DataReference".into()))?;
                data_reference_ids.push(uri.strip_prefix('#').unwrap_or(uri).to_owned());
            }
        }
    }

    Ok(EncryptedKeyDescriptor {
        id,
        transport_algorithm,
        oaep,
        key_info,
        cipher_value,
        data_reference_ids,
        disallowed_attributes: disallowed,
    })
}

/// OAEP parameters from EncryptionMethod children: DigestMethod, MGF
/// (XML Enc 1.1) and OAEPparams.
fn bind_oaep_params(events: &[XmlEvent], method_idx: usize) -> Result<OaepParams> {
    let digest_uri = find_child(events, method_idx, ns::DSIG, ns::node::DIGEST_METHOD)?
        .map(|i| algorithm_attr(events, i))
        .transpose()?;
    let mgf_uri = find_child(events, method_idx, ns::ENC11, ns::node::MGF)?
        .map(|i| algorithm_attr(events, i))
        .transpose()?;
    let psource = find_child(events, method_idx, ns::ENC, ns::node::OAEP_PARAMS)?
        .map(|i| text_content(events, i).and_then(|t| decode_base64(&t)))
        .transpose()?;
    Ok(OaepParams {
        digest_uri,
        mgf_uri,
        psource,
    })
}

// ── EncryptedData ────────────────────────────────────────────────────

/// A parsed `xenc:EncryptedData` element.
#[derive(Debug, Clone)]
pub struct EncryptedDataDescriptor {
    pub id: Option<String>,
    pub enc_type: Option<String>,
    pub algorithm: String,
    pub cipher_value: Vec<u8>,
}

pub fn bind_encrypted_data(events: &[XmlEvent]) -> Result<EncryptedDataDescriptor> {
    if !events
        .first()
        .is_some_and(|e| e.is_start_of(ns::ENC, ns::node::ENCRYPTED_DATA))
    {
        return Err(Error::Structural("expected an EncryptedData element".into()));
    }
    let id = element_id(&events[0]);
    let enc_type = events[0].attribute(ns::attr::TYPE).map(str::to_owned);

    let method_idx = require_child(events, 0, ns::ENC, ns::node::ENCRYPTION_METHOD)?;
    let algorithm = algorithm_attr(events, method_idx)?;

    let cipher_data_idx = require_child(events, 0, ns::ENC, ns::node::CIPHER_DATA)?;
    let cipher_value_idx =
        require_child(events, cipher_data_idx, ns::ENC, ns::node::CIPHER_VALUE)?;
    let cipher_value = decode_base64(&text_content(events, cipher_value_idx)?)?;

    Ok(EncryptedDataDescriptor {
        id,
        enc_type,
        algorithm,
        cipher_value,
    })
}

// ── BinarySecurityToken ──────────────────────────────────────────────

/// A parsed `wsse:BinarySecurityToken` element.
#[derive(Debug, Clone)]
pub struct BinaryTokenDescriptor {
    pub id: Option<String>,
    pub value_type: Option<String>,
    pub encoding_type: Option<String>,
    pub der: Vec<u8>,
}

pub fn bind_binary_token(events: &[XmlEvent]) -> Result<BinaryTokenDescriptor> {
    if !events
        .first()
        .is_some_and(|e| e.is_start_of(ns::WSSE, ns::node::BINARY_SECURITY_TOKEN))
    {
        return Err(Error::Structural(
            "expected a BinarySecurityToken element".into(),
        ));
    }
    let id = element_id(&events[0]);
    let value_type = events[0].attribute(ns::attr::VALUE_TYPE).map(str::to_owned);
    let encoding_type = events[0]
        .attribute(ns::attr::ENCODING_TYPE)
        .map(str::to_owned);
    let der = decode_base64(&text_content(events, 0)?)?;
    Ok(BinaryTokenDescriptor {
        id,
        value_type,
        encoding_type,
        der,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solna_events::reader::parse_events;

    const WSU: &str =
        "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

    #[test]
    fn test_bind_timestamp_full() {
        let xml = format!(
            "<wsu:Timestamp xmlns:wsu=\"{WSU}\" wsu:Id=\"ts-1\">\
             <wsu:Created>2024-01-01T00:00:00Z</wsu:Created>\
             <wsu:Expires>2024-01-01T00:05:00Z</wsu:Expires>\
             </wsu:Timestamp>"
        );
        let events = parse_events(&xml).unwrap();
        let ts = bind_timestamp(&events).unwrap();
        assert_eq!(ts.id.as_deref(), Some("ts-1"));
        assert_eq!(ts.created.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(ts.expires.as_deref(), Some("2024-01-01T00:05:00Z"));
    }

    #[test]
    fn test_bind_timestamp_empty() {
        let xml = format!("<wsu:Timestamp xmlns:wsu=\"{WSU}\"/>");
        let events = parse_events(&xml).unwrap();
        let ts = bind_timestamp(&events).unwrap();
        assert!(ts.created.is_none());
        assert!(ts.expires.is_none());
    }

    #[test]
    fn test_bind_signature_structure() {
        let xml = "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">\
            <ds:SignedInfo>\
            <ds:CanonicalizationMethod Algorithm=\"http://www.w3.org/2001/10/xml-exc-c14n#\"/>\
            <ds:SignatureMethod Algorithm=\"http://www.w3.org/2000/09/xmldsig#hmac-sha1\"/>\
            <ds:Reference URI=\"#body-1\">\
            <ds:Transforms>\
            <ds:Transform Algorithm=\"http://www.w3.org/2001/10/xml-exc-c14n#\"/>\
            </ds:Transforms>\
            <ds:DigestMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#sha256\"/>\
            <ds:DigestValue>AAAA</ds:DigestValue>\
            </ds:Reference>\
            </ds:SignedInfo>\
            <ds:SignatureValue>AAAA</ds:SignatureValue>\
            <ds:KeyInfo><ds:KeyName>hmac-key</ds:KeyName></ds:KeyInfo>\
            </ds:Signature>";
        let events = parse_events(xml).unwrap();
        let sig = bind_signature(&events).unwrap();
        assert_eq!(
            sig.signed_info.c14n_method,
            "http://www.w3.org/2001/10/xml-exc-c14n#"
        );
        assert_eq!(sig.signed_info.references.len(), 1);
        assert_eq!(sig.signed_info.references[0].target_id(), Some("body-1"));
        assert_eq!(sig.key_info.entries.len(), 1);
        assert!(matches!(
            &sig.key_info.entries[0],
            KeyInfoEntry::KeyName { name } if name == "hmac-key"
        ));
    }

    #[test]
    fn test_bind_signature_missing_signed_info_fails() {
        let xml = "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">\
            <ds:SignatureValue>AAAA</ds:SignatureValue></ds:Signature>";
        let events = parse_events(xml).unwrap();
        assert!(matches!(
            bind_signature(&events),
            Err(Error::MissingElement(_))
        ));
    }

    #[test]
    fn test_bind_encrypted_key() {
        let xml = "<xenc:EncryptedKey xmlns:xenc=\"http://www.w3.org/2001/04/xmlenc#\" Id=\"ek-1\">\
            <xenc:EncryptionMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p\">\
            <ds:DigestMethod xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" \
            Algorithm=\"http://www.w3.org/2001/04/xmlenc#sha256\"/>\
            </xenc:EncryptionMethod>\
            <xenc:CipherData><xenc:CipherValue>AAEC</xenc:CipherValue></xenc:CipherData>\
            <xenc:ReferenceList><xenc:DataReference URI=\"#ed-1\"/></xenc:ReferenceList>\
            </xenc:EncryptedKey>";
        let events = parse_events(xml).unwrap();
        let ek = bind_encrypted_key(&events).unwrap();
        assert_eq!(ek.id.as_deref(), Some("ek-1"));
        assert_eq!(
            ek.transport_algorithm,
            "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p"
        );
        assert_eq!(
            ek.oaep.digest_uri.as_deref(),
            Some("http://www.w3.org/2001/04/xmlenc#sha256")
        );
        assert_eq!(ek.cipher_value, vec![0, 1, 2]);
        assert_eq!(ek.data_reference_ids, vec!["ed-1".to_owned()]);
        assert!(ek.disallowed_attributes.is_empty());
    }

    #[test]
    fn test_bind_encrypted_key_flags_disallowed_attributes() {
        let xml = "<xenc:EncryptedKey xmlns:xenc=\"http://www.w3.org/2001/04/xmlenc#\" \
            MimeType=\"text/xml\" Recipient=\"anyone\">\
            <xenc:EncryptionMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p\"/>\
            <xenc:CipherData><xenc:CipherValue>AAEC</xenc:CipherValue></xenc:CipherData>\
            </xenc:EncryptedKey>";
        let events = parse_events(xml).unwrap();
        let ek = bind_encrypted_key(&events).unwrap();
        assert_eq!(ek.disallowed_attributes.len(), 2);
    }

    #[test]
    fn test_bind_encrypted_data_missing_cipher_fails() {
        let xml = "<xenc:EncryptedData xmlns:xenc=\"http://www.w3.org/2001/04/xmlenc#\">\
            <xenc:EncryptionMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#aes128-cbc\"/>\
            </xenc:EncryptedData>";
        let events = parse_events(xml).unwrap();
        assert!(matches!(
            bind_encrypted_data(&events),
            Err(Error::MissingElement(_))
        ));
    }
}
