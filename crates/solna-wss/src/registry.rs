#![forbid(unsafe_code)]

//! Process-scoped registry of verification and decryption results.
//!
//! Maps element ids to results so that a token referenced twice is
//! processed once (idempotent insert-or-get, guarding against malicious
//! duplicate-id documents), and resolves cross-references between a
//! Signature/EncryptedKey and the elements it protects.

use solna_events::event::{NsBinding, XmlEvent};
use solna_keys::resolver::TokenLookup;
use std::collections::{HashMap, HashSet};

/// The kind of processing that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Timestamp,
    SignatureCheck,
    Encryption,
    Token,
}

/// One decrypted DataReference.
#[derive(Debug, Clone)]
pub struct DecryptedReference {
    pub id: String,
    pub algorithm: String,
    pub plaintext_len: usize,
}

/// Result of processing one security-header element.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub action: Action,
    /// Id of the element that produced this result.
    pub element_id: String,
    /// Key transport algorithm, for encryption results.
    pub transport_algorithm: Option<String>,
    /// Certificates involved (DER), for asymmetric results.
    pub certificates: Vec<Vec<u8>>,
    /// References decrypted with this result's session key.
    pub decrypted_references: Vec<DecryptedReference>,
}

impl ProcessingResult {
    pub fn new(action: Action, element_id: impl Into<String>) -> Self {
        Self {
            action,
            element_id: element_id.into(),
            transport_algorithm: None,
            certificates: Vec::new(),
            decrypted_references: Vec::new(),
        }
    }
}

/// A buffered header-child event window kept for later re-traversal
/// (in-header signature reference verification).
#[derive(Debug, Clone)]
pub struct StoredWindow {
    pub events: Vec<XmlEvent>,
    pub inherited_ns: Vec<NsBinding>,
}

/// Session key state for data references unlocked by an EncryptedKey.
#[derive(Debug)]
pub enum SessionKeyState {
    /// Key material is available.
    Key(Vec<u8>),
    /// Asymmetric unwrap failed; a random key must be generated from the
    /// first referenced EncryptedData's algorithm when it is reached.
    RandomPending,
}

/// Pending decryption work registered by an EncryptedKey handler.
#[derive(Debug)]
pub struct PendingKey {
    pub encrypted_key_id: String,
    pub state: SessionKeyState,
}

/// Process-scoped table of results, token elements and pending work.
/// Exclusive to one message; dropped when processing completes.
#[derive(Default)]
pub struct DocumentRegistry {
    results: HashMap<String, ProcessingResult>,
    /// Ids of processed token elements, in document order.
    token_elements: Vec<String>,
    /// DER certificates registered by BinarySecurityToken handlers.
    certificates: HashMap<String, Vec<u8>>,
    /// Buffered header-child windows by element id.
    element_windows: HashMap<String, StoredWindow>,
    /// Session keys keyed by pending-key index.
    pending_keys: Vec<PendingKey>,
    /// DataReference id → index into `pending_keys`.
    data_references: HashMap<String, usize>,
    /// Element ids covered by a verified signature.
    signed_ids: HashSet<String>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert: an existing result for the id wins and is
    /// returned unchanged, so reprocessing a duplicated id is a no-op.
    pub fn insert_or_get(
        &mut self,
        id: &str,
        result: ProcessingResult,
    ) -> &ProcessingResult {
        self.results.entry(id.to_owned()).or_insert(result)
    }

    pub fn result(&self, id: &str) -> Option<&ProcessingResult> {
        self.results.get(id)
    }

    pub fn result_mut(&mut self, id: &str) -> Option<&mut ProcessingResult> {
        self.results.get_mut(id)
    }

    /// True when an id already carries a result with the given action.
    pub fn has_result_with_action(&self, id: &str, action: Action) -> bool {
        self.results.get(id).is_some_and(|r| r.action == action)
    }

    pub fn count_by_action(&self, action: Action) -> usize {
        self.results.values().filter(|r| r.action == action).count()
    }

    pub fn add_token_element(&mut self, id: impl Into<String>) {
        self.token_elements.push(id.into());
    }

    pub fn token_elements(&self) -> &[String] {
        &self.token_elements
    }

    pub fn register_certificate(&mut self, id: impl Into<String>, der: Vec<u8>) {
        self.certificates.insert(id.into(), der);
    }

    pub fn store_window(&mut self, id: impl Into<String>, window: StoredWindow) {
        self.element_windows.insert(id.into(), window);
    }

    pub fn window(&self, id: &str) -> Option<&StoredWindow> {
        self.element_windows.get(id)
    }

    /// Register a session key (or the deferred random-key marker) for a
    /// set of DataReference ids.
    pub fn register_pending_key(
        &mut self,
        encrypted_key_id: impl Into<String>,
        state: SessionKeyState,
        data_reference_ids: &[String],
    ) {
        let index = self.pending_keys.len();
        self.pending_keys.push(PendingKey {
            encrypted_key_id: encrypted_key_id.into(),
            state,
        });
        for id in data_reference_ids {
            self.data_references.insert(id.clone(), index);
        }
    }

    /// The pending key for a DataReference id, if any.
    pub fn pending_key_for(&mut self, data_ref_id: &str) -> Option<&mut PendingKey> {
        let index = *self.data_references.get(data_ref_id)?;
        self.pending_keys.get_mut(index)
    }

    /// Remove a DataReference once decrypted; returns how many remain.
    pub fn complete_data_reference(&mut self, data_ref_id: &str) -> usize {
        self.data_references.remove(data_ref_id);
        self.data_references.len()
    }

    pub fn pending_data_references(&self) -> Vec<String> {
        self.data_references.keys().cloned().collect()
    }

    pub fn record_signed_id(&mut self, id: impl Into<String>) {
        self.signed_ids.insert(id.into());
    }

    pub fn is_signed(&self, id: &str) -> bool {
        self.signed_ids.contains(id)
    }
}

impl TokenLookup for DocumentRegistry {
    fn certificate_by_id(&self, id: &str) -> Option<Vec<u8>> {
        self.certificates.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_or_get_is_idempotent() {
        let mut reg = DocumentRegistry::new();
        let first = ProcessingResult::new(Action::Encryption, "ek-1");
        reg.insert_or_get("ek-1", first);

        // A second insert under the same id must not replace the result.
        let mut second = ProcessingResult::new(Action::SignatureCheck, "ek-1");
        second.transport_algorithm = Some("urn:other".into());
        let stored = reg.insert_or_get("ek-1", second);
        assert_eq!(stored.action, Action::Encryption);
        assert!(stored.transport_algorithm.is_none());
    }

    #[test]
    fn test_count_by_action() {
        let mut reg = DocumentRegistry::new();
        reg.insert_or_get("ts-1", ProcessingResult::new(Action::Timestamp, "ts-1"));
        reg.insert_or_get("sig-1", ProcessingResult::new(Action::SignatureCheck, "sig-1"));
        assert_eq!(reg.count_by_action(Action::Timestamp), 1);
        assert_eq!(reg.count_by_action(Action::Encryption), 0);
    }

    #[test]
    fn test_pending_key_lifecycle() {
        let mut reg = DocumentRegistry::new();
        reg.register_pending_key(
            "ek-1",
            SessionKeyState::Key(vec![1; 16]),
            &["d-1".into(), "d-2".into()],
        );
        assert!(reg.pending_key_for("d-1").is_some());
        assert!(reg.pending_key_for("other").is_none());
        assert_eq!(reg.complete_data_reference("d-1"), 1);
        assert_eq!(reg.complete_data_reference("d-2"), 0);
    }

    #[test]
    fn test_certificate_lookup() {
        let mut reg = DocumentRegistry::new();
        reg.register_certificate("bst-1", vec![0x30, 0x82]);
        assert_eq!(reg.certificate_by_id("bst-1"), Some(vec![0x30, 0x82]));
        assert_eq!(reg.certificate_by_id("bst-2"), None);
    }

    #[test]
    fn test_signed_id_tracking() {
        let mut reg = DocumentRegistry::new();
        reg.record_signed_id("body-1");
        assert!(reg.is_signed("body-1"));
        assert!(!reg.is_signed("body-2"));
    }
}
