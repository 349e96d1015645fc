#![forbid(unsafe_code)]

//! Streaming decryption of referenced `EncryptedData` subtrees.
//!
//! Installed into the chain by the EncryptedKey handler. When a referenced
//! `EncryptedData` element opens, its subtree is buffered (bounded),
//! decrypted with the registered session key, and replaced in the output
//! stream by the plaintext events.

use crate::chain::{flatten_namespaces, InputProcessor, ProcessingContext};
use crate::descriptor::{self, bind_encrypted_data};
use crate::policy;
use crate::registry::{DecryptedReference, SessionKeyState};
use solna_core::{ns, Error, Result};
use solna_crypto::cipher;
use solna_crypto::random::random_key_for_algorithm;
use solna_events::event::{NsBinding, XmlEvent};
use solna_events::queue::EventQueue;
use solna_events::reader::parse_fragment_events;

struct DataBuffering {
    queue: EventQueue,
    depth: usize,
    data_ref_id: String,
}

/// Replaces referenced `EncryptedData` subtrees with decrypted plaintext
/// events; everything else passes through unchanged.
pub struct DecryptProcessor {
    ns_stack: Vec<Vec<NsBinding>>,
    buffering: Option<DataBuffering>,
    done: bool,
}

impl DecryptProcessor {
    /// `ns_context` is the stack of namespace bindings of the elements
    /// open at installation time, so that end-element events seen later
    /// pop the matching levels.
    pub fn new(ns_context: Vec<Vec<NsBinding>>) -> Self {
        Self {
            ns_stack: ns_context,
            buffering: None,
            done: false,
        }
    }

    fn decrypt_window(
        &self,
        buffering: DataBuffering,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<Vec<XmlEvent>> {
        let DataBuffering {
            queue, data_ref_id, ..
        } = buffering;
        let events = queue.events();
        let descriptor = bind_encrypted_data(events)?;
        tracing::debug!(id = %data_ref_id, algorithm = %descriptor.algorithm, "decrypting data reference");

        // The algorithm comes from this element's own EncryptionMethod,
        // never from the key transport algorithm.
        if !policy::is_permitted_data_encryption_algorithm(&descriptor.algorithm) {
            ctx.config.enforcement.handle(&format!(
                "encryption algorithm {} is not permitted for EncryptedData",
                descriptor.algorithm
            ))?;
        }
        ctx.config
            .algorithm_suite
            .check_encryption_algorithm(&descriptor.algorithm)?;

        if ctx.config.require_signed_encrypted_parts && !ctx.registry.is_signed(&data_ref_id) {
            return Err(Error::PolicyViolation(format!(
                "encrypted element #{data_ref_id} is not covered by a verified signature"
            )));
        }

        let key_id;
        let session_key;
        {
            let pending = ctx.registry.pending_key_for(&data_ref_id).ok_or_else(|| {
                Error::Structural(format!(
                    "no session key registered for data reference #{data_ref_id}"
                ))
            })?;
            key_id = pending.encrypted_key_id.clone();
            session_key = match &pending.state {
                SessionKeyState::Key(key) => key.clone(),
                SessionKeyState::RandomPending => {
                    // The unwrap failed earlier; substitute a random key
                    // of the length this EncryptedData's algorithm
                    // implies, exactly as on the success path. The
                    // decryption below then fails uniformly regardless
                    // of why the unwrap failed.
                    let key = random_key_for_algorithm(&descriptor.algorithm);
                    pending.state = SessionKeyState::Key(key.clone());
                    key
                }
            };
        }

        let cipher = cipher::from_uri(&descriptor.algorithm)?;
        // A wrapped key may be longer than the data algorithm requires;
        // use its leading bytes.
        let effective_key = if session_key.len() > cipher.key_size() {
            &session_key[..cipher.key_size()]
        } else {
            &session_key[..]
        };
        ctx.config
            .algorithm_suite
            .check_symmetric_key_length(effective_key.len() * 8)?;

        let plaintext = cipher
            .decrypt(effective_key, &descriptor.cipher_value)
            .map_err(|_| {
                Error::FailedCheck(format!(
                    "decryption integrity check failed for #{data_ref_id}"
                ))
            })?;
        let plaintext = String::from_utf8(plaintext).map_err(|_| {
            Error::FailedCheck(format!(
                "decryption integrity check failed for #{data_ref_id}"
            ))
        })?;

        let plaintext_events =
            parse_fragment_events(&plaintext, queue.inherited_namespaces()).map_err(|_| {
                Error::FailedCheck(format!(
                    "decrypted content for #{data_ref_id} is not well-formed"
                ))
            })?;

        ctx.registry.complete_data_reference(&data_ref_id);
        if let Some(result) = ctx.registry.result_mut(&key_id) {
            result.decrypted_references.push(DecryptedReference {
                id: data_ref_id,
                algorithm: descriptor.algorithm,
                plaintext_len: plaintext.len(),
            });
        }
        Ok(plaintext_events)
    }
}

impl InputProcessor for DecryptProcessor {
    fn name(&self) -> &'static str {
        "decrypt"
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn process(
        &mut self,
        event: XmlEvent,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<Vec<XmlEvent>> {
        if let Some(buffering) = &mut self.buffering {
            match &event {
                XmlEvent::StartElement { .. } => buffering.depth += 1,
                XmlEvent::EndElement { .. } => buffering.depth -= 1,
                XmlEvent::Characters { .. } => {}
            }
            buffering.queue.push(event)?;
            if buffering.depth == 0 {
                let buffering = self.buffering.take().expect("buffering active");
                let plaintext = self.decrypt_window(buffering, ctx)?;
                self.done = ctx.registry.pending_data_references().is_empty();
                return Ok(plaintext);
            }
            return Ok(Vec::new());
        }

        match &event {
            XmlEvent::StartElement { namespaces, .. } => {
                if event.is_start_of(ns::ENC, ns::node::ENCRYPTED_DATA) {
                    if let Some(id) = descriptor::element_id(&event) {
                        if ctx.registry.pending_key_for(&id).is_some() {
                            let mut queue =
                                EventQueue::with_capacity(ctx.config.event_queue_capacity);
                            queue.set_inherited_namespaces(flatten_namespaces(&self.ns_stack));
                            queue.push(event)?;
                            self.buffering = Some(DataBuffering {
                                queue,
                                depth: 1,
                                data_ref_id: id,
                            });
                            return Ok(Vec::new());
                        }
                    }
                }
                self.ns_stack.push(namespaces.clone());
            }
            XmlEvent::EndElement { .. } => {
                self.ns_stack.pop();
            }
            XmlEvent::Characters { .. } => {}
        }
        Ok(vec![event])
    }

    fn finish(&mut self, ctx: &mut ProcessingContext<'_>) -> Result<()> {
        let pending = ctx.registry.pending_data_references();
        if let Some(id) = pending.first() {
            return Err(Error::Structural(format!(
                "DataReference did not resolve to any EncryptedData element: #{id}"
            )));
        }
        Ok(())
    }
}
