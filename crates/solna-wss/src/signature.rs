#![forbid(unsafe_code)]

//! Signature verification over the buffered event window.
//!
//! The handler re-traverses the already-buffered window: it walks
//! backward from the position where `</Signature>` was seen to locate the
//! start of `SignedInfo`, then replays those events forward through an
//! exclusive canonicalizer feeding the signature engine. The backward
//! step exists because `SignedInfo`'s canonical form must be computed
//! over exactly its own subtree, and that subtree is only complete once
//! the closing tag is in the buffer.

use crate::chain::{InputProcessor, ProcessingContext};
use crate::descriptor::{self, bind_signature, ReferenceDescriptor, SignatureDescriptor};
use crate::registry::{Action, ProcessingResult};
use solna_c14n::{canonicalize_events, C14nMode, ExcC14n};
use solna_core::{ns, Error, Result};
use solna_crypto::digest;
use solna_crypto::sign::{self, SignatureAlgorithm, VerifyKey};
use solna_events::event::{NsBinding, XmlEvent};
use solna_events::queue::EventQueue;
use solna_keys::resolver::TokenResolver;

/// Handle a buffered `ds:Signature` subtree.
pub fn handle(queue: &EventQueue, ctx: &mut ProcessingContext<'_>) -> Result<()> {
    let events = queue.events();
    let descriptor = bind_signature(events)?;
    let signature_id = descriptor
        .id
        .clone()
        .unwrap_or_else(|| "signature".into());
    tracing::debug!(id = %signature_id, "verifying signature");

    // Locate SignedInfo by scanning backward from </Signature>.
    let signed_info_start = queue
        .rfind_before(events.len(), |e| {
            e.is_start_of(ns::DSIG, ns::node::SIGNED_INFO)
        })
        .ok_or_else(|| Error::MissingElement(ns::node::SIGNED_INFO.into()))?;
    let signed_info_end = descriptor::subtree_end(events, signed_info_start)?;

    // Namespace bindings in scope at SignedInfo: the window's inherited
    // bindings plus declarations on its open ancestors inside the window.
    let inherited = inherited_at(queue, signed_info_start);

    let mut verifier = SignatureVerifier::new(&descriptor, &inherited, ctx)?;
    for event in &events[signed_info_start..=signed_info_end] {
        verifier.process_event(event)?;
    }
    verifier.do_final()?;

    // Verify each reference: in-header targets against their stored
    // windows now, body targets on the fly as the stream continues.
    let mut pending = Vec::new();
    for reference in &descriptor.signed_info.references {
        let target = reference.target_id().ok_or_else(|| {
            Error::InvalidUri(format!(
                "only same-document references are supported: {}",
                reference.uri
            ))
        })?;
        check_transforms(reference)?;
        ctx.config
            .algorithm_suite
            .check_digest_algorithm(&reference.digest_method)?;

        if let Some(window) = ctx.registry.window(target) {
            let canonical = canonicalize_events(
                &window.events,
                &window.inherited_ns,
                &reference.inclusive_prefixes,
            )?;
            let computed = digest::digest(&reference.digest_method, &canonical)?;
            if computed != reference.digest_value {
                return Err(Error::FailedCheck(format!(
                    "digest mismatch for reference #{target}"
                )));
            }
        } else {
            pending.push(PendingReference {
                id: target.to_owned(),
                digest_method: reference.digest_method.clone(),
                digest_value: reference.digest_value.clone(),
                inclusive_prefixes: reference.inclusive_prefixes.clone(),
            });
        }
        // The signature covers the target either way; record it for the
        // signed-encrypted-parts cross-check.
        ctx.registry.record_signed_id(target);
    }

    if !pending.is_empty() {
        let ns_context = ctx.ns_context.clone();
        ctx.install_processor(Box::new(ReferenceVerifyProcessor::new(pending, ns_context)));
    }

    let mut result = ProcessingResult::new(Action::SignatureCheck, signature_id.clone());
    result.certificates = verifier.certificates;
    ctx.registry.insert_or_get(&signature_id, result);
    ctx.registry.add_token_element(signature_id);
    Ok(())
}

/// Only canonicalization transforms are supported.
fn check_transforms(reference: &ReferenceDescriptor) -> Result<()> {
    for transform in &reference.transforms {
        if C14nMode::from_uri(transform).is_none() {
            return Err(Error::UnsupportedAlgorithm(format!(
                "transform: {transform}"
            )));
        }
    }
    Ok(())
}

/// Bindings in scope at event index `at` within the buffered window.
fn inherited_at(queue: &EventQueue, at: usize) -> Vec<NsBinding> {
    let mut stack: Vec<Vec<NsBinding>> = vec![queue.inherited_namespaces().to_vec()];
    for event in &queue.events()[..at] {
        match event {
            XmlEvent::StartElement { namespaces, .. } => stack.push(namespaces.clone()),
            XmlEvent::EndElement { .. } => {
                stack.pop();
            }
            XmlEvent::Characters { .. } => {}
        }
    }
    crate::chain::flatten_namespaces(&stack)
}

// ── The verifier state machine ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifierState {
    Init,
    InSignedInfo,
    Done,
}

/// Canonicalizes the SignedInfo replay into the signature engine and
/// checks the final signature value.
struct SignatureVerifier {
    state: VerifierState,
    depth: usize,
    canonicalizer: Option<ExcC14n<Vec<u8>>>,
    algorithm: Box<dyn SignatureAlgorithm>,
    key: VerifyKey,
    signature_value: Vec<u8>,
    certificates: Vec<Vec<u8>>,
}

impl SignatureVerifier {
    fn new(
        descriptor: &SignatureDescriptor,
        inherited: &[NsBinding],
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<Self> {
        let signed_info = &descriptor.signed_info;

        ctx.config
            .algorithm_suite
            .check_signature_algorithm(&signed_info.signature_method)?;
        if C14nMode::from_uri(&signed_info.c14n_method).is_none() {
            return Err(Error::UnsupportedAlgorithm(format!(
                "canonicalization: {}",
                signed_info.c14n_method
            )));
        }

        // Resolve and verify the token before any signature math.
        let mut token = {
            let resolver = TokenResolver::new(ctx.provider, &*ctx.registry);
            resolver.resolve(&descriptor.key_info)?
        };
        token.verify(ctx.trust_store)?;
        if token.is_asymmetric() {
            ctx.config
                .algorithm_suite
                .check_asymmetric_key_length(token.public_key_bits()?)?;
        }
        let key = token.verify_key()?;
        let certificates = token
            .leaf_certificate()
            .map(|c| vec![c.to_vec()])
            .unwrap_or_default();

        let algorithm = sign::from_uri(&signed_info.signature_method)?;
        let mut canonicalizer = ExcC14n::new(Vec::new(), &signed_info.inclusive_prefixes);
        canonicalizer.set_inherited_namespaces(inherited);

        Ok(Self {
            state: VerifierState::Init,
            depth: 0,
            canonicalizer: Some(canonicalizer),
            algorithm,
            key,
            signature_value: descriptor.signature_value.clone(),
            certificates,
        })
    }

    fn process_event(&mut self, event: &XmlEvent) -> Result<()> {
        match self.state {
            VerifierState::Init => {
                if !event.is_start_of(ns::DSIG, ns::node::SIGNED_INFO) {
                    return Err(Error::Structural(
                        "signature replay must start at SignedInfo".into(),
                    ));
                }
                self.state = VerifierState::InSignedInfo;
                self.depth = 1;
            }
            VerifierState::InSignedInfo => match event {
                XmlEvent::StartElement { .. } => self.depth += 1,
                XmlEvent::EndElement { .. } => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.state = VerifierState::Done;
                    }
                }
                XmlEvent::Characters { .. } => {}
            },
            VerifierState::Done => {
                return Err(Error::Structural(
                    "events past the end of SignedInfo".into(),
                ));
            }
        }
        self.canonicalizer
            .as_mut()
            .expect("canonicalizer present until do_final")
            .process_event(event)?;
        Ok(())
    }

    fn do_final(&mut self) -> Result<()> {
        if self.state != VerifierState::Done {
            return Err(Error::Structural("SignedInfo subtree incomplete".into()));
        }
        let canonical = self
            .canonicalizer
            .take()
            .expect("canonicalizer present until do_final")
            .finish()?;
        let valid = self
            .algorithm
            .verify(&self.key, &canonical, &self.signature_value)?;
        if !valid {
            return Err(Error::FailedCheck(
                "signature value verification failed".into(),
            ));
        }
        Ok(())
    }
}

// ── Streaming reference verification ─────────────────────────────────

/// A reference whose target was not available in the buffered header.
pub struct PendingReference {
    pub id: String,
    pub digest_method: String,
    pub digest_value: Vec<u8>,
    pub inclusive_prefixes: Vec<String>,
}

struct ActiveReference {
    index: usize,
    canonicalizer: ExcC14n<Vec<u8>>,
    depth: usize,
}

/// Verifies signature references against elements still to come in the
/// stream: when a referenced element opens, its subtree is canonicalized
/// on the fly and the digest compared at the closing tag. Events pass
/// through unchanged.
pub struct ReferenceVerifyProcessor {
    pending: Vec<PendingReference>,
    ns_stack: Vec<Vec<NsBinding>>,
    active: Option<ActiveReference>,
}

impl ReferenceVerifyProcessor {
    /// `ns_context` is the stack of namespace bindings of the elements
    /// open at installation time, so that later end-element events pop
    /// the matching levels.
    pub fn new(pending: Vec<PendingReference>, ns_context: Vec<Vec<NsBinding>>) -> Self {
        Self {
            pending,
            ns_stack: ns_context,
            active: None,
        }
    }
}

impl InputProcessor for ReferenceVerifyProcessor {
    fn name(&self) -> &'static str {
        "signature-reference-verify"
    }

    fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    fn process(
        &mut self,
        event: XmlEvent,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<Vec<XmlEvent>> {
        if let Some(active) = &mut self.active {
            match &event {
                XmlEvent::StartElement { .. } => active.depth += 1,
                XmlEvent::EndElement { .. } => active.depth -= 1,
                XmlEvent::Characters { .. } => {}
            }
            active.canonicalizer.process_event(&event)?;
            if active.depth == 0 {
                let active = self.active.take().expect("active reference");
                let reference = self.pending.remove(active.index);
                let canonical = active.canonicalizer.finish()?;
                let computed = digest::digest(&reference.digest_method, &canonical)?;
                if computed != reference.digest_value {
                    return Err(Error::FailedCheck(format!(
                        "digest mismatch for reference #{}",
                        reference.id
                    )));
                }
                tracing::debug!(id = %reference.id, "signature reference verified");
                ctx.registry.record_signed_id(&reference.id);
            }
            return Ok(vec![event]);
        }

        match &event {
            XmlEvent::StartElement { namespaces, .. } => {
                if let Some(id) = descriptor::element_id(&event) {
                    if let Some(index) = self.pending.iter().position(|r| r.id == id) {
                        let mut canonicalizer =
                            ExcC14n::new(Vec::new(), &self.pending[index].inclusive_prefixes);
                        canonicalizer.set_inherited_namespaces(&crate::chain::flatten_namespaces(
                            &self.ns_stack,
                        ));
                        canonicalizer.process_event(&event)?;
                        self.active = Some(ActiveReference {
                            index,
                            canonicalizer,
                            depth: 1,
                        });
                        return Ok(vec![event]);
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

    fn finish(&mut self, _ctx: &mut ProcessingContext<'_>) -> Result<()> {
        if let Some(reference) = self.pending.first() {
            return Err(Error::Structural(format!(
                "signature reference did not resolve to any element: #{}",
                reference.id
            )));
        }
        Ok(())
    }
}
