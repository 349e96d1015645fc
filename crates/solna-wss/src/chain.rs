#![forbid(unsafe_code)]

//! The pull-mode input processor chain.
//!
//! The consumer drives processing by asking for the next event. Internally
//! an ordered list of processors sees every event in turn: each processor
//! forwards it unchanged, transforms it, or withholds it while buffering,
//! and is spliced out of the chain once done. Handlers installed for the
//! security header register their results in the document registry; any
//! handler failure aborts the pull chain for the whole message.

use crate::binary_token;
use crate::encrypted_key;
use crate::policy::ProcessorConfig;
use crate::registry::{DocumentRegistry, StoredWindow};
use crate::signature;
use crate::timestamp;
use solna_core::{ns, Error, Result};
use solna_events::event::{NsBinding, QName, XmlEvent};
use solna_events::queue::EventQueue;
use solna_keys::{KeyProvider, TrustStore};
use std::collections::BTreeMap;
use std::collections::VecDeque;

/// One stage of the chain.
pub trait InputProcessor {
    fn name(&self) -> &'static str;

    /// Process one event, returning the events to forward downstream
    /// (none while buffering, several when replaying a buffered window).
    fn process(
        &mut self,
        event: XmlEvent,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<Vec<XmlEvent>>;

    /// True once the processor can be spliced out of the chain.
    fn is_done(&self) -> bool {
        false
    }

    /// Called when the source stream ends; a processor still waiting for
    /// input here reports the unresolved work as an error.
    fn finish(&mut self, ctx: &mut ProcessingContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Shared state handed to processors and handlers.
pub struct ProcessingContext<'a> {
    pub registry: &'a mut DocumentRegistry,
    pub config: &'a ProcessorConfig,
    pub provider: &'a dyn KeyProvider,
    pub trust_store: &'a TrustStore,
    /// Namespace bindings of the elements open around the subtree being
    /// handled, one level per open element. Processors installed from a
    /// handler seed their own tracking with this stack so that later
    /// end-element events pop the matching levels.
    pub ns_context: Vec<Vec<NsBinding>>,
    active_processor_names: Vec<&'static str>,
    new_processors: Vec<Box<dyn InputProcessor>>,
}

impl<'a> ProcessingContext<'a> {
    /// Queue a processor for installation at the end of the chain.
    pub fn install_processor(&mut self, processor: Box<dyn InputProcessor>) {
        self.new_processors.push(processor);
    }

    /// Install a processor unless one with the same name is already part
    /// of the chain.
    pub fn install_unique_processor(&mut self, processor: Box<dyn InputProcessor>) {
        let name = processor.name();
        if self.active_processor_names.contains(&name)
            || self.new_processors.iter().any(|p| p.name() == name)
        {
            return;
        }
        self.new_processors.push(processor);
    }
}

/// The chain itself, wrapping an event source.
pub struct InputProcessorChain<'a, I>
where
    I: Iterator<Item = Result<XmlEvent>>,
{
    source: I,
    processors: Vec<Box<dyn InputProcessor>>,
    registry: DocumentRegistry,
    config: ProcessorConfig,
    provider: &'a dyn KeyProvider,
    trust_store: &'a TrustStore,
    output: VecDeque<XmlEvent>,
    finished: bool,
    aborted: bool,
}

impl<'a, I> InputProcessorChain<'a, I>
where
    I: Iterator<Item = Result<XmlEvent>>,
{
    pub fn new(
        source: I,
        config: ProcessorConfig,
        provider: &'a dyn KeyProvider,
        trust_store: &'a TrustStore,
    ) -> Self {
        Self {
            source,
            processors: vec![Box::new(SecurityHeaderProcessor::new())],
            registry: DocumentRegistry::new(),
            config,
            provider,
            trust_store,
            output: VecDeque::new(),
            finished: false,
            aborted: false,
        }
    }

    /// Pull the next event of the transformed stream. Returns `None` at
    /// end of stream. After a failure every further call fails: no
    /// partially-verified content is handed out past the failure point.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if self.aborted {
            return Err(Error::FailedCheck(
                "stream processing aborted by an earlier failure".into(),
            ));
        }
        loop {
            if let Some(event) = self.output.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }
            match self.source.next() {
                Some(event) => {
                    let event = match event {
                        Ok(event) => event,
                        Err(e) => {
                            self.aborted = true;
                            return Err(e);
                        }
                    };
                    if let Err(e) = self.pump(event) {
                        self.aborted = true;
                        return Err(e);
                    }
                }
                None => {
                    self.finished = true;
                    if let Err(e) = self.finish_processors() {
                        self.aborted = true;
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Drain the whole stream, collecting the transformed events.
    pub fn run_to_end(&mut self) -> Result<Vec<XmlEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    /// Consume the chain, handing back the registry of results.
    pub fn into_registry(self) -> DocumentRegistry {
        self.registry
    }

    fn pump(&mut self, event: XmlEvent) -> Result<()> {
        let mut processors = std::mem::take(&mut self.processors);
        let mut ctx = ProcessingContext {
            registry: &mut self.registry,
            config: &self.config,
            provider: self.provider,
            trust_store: self.trust_store,
            ns_context: Vec::new(),
            active_processor_names: processors.iter().map(|p| p.name()).collect(),
            new_processors: Vec::new(),
        };

        let mut batch = vec![event];
        let mut outcome = Ok(());
        'stages: for processor in processors.iter_mut() {
            let mut next = Vec::new();
            for event in batch.drain(..) {
                match processor.process(event, &mut ctx) {
                    Ok(events) => next.extend(events),
                    Err(e) => {
                        outcome = Err(e);
                        break 'stages;
                    }
                }
            }
            batch = next;
            if batch.is_empty() {
                break;
            }
        }

        let new_processors = std::mem::take(&mut ctx.new_processors);
        drop(ctx);
        processors.extend(new_processors);
        processors.retain(|p| !p.is_done());
        self.processors = processors;

        outcome?;
        self.output.extend(batch);
        Ok(())
    }

    fn finish_processors(&mut self) -> Result<()> {
        let mut processors = std::mem::take(&mut self.processors);
        let mut ctx = ProcessingContext {
            registry: &mut self.registry,
            config: &self.config,
            provider: self.provider,
            trust_store: self.trust_store,
            ns_context: Vec::new(),
            active_processor_names: processors.iter().map(|p| p.name()).collect(),
            new_processors: Vec::new(),
        };
        let mut outcome = Ok(());
        for processor in processors.iter_mut() {
            if let Err(e) = processor.finish(&mut ctx) {
                outcome = Err(e);
                break;
            }
        }
        drop(ctx);
        self.processors = processors;
        outcome
    }
}

/// Resolve a namespace binding stack into the flat in-scope list.
pub(crate) fn flatten_namespaces(stack: &[Vec<NsBinding>]) -> Vec<NsBinding> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for level in stack {
        for binding in level {
            if binding.uri.is_empty() {
                map.remove(&binding.prefix);
            } else {
                map.insert(binding.prefix.clone(), binding.uri.clone());
            }
        }
    }
    map.into_iter()
        .map(|(prefix, uri)| NsBinding { prefix, uri })
        .collect()
}

// ── Security header dispatch ─────────────────────────────────────────

/// The handlers a security-header child can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Timestamp,
    BinarySecurityToken,
    EncryptedKey,
    Signature,
}

/// Dispatch table keyed by the child's qualified name.
fn handler_for(name: &QName) -> Option<HandlerKind> {
    match (name.ns_uri.as_deref(), name.local.as_str()) {
        (Some(ns::WSU), ns::node::TIMESTAMP) => Some(HandlerKind::Timestamp),
        (Some(ns::WSSE), ns::node::BINARY_SECURITY_TOKEN) => {
            Some(HandlerKind::BinarySecurityToken)
        }
        (Some(ns::ENC), ns::node::ENCRYPTED_KEY) => Some(HandlerKind::EncryptedKey),
        (Some(ns::DSIG), ns::node::SIGNATURE) => Some(HandlerKind::Signature),
        _ => None,
    }
}

enum HeaderState {
    BeforeHeader,
    InHeader,
    Done,
}

struct Buffering {
    kind: HandlerKind,
    queue: EventQueue,
    depth: usize,
}

/// Locates the `wsse:Security` header and dispatches its children.
///
/// One child subtree is buffered at a time; everything outside the header
/// passes through untouched, so body content is never materialized.
pub struct SecurityHeaderProcessor {
    state: HeaderState,
    ns_stack: Vec<Vec<NsBinding>>,
    open_unknown: usize,
    buffering: Option<Buffering>,
}

impl SecurityHeaderProcessor {
    pub fn new() -> Self {
        Self {
            state: HeaderState::BeforeHeader,
            ns_stack: Vec::new(),
            open_unknown: 0,
            buffering: None,
        }
    }

    fn complete_subtree(
        &mut self,
        buffering: Buffering,
        ctx: &mut ProcessingContext<'_>,
    ) -> Result<Vec<XmlEvent>> {
        let Buffering { kind, queue, .. } = buffering;
        tracing::debug!(?kind, "dispatching security header child");
        ctx.ns_context = self.ns_stack.clone();
        match kind {
            HandlerKind::Timestamp => timestamp::handle(queue.events(), ctx)?,
            HandlerKind::BinarySecurityToken => binary_token::handle(queue.events(), ctx)?,
            HandlerKind::EncryptedKey => encrypted_key::handle(&queue, ctx)?,
            HandlerKind::Signature => signature::handle(&queue, ctx)?,
        }

        // Keep the verified window for later in-header reference checks.
        if let Some(id) = crate::descriptor::element_id(&queue.events()[0]) {
            ctx.registry.store_window(
                id,
                StoredWindow {
                    events: queue.events().to_vec(),
                    inherited_ns: queue.inherited_namespaces().to_vec(),
                },
            );
        }

        // The header stays structurally intact: forward the subtree
        // unchanged now that its handler succeeded.
        Ok(queue.events().to_vec())
    }
}

impl Default for SecurityHeaderProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl InputProcessor for SecurityHeaderProcessor {
    fn name(&self) -> &'static str {
        "security-header"
    }

    fn is_done(&self) -> bool {
        matches!(self.state, HeaderState::Done)
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
                return self.complete_subtree(buffering, ctx);
            }
            return Ok(Vec::new());
        }

        match self.state {
            HeaderState::BeforeHeader => {
                match &event {
                    XmlEvent::StartElement {
                        name, namespaces, ..
                    } => {
                        self.ns_stack.push(namespaces.clone());
                        if name.matches(ns::WSSE, ns::node::SECURITY) {
                            tracing::debug!("entering security header");
                            self.state = HeaderState::InHeader;
                        }
                    }
                    XmlEvent::EndElement { .. } => {
                        self.ns_stack.pop();
                    }
                    XmlEvent::Characters { .. } => {}
                }
                Ok(vec![event])
            }
            HeaderState::InHeader => match &event {
                XmlEvent::StartElement {
                    name, namespaces, ..
                } => {
                    if self.open_unknown == 0 {
                        if let Some(kind) = handler_for(name) {
                            let mut queue =
                                EventQueue::with_capacity(ctx.config.event_queue_capacity);
                            queue.set_inherited_namespaces(flatten_namespaces(&self.ns_stack));
                            queue.push(event)?;
                            self.buffering = Some(Buffering {
                                kind,
                                queue,
                                depth: 1,
                            });
                            return Ok(Vec::new());
                        }
                        if ctx.config.reject_unknown_header_children {
                            return Err(Error::PolicyViolation(format!(
                                "security header child not understood: {}",
                                name.qualified()
                            )));
                        }
                        tracing::debug!(child = %name.qualified(), "skipping unknown header child");
                    }
                    self.ns_stack.push(namespaces.clone());
                    self.open_unknown += 1;
                    Ok(vec![event])
                }
                XmlEvent::EndElement { .. } => {
                    if self.open_unknown > 0 {
                        self.open_unknown -= 1;
                        self.ns_stack.pop();
                    } else {
                        // The security header itself closed.
                        self.state = HeaderState::Done;
                    }
                    Ok(vec![event])
                }
                XmlEvent::Characters { .. } => Ok(vec![event]),
            },
            HeaderState::Done => Ok(vec![event]),
        }
    }

    fn finish(&mut self, _ctx: &mut ProcessingContext<'_>) -> Result<()> {
        if self.buffering.is_some() {
            return Err(Error::Structural(
                "stream ended inside a security header subtree".into(),
            ));
        }
        Ok(())
    }
}
