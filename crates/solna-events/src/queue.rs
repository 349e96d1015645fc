#![forbid(unsafe_code)]

//! Bounded event buffer for the security-header region.

use crate::event::{NsBinding, XmlEvent};
use solna_core::{Error, Result};

/// Default capacity bound for a buffered header-child subtree.
///
/// The buffer must be bounded by the security header's size, never the
/// whole message; a header subtree exceeding this is treated as hostile.
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// An ordered, size-bounded buffer of XML events with a cursor marking
/// the start of the header element currently being processed.
///
/// Supports forward replay and backward scanning over the buffered
/// window, which is how `SignedInfo` is isolated for canonicalization
/// after its closing tag has been seen.
#[derive(Debug)]
pub struct EventQueue {
    events: Vec<XmlEvent>,
    cursor: usize,
    /// Namespace bindings in scope at the start of the buffered window,
    /// inherited from ancestor elements outside the window.
    inherited_ns: Vec<NsBinding>,
    capacity: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            cursor: 0,
            inherited_ns: Vec::new(),
            capacity,
        }
    }

    /// Record the namespace bindings inherited from ancestors of the
    /// buffered subtree.
    pub fn set_inherited_namespaces(&mut self, bindings: Vec<NsBinding>) {
        self.inherited_ns = bindings;
    }

    pub fn inherited_namespaces(&self) -> &[NsBinding] {
        &self.inherited_ns
    }

    /// Append an event. Fails when the bounded window would overflow.
    pub fn push(&mut self, event: XmlEvent) -> Result<()> {
        if self.events.len() >= self.capacity {
            return Err(Error::Structural(format!(
                "buffered subtree exceeds the event window limit of {}",
                self.capacity
            )));
        }
        self.events.push(event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The full buffered window in document order.
    pub fn events(&self) -> &[XmlEvent] {
        &self.events
    }

    /// Scan backward from `from` (exclusive) for the first event matching
    /// the predicate, returning its index.
    pub fn rfind_before<F>(&self, from: usize, pred: F) -> Option<usize>
    where
        F: Fn(&XmlEvent) -> bool,
    {
        self.events[..from.min(self.events.len())]
            .iter()
            .rposition(pred)
    }

    /// Drop all buffered events, keeping the capacity bound. Called once
    /// a header child has been fully processed so the queue never grows
    /// past one subtree.
    pub fn clear(&mut self) {
        self.events.clear();
        self.cursor = 0;
        self.inherited_ns.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::QName;

    fn start(local: &str) -> XmlEvent {
        XmlEvent::StartElement {
            name: QName::new("urn:t", "t", local),
            attributes: vec![],
            namespaces: vec![],
        }
    }

    fn end(local: &str) -> XmlEvent {
        XmlEvent::EndElement {
            name: QName::new("urn:t", "t", local),
        }
    }

    #[test]
    fn test_push_and_replay_order() {
        let mut q = EventQueue::new();
        q.push(start("A")).unwrap();
        q.push(start("B")).unwrap();
        q.push(end("B")).unwrap();
        q.push(end("A")).unwrap();
        assert_eq!(q.len(), 4);
        assert!(q.events()[0].is_start_of("urn:t", "A"));
        assert!(q.events()[3].is_end_of("urn:t", "A"));
    }

    #[test]
    fn test_rfind_before_locates_subtree_start() {
        let mut q = EventQueue::new();
        q.push(start("Signature")).unwrap();
        q.push(start("SignedInfo")).unwrap();
        q.push(end("SignedInfo")).unwrap();
        q.push(end("Signature")).unwrap();
        let idx = q
            .rfind_before(q.len(), |e| e.is_start_of("urn:t", "SignedInfo"))
            .unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn test_capacity_bound_is_enforced() {
        let mut q = EventQueue::with_capacity(2);
        q.push(start("A")).unwrap();
        q.push(end("A")).unwrap();
        let err = q.push(start("B")).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }
}
