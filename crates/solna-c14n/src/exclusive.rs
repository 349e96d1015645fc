#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 over a stream of events.
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//!
//! The key difference from inclusive C14N: only "visibly utilized"
//! namespace declarations are output. A namespace is visibly utilized if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList, OR
//! 4. It's the default namespace and the element is in that namespace.
//!
//! The canonicalizer consumes one complete, already-closed subtree: the
//! caller seeds it with the namespace bindings inherited from ancestors of
//! the subtree (so prefixes declared outside the replay window still
//! resolve), then feeds the buffered events forward in document order.

use crate::escape;
use crate::render::{Attr, NsDecl};
use solna_events::event::{NsBinding, XmlEvent};
use solna_core::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

/// Canonicalize a buffered event window in one call.
pub fn canonicalize_events(
    events: &[XmlEvent],
    inherited_ns: &[NsBinding],
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>> {
    let mut c14n = ExcC14n::new(Vec::new(), inclusive_prefixes);
    c14n.set_inherited_namespaces(inherited_ns);
    for event in events {
        c14n.process_event(event)?;
    }
    c14n.finish()
}

/// Streaming exc-C14N transformer writing canonical bytes into a sink.
pub struct ExcC14n<W: Write> {
    out: W,
    inclusive_prefixes: HashSet<String>,
    /// In-scope namespace map per open element depth; index 0 holds the
    /// inherited bindings of the subtree being canonicalized.
    inscope_stack: Vec<BTreeMap<String, String>>,
    /// Per open element: qualified name and the rendered-ns context its
    /// children inherit.
    frames: Vec<Frame>,
}

struct Frame {
    qualified_name: String,
    rendered: BTreeMap<String, String>,
}

impl<W: Write> ExcC14n<W> {
    pub fn new(out: W, inclusive_prefixes: &[String]) -> Self {
        Self {
            out,
            inclusive_prefixes: inclusive_prefixes.iter().cloned().collect(),
            inscope_stack: vec![BTreeMap::new()],
            frames: Vec::new(),
        }
    }

    /// Seed the namespace bindings in scope at the root of the subtree.
    pub fn set_inherited_namespaces(&mut self, bindings: &[NsBinding]) {
        let base = &mut self.inscope_stack[0];
        for b in bindings {
            if b.uri.is_empty() {
                base.remove(&b.prefix);
            } else {
                base.insert(b.prefix.clone(), b.uri.clone());
            }
        }
    }

    pub fn process_event(&mut self, event: &XmlEvent) -> Result<()> {
        match event {
            XmlEvent::StartElement {
                name,
                attributes,
                namespaces,
            } => self.start_element(name, attributes, namespaces),
            XmlEvent::EndElement { .. } => self.end_element(),
            XmlEvent::Characters { text } => {
                self.out.write_all(escape::escape_text(text).as_bytes())?;
                Ok(())
            }
        }
    }

    /// Close the sink and return it. Fails when the event stream left
    /// elements open.
    pub fn finish(mut self) -> Result<W> {
        if !self.frames.is_empty() {
            return Err(Error::Structural(
                "canonicalized subtree has unclosed elements".into(),
            ));
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn start_element(
        &mut self,
        name: &solna_events::event::QName,
        attributes: &[solna_events::event::Attribute],
        namespaces: &[NsBinding],
    ) -> Result<()> {
        // Extend the in-scope map with this element's declarations.
        let mut inscope = self
            .inscope_stack
            .last()
            .cloned()
            .unwrap_or_default();
        for b in namespaces {
            if b.uri.is_empty() {
                inscope.remove(&b.prefix);
            } else {
                inscope.insert(b.prefix.clone(), b.uri.clone());
            }
        }

        let rendered = self
            .frames
            .last()
            .map(|f| f.rendered.clone())
            .unwrap_or_default();

        // Determine which namespace prefixes are "visibly utilized".
        let mut utilized: HashSet<String> = HashSet::new();
        utilized.insert(name.prefix.clone().unwrap_or_default());
        for attr in attributes {
            if attr.name.ns_uri.is_some() {
                if let Some(prefix) = &attr.name.prefix {
                    if !prefix.is_empty() {
                        utilized.insert(prefix.clone());
                    }
                }
            }
        }
        // "#default" in the PrefixList means the default namespace.
        for p in &self.inclusive_prefixes {
            if p == "#default" {
                utilized.insert(String::new());
            } else {
                utilized.insert(p.clone());
            }
        }

        // Declarations to output: utilized, in scope, not already rendered.
        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in &utilized {
            if prefix == "xml" {
                continue;
            }
            if let Some(uri) = inscope.get(prefix) {
                if rendered.get(prefix) != Some(uri) {
                    ns_decls.push(NsDecl {
                        prefix: prefix.clone(),
                        uri: uri.clone(),
                    });
                }
            } else if prefix.is_empty() {
                // Default namespace was rendered non-empty by an ancestor
                // and must be undeclared here.
                if rendered.get("").is_some_and(|u| !u.is_empty()) {
                    ns_decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    });
                }
            }
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = attributes
            .iter()
            .map(|a| Attr {
                ns_uri: a.name.ns_uri.clone().unwrap_or_default(),
                local_name: a.name.local.clone(),
                qualified_name: a.name.qualified(),
                value: a.value.clone(),
            })
            .collect();
        attrs.sort();

        let qualified_name = name.qualified();
        self.out.write_all(b"<")?;
        self.out.write_all(qualified_name.as_bytes())?;
        for decl in &ns_decls {
            self.out.write_all(decl.render().as_bytes())?;
        }
        for attr in &attrs {
            self.out.write_all(attr.render().as_bytes())?;
        }
        self.out.write_all(b">")?;

        let mut child_rendered = rendered;
        for decl in &ns_decls {
            child_rendered.insert(decl.prefix.clone(), decl.uri.clone());
        }

        self.inscope_stack.push(inscope);
        self.frames.push(Frame {
            qualified_name,
            rendered: child_rendered,
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        let frame = self.frames.pop().ok_or_else(|| {
            Error::Structural("end element without matching start".into())
        })?;
        self.inscope_stack.pop();
        self.out.write_all(b"</")?;
        self.out.write_all(frame.qualified_name.as_bytes())?;
        self.out.write_all(b">")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solna_events::reader::parse_events;

    fn c14n(xml: &str, inclusive: &[&str]) -> String {
        let events = parse_events(xml).unwrap();
        let prefixes: Vec<String> = inclusive.iter().map(|s| s.to_string()).collect();
        let bytes = canonicalize_events(&events, &[], &prefixes).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_only_utilized_namespaces_are_rendered() {
        // xmlns:unused is in scope but not visibly utilized
        let out = c14n(
            "<a xmlns=\"urn:a\" xmlns:unused=\"urn:u\"><b>x</b></a>",
            &[],
        );
        assert_eq!(out, "<a xmlns=\"urn:a\"><b>x</b></a>");
    }

    #[test]
    fn test_attribute_prefix_is_utilized() {
        let out = c14n(
            "<a xmlns=\"urn:a\" xmlns:p=\"urn:p\" p:attr=\"v\"/>",
            &[],
        );
        assert_eq!(out, "<a xmlns=\"urn:a\" xmlns:p=\"urn:p\" p:attr=\"v\"></a>");
    }

    #[test]
    fn test_rendered_namespace_not_repeated_on_children() {
        let out = c14n("<p:a xmlns:p=\"urn:p\"><p:b/></p:a>", &[]);
        assert_eq!(out, "<p:a xmlns:p=\"urn:p\"><p:b></p:b></p:a>");
    }

    #[test]
    fn test_inclusive_prefix_list_forces_rendering() {
        let out = c14n(
            "<p:a xmlns:p=\"urn:p\" xmlns:keep=\"urn:k\"><p:b/></p:a>",
            &["keep"],
        );
        assert_eq!(
            out,
            "<p:a xmlns:keep=\"urn:k\" xmlns:p=\"urn:p\"><p:b></p:b></p:a>"
        );
    }

    #[test]
    fn test_namespace_declarations_sorted_default_first() {
        let out = c14n(
            "<a xmlns=\"urn:a\" xmlns:z=\"urn:z\" xmlns:b=\"urn:b\" z:x=\"1\" b:y=\"2\"/>",
            &[],
        );
        assert_eq!(
            out,
            "<a xmlns=\"urn:a\" xmlns:b=\"urn:b\" xmlns:z=\"urn:z\" b:y=\"2\" z:x=\"1\"></a>"
        );
    }

    #[test]
    fn test_attributes_sorted_by_namespace_then_name() {
        let out = c14n("<a c=\"3\" b=\"2\" a=\"1\"/>", &[]);
        assert_eq!(out, "<a a=\"1\" b=\"2\" c=\"3\"></a>");
    }

    #[test]
    fn test_inherited_namespace_is_redeclared_on_detached_subtree() {
        // Simulates SignedInfo replay: the ds prefix is declared on an
        // ancestor outside the window, so the detached subtree must
        // re-declare it.
        let doc = parse_events(
            "<ds:Signature xmlns:ds=\"urn:ds\"><ds:SignedInfo><ds:Reference URI=\"#x\"/></ds:SignedInfo></ds:Signature>",
        )
        .unwrap();
        // Window = SignedInfo subtree (events 1..=4)
        let window = &doc[1..5];
        let inherited = vec![NsBinding {
            prefix: "ds".into(),
            uri: "urn:ds".into(),
        }];
        let bytes = canonicalize_events(window, &inherited, &[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "<ds:SignedInfo xmlns:ds=\"urn:ds\"><ds:Reference URI=\"#x\"></ds:Reference></ds:SignedInfo>"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let out = c14n("<a>x &amp; y</a>", &[]);
        assert_eq!(out, "<a>x &amp; y</a>");
    }

    #[test]
    fn test_unclosed_subtree_is_an_error() {
        let events = parse_events("<a><b/></a>").unwrap();
        let mut c = ExcC14n::new(Vec::new(), &[]);
        // Feed only the opening event
        c.process_event(&events[0]).unwrap();
        assert!(c.finish().is_err());
    }
}
