#![forbid(unsafe_code)]

//! Event producer backed by `roxmltree`.
//!
//! General XML parsing is out of scope for the processors themselves; this
//! adapter exists to feed tests with event streams and to re-parse
//! decrypted plaintext back into events.

use crate::event::{Attribute, NsBinding, QName, XmlEvent};
use solna_core::{ns, Error, Result};
use std::collections::BTreeMap;

/// Parsing options for inbound documents.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: false,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse an XML document and return its full event sequence.
pub fn parse_events(xml: &str) -> Result<Vec<XmlEvent>> {
    let doc = roxmltree::Document::parse_with_options(xml, parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    let mut events = Vec::new();
    emit_element(doc.root_element(), &mut events);
    Ok(events)
}

/// Parse an XML fragment (zero or more sibling nodes) into events.
///
/// Used for `EncryptedData` of Type `#Content`, where the plaintext is a
/// fragment rather than a single element. The fragment is wrapped in a
/// synthetic root carrying the given namespace bindings so prefixes used
/// inside the fragment resolve.
pub fn parse_fragment_events(fragment: &str, bindings: &[NsBinding]) -> Result<Vec<XmlEvent>> {
    let mut decls = String::new();
    for b in bindings {
        if b.prefix.is_empty() {
            decls.push_str(&format!(" xmlns=\"{}\"", b.uri));
        } else {
            decls.push_str(&format!(" xmlns:{}=\"{}\"", b.prefix, b.uri));
        }
    }
    let wrapped = format!("<solna-fragment{decls}>{fragment}</solna-fragment>");
    let doc = roxmltree::Document::parse_with_options(&wrapped, parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;

    let mut events = Vec::new();
    for child in doc.root_element().children() {
        emit_node(child, &mut events);
    }
    // Declarations identical to the wrapper's are filtered by the
    // declared-namespace diff, so the events carry only what the fragment
    // itself introduces relative to the splice point.
    Ok(events)
}

/// Recursively emit events for an element and its subtree.
pub fn emit_element(node: roxmltree::Node<'_, '_>, out: &mut Vec<XmlEvent>) {
    emit_node(node, out);
}

fn emit_node(node: roxmltree::Node<'_, '_>, out: &mut Vec<XmlEvent>) {
    if node.is_element() {
        let name = element_qname(node);
        let attributes = node
            .attributes()
            .map(|a| Attribute {
                name: attr_qname(node, &a),
                value: a.value().to_owned(),
            })
            .collect();
        let namespaces = declared_namespaces(node);
        out.push(XmlEvent::StartElement {
            name: name.clone(),
            attributes,
            namespaces,
        });
        for child in node.children() {
            emit_node(child, out);
        }
        out.push(XmlEvent::EndElement { name });
    } else if node.is_text() {
        if let Some(text) = node.text() {
            out.push(XmlEvent::Characters {
                text: text.to_owned(),
            });
        }
    }
    // Comments and processing instructions are not part of the event model.
}

fn element_qname(node: roxmltree::Node<'_, '_>) -> QName {
    let tag = node.tag_name();
    let ns_uri = tag.namespace().unwrap_or("");
    let prefix = if ns_uri.is_empty() {
        ""
    } else {
        node.lookup_prefix(ns_uri).unwrap_or("")
    };
    QName::new(ns_uri, prefix, tag.name())
}

fn attr_qname(node: roxmltree::Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> QName {
    match attr.namespace() {
        Some(uri) if uri == ns::XML => QName::new(uri, "xml", attr.name()),
        Some(uri) => {
            let prefix = node.lookup_prefix(uri).unwrap_or("");
            QName::new(uri, prefix, attr.name())
        }
        None => QName::new("", "", attr.name()),
    }
}

/// Namespace declarations introduced on this element: the in-scope set
/// minus what was already in scope on the parent element.
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<NsBinding> {
    let own = inscope_map(node);
    let parent = node
        .parent_element()
        .map(inscope_map)
        .unwrap_or_default();

    own.into_iter()
        .filter(|(prefix, _)| prefix != "xml")
        .filter(|(prefix, uri)| parent.get(prefix) != Some(uri))
        .map(|(prefix, uri)| NsBinding { prefix, uri })
        .collect()
}

fn inscope_map(node: roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    node.namespaces()
        .map(|ns| {
            (
                ns.name().unwrap_or("").to_owned(),
                ns.uri().to_owned(),
            )
        })
        .collect()
}
