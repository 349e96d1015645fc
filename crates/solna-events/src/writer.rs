#![forbid(unsafe_code)]

//! Serialize an event sequence back to XML text.
//!
//! Plain serialization, not canonicalization: events are written in order
//! with their own declarations and attributes, which is enough to inspect
//! the transformed output stream in tests and demos.

use crate::event::XmlEvent;

/// Write a sequence of events as an XML string.
pub fn write_events(events: &[XmlEvent]) -> String {
    let mut out = String::new();
    for event in events {
        match event {
            XmlEvent::StartElement {
                name,
                attributes,
                namespaces,
            } => {
                out.push('<');
                out.push_str(&name.qualified());
                for ns in namespaces {
                    if ns.prefix.is_empty() {
                        out.push_str(&format!(" xmlns=\"{}\"", escape_attr(&ns.uri)));
                    } else {
                        out.push_str(&format!(
                            " xmlns:{}=\"{}\"",
                            ns.prefix,
                            escape_attr(&ns.uri)
                        ));
                    }
                }
                for attr in attributes {
                    out.push_str(&format!(
                        " {}=\"{}\"",
                        attr.name.qualified(),
                        escape_attr(&attr.value)
                    ));
                }
                out.push('>');
            }
            XmlEvent::EndElement { name } => {
                out.push_str("</");
                out.push_str(&name.qualified());
                out.push('>');
            }
            XmlEvent::Characters { text } => {
                out.push_str(&escape_text(text));
            }
        }
    }
    out
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_events;

    #[test]
    fn test_roundtrip_simple_document() {
        let xml = "<a xmlns=\"urn:x\"><b attr=\"v\">text &amp; more</b></a>";
        let events = parse_events(xml).unwrap();
        assert_eq!(write_events(&events), xml);
    }
}
