#![forbid(unsafe_code)]

//! XML event types.

/// A qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace prefix, `None` for unprefixed names.
    pub prefix: Option<String>,
    /// Local part of the name.
    pub local: String,
    /// Resolved namespace URI, `None` when the name is in no namespace.
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn new(ns_uri: &str, prefix: &str, local: &str) -> Self {
        Self {
            prefix: if prefix.is_empty() {
                None
            } else {
                Some(prefix.to_owned())
            },
            local: local.to_owned(),
            ns_uri: if ns_uri.is_empty() {
                None
            } else {
                Some(ns_uri.to_owned())
            },
        }
    }

    /// Check namespace URI and local name, ignoring the prefix.
    pub fn matches(&self, ns_uri: &str, local: &str) -> bool {
        self.local == local && self.ns_uri.as_deref() == Some(ns_uri)
    }

    /// The name as serialized: `prefix:local` or just `local`.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

/// An attribute on a start-element event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// A namespace declaration introduced on a start-element event.
///
/// The empty prefix denotes the default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsBinding {
    pub prefix: String,
    pub uri: String,
}

/// A typed XML event. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement {
        name: QName,
        attributes: Vec<Attribute>,
        /// Namespace declarations appearing on this element only.
        namespaces: Vec<NsBinding>,
    },
    EndElement {
        name: QName,
    },
    Characters {
        text: String,
    },
}

impl XmlEvent {
    pub fn is_start(&self) -> bool {
        matches!(self, XmlEvent::StartElement { .. })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, XmlEvent::EndElement { .. })
    }

    /// True for a start-element event with the given namespace and local name.
    pub fn is_start_of(&self, ns_uri: &str, local: &str) -> bool {
        match self {
            XmlEvent::StartElement { name, .. } => name.matches(ns_uri, local),
            _ => false,
        }
    }

    /// True for an end-element event with the given namespace and local name.
    pub fn is_end_of(&self, ns_uri: &str, local: &str) -> bool {
        match self {
            XmlEvent::EndElement { name } => name.matches(ns_uri, local),
            _ => false,
        }
    }

    /// Look up an unqualified attribute on a start-element event.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        match self {
            XmlEvent::StartElement { attributes, .. } => attributes
                .iter()
                .find(|a| a.name.ns_uri.is_none() && a.name.local == local)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    /// Look up a namespace-qualified attribute on a start-element event.
    pub fn attribute_ns(&self, ns_uri: &str, local: &str) -> Option<&str> {
        match self {
            XmlEvent::StartElement { attributes, .. } => attributes
                .iter()
                .find(|a| a.name.matches(ns_uri, local))
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    /// The element name of a start or end event.
    pub fn element_name(&self) -> Option<&QName> {
        match self {
            XmlEvent::StartElement { name, .. } => Some(name),
            XmlEvent::EndElement { name } => Some(name),
            XmlEvent::Characters { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_matches_ignores_prefix() {
        let a = QName::new("urn:x", "a", "Name");
        let b = QName::new("urn:x", "b", "Name");
        assert!(a.matches("urn:x", "Name"));
        assert!(b.matches("urn:x", "Name"));
        assert!(!a.matches("urn:y", "Name"));
    }

    #[test]
    fn test_attribute_lookup() {
        let ev = XmlEvent::StartElement {
            name: QName::new("urn:x", "", "E"),
            attributes: vec![
                Attribute {
                    name: QName::new("", "", "Id"),
                    value: "x-1".into(),
                },
                Attribute {
                    name: QName::new("urn:wsu", "wsu", "Id"),
                    value: "x-2".into(),
                },
            ],
            namespaces: vec![],
        };
        assert_eq!(ev.attribute("Id"), Some("x-1"));
        assert_eq!(ev.attribute_ns("urn:wsu", "Id"), Some("x-2"));
        assert_eq!(ev.attribute("URI"), None);
    }
}
