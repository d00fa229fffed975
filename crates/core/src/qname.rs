//! Namespace-aware element and attribute identity.

use std::fmt;

/// A qualified element or attribute name: an optional namespace URI plus a
/// local name. Equality compares both parts.
///
/// The `Display` form uses Clark notation, `{uri}local`, which is also
/// accepted when constructing a name from a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub namespace: Option<String>,
    pub localname: String,
}

impl QName {
    /// Creates a name without a namespace.
    pub fn new(localname: impl Into<String>) -> Self {
        QName {
            namespace: None,
            localname: localname.into(),
        }
    }

    /// Creates a name qualified by a namespace URI.
    pub fn qualified(namespace: impl Into<String>, localname: impl Into<String>) -> Self {
        QName {
            namespace: Some(namespace.into()),
            localname: localname.into(),
        }
    }

    /// Parses Clark notation (`{uri}local`); anything without a leading `{`
    /// is treated as a plain local name.
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix('{') {
            if let Some((uri, local)) = rest.split_once('}') {
                return QName::qualified(uri, local);
            }
        }
        QName::new(text)
    }

    /// Whether the name belongs to the given namespace URI.
    pub fn in_namespace(&self, uri: &str) -> bool {
        self.namespace.as_deref() == Some(uri)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.localname),
            None => f.write_str(&self.localname),
        }
    }
}

impl From<&str> for QName {
    fn from(text: &str) -> Self {
        QName::parse(text)
    }
}

impl From<String> for QName {
    fn from(text: String) -> Self {
        QName::parse(&text)
    }
}

/// Helper for creating and testing names within one namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(pub String);

impl Namespace {
    pub fn new(uri: impl Into<String>) -> Self {
        Namespace(uri.into())
    }

    pub fn uri(&self) -> &str {
        &self.0
    }

    /// Creates a `QName` for `localname` within this namespace.
    pub fn name(&self, localname: impl Into<String>) -> QName {
        QName::qualified(self.0.clone(), localname)
    }

    /// Whether the given name belongs to this namespace.
    pub fn contains(&self, qname: &QName) -> bool {
        qname.namespace.as_deref() == Some(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let name = QName::new("body");
        assert_eq!(name.localname, "body");
        assert_eq!(name.namespace, None);
        assert_eq!(name.to_string(), "body");
    }

    #[test]
    fn test_clark_notation() {
        let name = QName::parse("{http://www.w3.org/1999/xhtml}body");
        assert_eq!(name.namespace.as_deref(), Some("http://www.w3.org/1999/xhtml"));
        assert_eq!(name.localname, "body");
        assert_eq!(name.to_string(), "{http://www.w3.org/1999/xhtml}body");
    }

    #[test]
    fn test_namespace_membership() {
        let html = Namespace::new("http://www.w3.org/1999/xhtml");
        let body = html.name("body");
        assert!(html.contains(&body));
        assert!(!html.contains(&QName::new("body")));
        assert!(!Namespace::new("http://www.w3.org/2002/06/xhtml2").contains(&body));
    }

    #[test]
    fn test_equality_compares_both_parts() {
        assert_eq!(QName::parse("{ns}a"), QName::qualified("ns", "a"));
        assert_ne!(QName::parse("{ns}a"), QName::new("a"));
    }
}
