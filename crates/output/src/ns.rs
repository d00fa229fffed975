//! Namespace-prefix bookkeeping shared by the serializers.

use std::collections::HashMap;

/// Tracks which prefix serializes each namespace URI, following the
/// `StartNs`/`EndNs` events of the stream.
#[derive(Debug, Default)]
pub(crate) struct NamespaceMap {
    // URI -> prefixes bound to it, innermost last
    by_uri: HashMap<String, Vec<String>>,
    // prefix -> URIs it is bound to, innermost last
    by_prefix: HashMap<String, Vec<String>>,
}

impl NamespaceMap {
    pub(crate) fn new() -> Self {
        NamespaceMap::default()
    }

    /// Registers a binding; returns true when the URI was not already
    /// serializable (i.e. an `xmlns` declaration should be written).
    pub(crate) fn bind(&mut self, prefix: &str, uri: &str) -> bool {
        let fresh = !self.by_uri.contains_key(uri);
        self.by_uri
            .entry(uri.to_string())
            .or_default()
            .push(prefix.to_string());
        self.by_prefix
            .entry(prefix.to_string())
            .or_default()
            .push(uri.to_string());
        fresh
    }

    /// Retires the innermost binding of a prefix.
    pub(crate) fn unbind(&mut self, prefix: &str) {
        let Some(uris) = self.by_prefix.get_mut(prefix) else {
            return;
        };
        let Some(uri) = uris.pop() else {
            return;
        };
        if uris.is_empty() {
            self.by_prefix.remove(prefix);
        }
        if let Some(prefixes) = self.by_uri.get_mut(&uri) {
            if let Some(idx) = prefixes.iter().rposition(|p| p == prefix) {
                prefixes.remove(idx);
            }
            if prefixes.is_empty() {
                self.by_uri.remove(&uri);
            }
        }
    }

    /// The prefix to serialize a URI with: `Some("")` means the default
    /// namespace, `None` means the URI has no binding.
    pub(crate) fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.by_uri
            .get(uri)
            .and_then(|prefixes| prefixes.last())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_unbind() {
        let mut ns = NamespaceMap::new();
        assert!(ns.bind("py", "http://example.org/"));
        assert!(!ns.bind("p2", "http://example.org/"));
        assert_eq!(ns.prefix_for("http://example.org/"), Some("p2"));
        ns.unbind("p2");
        assert_eq!(ns.prefix_for("http://example.org/"), Some("py"));
        ns.unbind("py");
        assert_eq!(ns.prefix_for("http://example.org/"), None);
    }
}
