//! Ordered attribute container for start-tag events.

use crate::qname::QName;

/// The attributes of an element.
///
/// Attribute order is preserved; access and manipulation by name is
/// supported. Setting a name that is already present updates the existing
/// entry in place, new names append at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(QName, String)>);

impl Attributes {
    pub fn new() -> Self {
        Attributes(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether an attribute with the given name is present.
    pub fn contains(&self, name: &QName) -> bool {
        self.0.iter().any(|(attr, _)| attr == name)
    }

    /// Returns the value of the named attribute, if present.
    pub fn get(&self, name: &QName) -> Option<&str> {
        self.0
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, updating an existing entry or appending a new one.
    pub fn set(&mut self, name: impl Into<QName>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(attr, _)| *attr == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Removes the named attribute; does nothing if it is absent.
    pub fn remove(&mut self, name: &QName) {
        if let Some(idx) = self.0.iter().position(|(attr, _)| attr == name) {
            self.0.remove(idx);
        }
    }

    pub fn push(&mut self, name: QName, value: String) {
        self.0.push((name, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QName, &str)> {
        self.0.iter().map(|(name, value)| (name, value.as_str()))
    }
}

impl FromIterator<(QName, String)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (QName, String)>>(iter: I) -> Self {
        Attributes(iter.into_iter().collect())
    }
}

impl IntoIterator for Attributes {
    type Item = (QName, String);
    type IntoIter = std::vec::IntoIter<(QName, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
