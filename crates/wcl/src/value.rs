/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The WCL document tree.
//!
//! A WCL document is an ordered tree of string scalars and sections. Keys
//! are unique per section and insertion order is kept so that a document
//! writes back out the way it was read.
//!
//! Each [`Section`] carries a [`KeyCase`] mode. Under [`KeyCase::Fold`]
//! (the default) keys are lowercased on insertion; under
//! [`KeyCase::Preserve`] they are stored verbatim. Command-line sections
//! (`cmdline`, `replace`) preserve case because they hold flag names.

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;

/// Section names whose contents keep the original key case.
pub const CASE_PRESERVING_SECTIONS: [&str; 2] = ["cmdline", "replace"];

/// How a section treats the case of inserted keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCase {
    /// Lowercase keys on insertion.
    #[default]
    Fold,
    /// Store keys exactly as given.
    Preserve,
}

impl KeyCase {
    /// Apply this mode to a key.
    pub fn apply(self, key: &str) -> String {
        match self {
            KeyCase::Fold => key.to_lowercase(),
            KeyCase::Preserve => key.to_string(),
        }
    }

    /// Mode for a child section named `name` opened inside a section using `self`.
    pub fn for_child(self, name: &str) -> KeyCase {
        if self == KeyCase::Preserve || CASE_PRESERVING_SECTIONS.contains(&name) {
            KeyCase::Preserve
        } else {
            KeyCase::Fold
        }
    }
}

/// A value in the document tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Scalar(String),
    Section(Section),
}

impl Node {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => Some(s),
            Node::Section(_) => None,
        }
    }

    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Node::Section(s) => Some(s),
            Node::Scalar(_) => None,
        }
    }

    pub fn as_section_mut(&mut self) -> Option<&mut Section> {
        match self {
            Node::Section(s) => Some(s),
            Node::Scalar(_) => None,
        }
    }

    pub fn is_section(&self) -> bool {
        matches!(self, Node::Section(_))
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(s)
    }
}

impl From<Section> for Node {
    fn from(s: Section) -> Self {
        Node::Section(s)
    }
}

/// An ordered map of keys to nodes.
///
/// Equality compares entries only; order and case mode are ignored.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Section {
    entries: IndexMap<String, Node>,
    #[serde(skip)]
    case: KeyCase,
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Section {
    /// Create an empty key-folding section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty section with the given case mode.
    pub fn with_case(case: KeyCase) -> Self {
        Self {
            entries: IndexMap::new(),
            case,
        }
    }

    pub fn case(&self) -> KeyCase {
        self.case
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key exactly as stored.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Scalar value of `key`, if present and not a section.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_str)
    }

    /// Child section at `key`, if present and a section.
    pub fn get_section(&self, key: &str) -> Option<&Section> {
        self.get(key).and_then(Node::as_section)
    }

    /// Insert a value, applying this section's case mode to the key.
    ///
    /// An existing key keeps its position. Returns the previous value.
    pub fn insert(&mut self, key: &str, value: impl Into<Node>) -> Option<Node> {
        let key = self.case.apply(key);
        self.entries.insert(key, value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.entries.shift_remove(key)
    }

    /// Get the child section named `name`, creating it if missing.
    ///
    /// The name is always lowercased. A new child inherits case
    /// preservation from this section or from its own name. Returns `None`
    /// when `name` already holds a scalar.
    pub fn section_entry(&mut self, name: &str) -> Option<&mut Section> {
        let name = name.to_lowercase();
        let case = self.case.for_child(&name);
        match self.entries.entry(name) {
            Entry::Occupied(e) => e.into_mut().as_section_mut(),
            Entry::Vacant(e) => e
                .insert(Node::Section(Section::with_case(case)))
                .as_section_mut(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Node> {
        self.entries.iter()
    }

    /// Deep, order-preserving merge of `other` into `self`.
    ///
    /// Sections merge recursively; any other value overwrites. Existing
    /// keys keep their position and new keys are appended.
    pub fn merge(&mut self, other: &Section) {
        for (key, value) in other.iter() {
            if let (Some(Node::Section(mine)), Node::Section(theirs)) =
                (self.entries.get_mut(key), value)
            {
                mine.merge(theirs);
                continue;
            }
            let merged = match value {
                Node::Section(theirs) => {
                    let mut fresh = Section::with_case(self.case.for_child(key));
                    fresh.merge(theirs);
                    Node::Section(fresh)
                }
                scalar => scalar.clone(),
            };
            self.entries.insert(key.clone(), merged);
        }
    }

    /// Count scalar entries in this section and all descendants.
    pub fn scalar_count(&self) -> usize {
        self.entries
            .values()
            .map(|v| match v {
                Node::Scalar(_) => 1,
                Node::Section(s) => s.scalar_count(),
            })
            .sum()
    }
}

impl<'a> IntoIterator for &'a Section {
    type Item = (&'a String, &'a Node);
    type IntoIter = indexmap::map::Iter<'a, String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: AsRef<str>, V: Into<Node>> FromIterator<(K, V)> for Section {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut section = Section::new();
        for (k, v) in iter {
            section.insert(k.as_ref(), v);
        }
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_folds_keys() {
        let mut section = Section::new();
        section.insert("FooBar", "1");
        assert_eq!(section.get_str("foobar"), Some("1"));
        assert!(section.get("FooBar").is_none());
    }

    #[test]
    fn test_preserve_case_inherited() {
        let mut root = Section::new();
        let cmdline = root.section_entry("CmdLine").unwrap();
        assert_eq!(cmdline.case(), KeyCase::Preserve);
        cmdline.insert("OutFile", "x.fits");
        let nested = cmdline.section_entry("Inner").unwrap();
        assert_eq!(nested.case(), KeyCase::Preserve);

        let cmdline = root.get_section("cmdline").unwrap();
        assert_eq!(cmdline.get_str("OutFile"), Some("x.fits"));
        assert!(cmdline.get_section("inner").is_some());
    }

    #[test]
    fn test_section_entry_on_scalar() {
        let mut root = Section::new();
        root.insert("a", "1");
        assert!(root.section_entry("a").is_none());
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut section: Section = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        section.insert("a", "9");
        let keys: Vec<_> = section.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(section.get_str("a"), Some("9"));
    }

    #[test]
    fn test_merge_is_deep_and_ordered() {
        let mut base = Section::new();
        base.insert("x", "1");
        base.section_entry("file").unwrap().insert("name", "a.fits");
        base.insert("y", "2");

        let mut incoming = Section::new();
        let file = incoming.section_entry("file").unwrap();
        file.insert("name", "b.fits");
        file.insert("dir", "/data");
        incoming.insert("x", "10");
        incoming.insert("z", "3");

        base.merge(&incoming);

        let keys: Vec<_> = base.keys().cloned().collect();
        assert_eq!(keys, vec!["x", "file", "y", "z"]);
        assert_eq!(base.get_str("x"), Some("10"));
        let file = base.get_section("file").unwrap();
        assert_eq!(file.get_str("name"), Some("b.fits"));
        assert_eq!(file.get_str("dir"), Some("/data"));
    }

    #[test]
    fn test_merge_section_over_scalar() {
        let mut base = Section::new();
        base.insert("a", "1");
        let mut incoming = Section::new();
        incoming.section_entry("a").unwrap().insert("b", "2");
        base.merge(&incoming);
        assert_eq!(
            base.get_section("a").and_then(|s| s.get_str("b")),
            Some("2")
        );
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: Section = [("a", "1"), ("b", "2")].into_iter().collect();
        let b: Section = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(a, b);
    }
}
