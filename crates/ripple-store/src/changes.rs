//! Insertion-ordered change buffers.
//!
//! `ChangeMap` backs the pending, old-value, and changed sets of the batch
//! pipeline. Entries keep the position of their first insertion when
//! re-assigned, so observers fire in the order changes first appeared. A
//! `None` value records that a path became undefined.

use serde_json::Value;
use std::collections::HashMap;

/// An insertion-ordered map from path to optional value.
#[derive(Debug, Clone, Default)]
pub struct ChangeMap {
    entries: Vec<(String, Option<Value>)>,
    index: HashMap<String, usize>,
}

impl ChangeMap {
    /// Create an empty change map.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded paths.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no paths are recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the path has an entry.
    #[inline]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// The recorded value for a path, if any.
    pub fn get(&self, path: &str) -> Option<&Option<Value>> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    /// Mutable access to the recorded value for a path.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Option<Value>> {
        let i = *self.index.get(path)?;
        Some(&mut self.entries[i].1)
    }

    /// Record a value, keeping the original position on re-assignment.
    pub fn insert(&mut self, path: &str, value: Option<Value>) {
        match self.index.get(path) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(path.to_owned(), self.entries.len());
                self.entries.push((path.to_owned(), value));
            }
        }
    }

    /// Record a value only if the path has no entry yet.
    ///
    /// This is how old-value capture stays first-write-wins across a cycle.
    pub fn insert_if_absent(&mut self, path: &str, value: Option<Value>) {
        if !self.contains(path) {
            self.insert(path, value);
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Option<Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate paths in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_preserves_order() {
        let mut map = ChangeMap::new();
        map.insert("b", Some(json!(1)));
        map.insert("a", Some(json!(2)));
        map.insert("b", Some(json!(3)));

        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(map.get("b"), Some(&Some(json!(3))));
    }

    #[test]
    fn test_insert_if_absent() {
        let mut map = ChangeMap::new();
        map.insert_if_absent("a", Some(json!(1)));
        map.insert_if_absent("a", Some(json!(2)));
        assert_eq!(map.get("a"), Some(&Some(json!(1))));
    }

    #[test]
    fn test_none_records_undefined() {
        let mut map = ChangeMap::new();
        map.insert("gone", None);
        assert!(map.contains("gone"));
        assert_eq!(map.get("gone"), Some(&None));
        assert_eq!(map.get("missing"), None);
    }
}
