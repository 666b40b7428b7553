//! Ordered map type for BTOON maps.
//!
//! [`BtoonMap`] wraps an [`IndexMap`] so that entries keep insertion order.
//! Order is part of a map's identity in BTOON: entries are written in insertion
//! order, decoded in wire order, and tabular blocks reproduce each row's key
//! order exactly.
//!
//! ## Examples
//!
//! ```rust
//! use btoon::{BtoonMap, Value};
//!
//! let mut map = BtoonMap::new();
//! map.insert("name".to_string(), Value::from("Alice"));
//! map.insert("age".to_string(), Value::from(30));
//!
//! assert_eq!(map.len(), 2);
//! assert_eq!(map.get("name").and_then(|v| v.as_str()), Some("Alice"));
//! ```

use indexmap::IndexMap;
use std::collections::HashMap;

/// An insertion-ordered map of unique string keys to BTOON values.
///
/// # Examples
///
/// ```rust
/// use btoon::{BtoonMap, Value};
///
/// let mut map = BtoonMap::new();
/// map.insert("second".to_string(), Value::from(2));
/// map.insert("first".to_string(), Value::from(1));
///
/// let keys: Vec<_> = map.keys().cloned().collect();
/// assert_eq!(keys, vec!["second", "first"]);
/// ```
///
/// Equality compares entries in order, so `{a, b}` and `{b, a}` differ.
#[derive(Debug, Clone, Default)]
pub struct BtoonMap(IndexMap<String, crate::Value>);

impl PartialEq for BtoonMap {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().eq(other.0.iter())
    }
}

impl BtoonMap {
    #[must_use]
    pub fn new() -> Self {
        BtoonMap(IndexMap::new())
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        BtoonMap(IndexMap::with_capacity(capacity))
    }

    /// Inserts a key-value pair.
    ///
    /// A new key goes to the end; an existing key keeps its position and the
    /// old value is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use btoon::{BtoonMap, Value};
    ///
    /// let mut map = BtoonMap::new();
    /// assert!(map.insert("key".to_string(), Value::from(42)).is_none());
    /// assert!(map.insert("key".to_string(), Value::from(43)).is_some());
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, key: String, value: crate::Value) -> Option<crate::Value> {
        self.0.insert(key, value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&crate::Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut crate::Value> {
        self.0.get_mut(key)
    }

    /// Returns the entry at `index` in insertion order.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<(&String, &crate::Value)> {
        self.0.get_index(index)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<crate::Value> {
        self.0.shift_remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the keys of the map, in insertion order.
    pub fn keys(&self) -> indexmap::map::Keys<'_, String, crate::Value> {
        self.0.keys()
    }

    /// Returns an iterator over the values of the map, in insertion order.
    pub fn values(&self) -> indexmap::map::Values<'_, String, crate::Value> {
        self.0.values()
    }

    /// Returns an iterator over the key-value pairs of the map, in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, crate::Value> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, String, crate::Value> {
        self.0.iter_mut()
    }

    /// Returns `true` if both maps have the same keys in the same order.
    #[must_use]
    pub fn same_keys(&self, other: &BtoonMap) -> bool {
        self.len() == other.len() && self.keys().zip(other.keys()).all(|(a, b)| a == b)
    }
}

impl From<HashMap<String, crate::Value>> for BtoonMap {
    fn from(map: HashMap<String, crate::Value>) -> Self {
        BtoonMap(map.into_iter().collect())
    }
}

impl From<BtoonMap> for HashMap<String, crate::Value> {
    fn from(map: BtoonMap) -> Self {
        map.0.into_iter().collect()
    }
}

impl From<IndexMap<String, crate::Value>> for BtoonMap {
    fn from(map: IndexMap<String, crate::Value>) -> Self {
        BtoonMap(map)
    }
}

impl IntoIterator for BtoonMap {
    type Item = (String, crate::Value);
    type IntoIter = indexmap::map::IntoIter<String, crate::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a BtoonMap {
    type Item = (&'a String, &'a crate::Value);
    type IntoIter = indexmap::map::Iter<'a, String, crate::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, crate::Value)> for BtoonMap {
    fn from_iter<T: IntoIterator<Item = (String, crate::Value)>>(iter: T) -> Self {
        BtoonMap(IndexMap::from_iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_remove_keeps_order() {
        let mut map: BtoonMap = [("a", 1), ("b", 2), ("c", 3)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        assert_eq!(map.remove("b"), Some(Value::from(2)));
        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_same_keys_is_order_sensitive() {
        let mut ab = BtoonMap::new();
        ab.insert("a".to_string(), Value::Null);
        ab.insert("b".to_string(), Value::Null);
        let mut ba = BtoonMap::new();
        ba.insert("b".to_string(), Value::Null);
        ba.insert("a".to_string(), Value::Null);
        assert!(ab.same_keys(&ab.clone()));
        assert!(!ab.same_keys(&ba));
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let ab: BtoonMap = [("a", 1), ("b", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        let ba: BtoonMap = [("b", 2), ("a", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        assert_eq!(ab, ab.clone());
        assert_ne!(ab, ba);
        assert_ne!(Value::Map(ab), Value::Map(ba));
    }
}
