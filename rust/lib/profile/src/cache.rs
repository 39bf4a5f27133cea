use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::value::PropertyValue;

/// What the cache knows about a key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// The key holds this value.
    Present(PropertyValue),
    /// The key was looked up and has no stored value.
    Absent,
}

impl CacheEntry {
    pub fn into_value(self) -> Option<PropertyValue> {
        match self {
            CacheEntry::Present(value) => Some(value),
            CacheEntry::Absent => None,
        }
    }
}

/// Unbounded per-key value cache.
///
/// Entries are only replaced or dropped by explicit calls; nothing expires.
/// Once a key is cached the database is not consulted for it again.
pub struct ValueCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    pub fn store(&self, key: &str, value: PropertyValue) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), CacheEntry::Present(value));
    }

    /// Remember that `key` has no stored value.
    pub fn store_absent(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), CacheEntry::Absent);
    }

    pub fn evict(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ValueCache {
    fn default() -> Self {
        Self::new()
    }
}
