use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

/// Errors raised by `CheckedMap` when a caller skips the contains-check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckedMapError {
    /// Insert would have replaced an existing value
    #[error("Duplicate key in checked map: {key}")]
    DuplicateKey { key: String },

    /// Remove targeted a key that has no value
    #[error("Key not found in checked map: {key}")]
    KeyNotFound { key: String },
}

// CheckedMap
pub struct CheckedMap<K: Eq + Hash + Debug, V> {
    inner: HashMap<K, V>,
}

impl<K: Eq + Hash + Debug, V> Default for CheckedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Debug, V> CheckedMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Inserts without replacing; an existing entry is an error
    pub fn try_insert(&mut self, key: K, value: V) -> Result<(), CheckedMapError> {
        if self.inner.contains_key(&key) {
            return Err(CheckedMapError::DuplicateKey {
                key: format!("{:?}", key),
            });
        }

        self.inner.insert(key, value);
        Ok(())
    }

    pub fn try_remove(&mut self, key: &K) -> Result<V, CheckedMapError> {
        self.inner
            .remove(key)
            .ok_or_else(|| CheckedMapError::KeyNotFound {
                key: format!("{:?}", key),
            })
    }

    pub fn iter(&self) -> std::collections::hash_map::Iter<'_, K, V> {
        self.inner.iter()
    }

    pub fn keys(&self) -> std::collections::hash_map::Keys<'_, K, V> {
        self.inner.keys()
    }

    pub fn values_mut(&mut self) -> std::collections::hash_map::ValuesMut<'_, K, V> {
        self.inner.values_mut()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
