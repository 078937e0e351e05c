//! Keyed tables without auto-vivification, plus capacity counters.
//!
//! A [`Table`] never creates entries implicitly: lookups return `Option`,
//! and counter updates on a missing key fail instead of inserting a default
//! row. Values implementing [`CapacityCounter`] can be acquired and released
//! in place with overflow and underflow reported as errors.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Error type for table counter operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Capacity exhausted")]
    CapacityExhausted,

    #[error("Counter underflow")]
    CounterUnderflow,
}

/// A bounded usage counter.
pub trait CapacityCounter {
    /// Current usage.
    fn used(&self) -> u32;

    /// Upper bound on usage.
    fn capacity(&self) -> u32;

    /// Overwrites the usage. Callers check bounds first.
    fn set_used(&mut self, used: u32);

    /// Takes one unit. Returns the new usage, or `None` if full.
    fn try_acquire(&mut self) -> Option<u32> {
        if self.used() >= self.capacity() {
            return None;
        }
        let used = self.used() + 1;
        self.set_used(used);
        Some(used)
    }

    /// Returns one unit. Returns the new usage, or `None` on underflow.
    fn try_release(&mut self) -> Option<u32> {
        let used = self.used().checked_sub(1)?;
        self.set_used(used);
        Some(used)
    }
}

impl CapacityCounter for fibernet_types::SplitterPorts {
    fn used(&self) -> u32 {
        self.used_ports
    }

    fn capacity(&self) -> u32 {
        self.port_capacity
    }

    fn set_used(&mut self, used: u32) {
        self.used_ports = used;
    }
}

/// A keyed table that never creates entries implicitly.
#[derive(Debug, Clone)]
pub struct Table<K, V> {
    inner: HashMap<K, V>,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the value for `key`. **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Returns the value for `key` mutably. **This never creates entries.**
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// Inserts a row, returning the previous value if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.inner.values_mut()
    }
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash,
    V: CapacityCounter,
{
    /// Takes one unit of the counter at `key`.
    ///
    /// **This never creates entries.**
    pub fn acquire(&mut self, key: &K) -> Result<u32, TableError> {
        match self.inner.get_mut(key) {
            Some(counter) => counter.try_acquire().ok_or(TableError::CapacityExhausted),
            None => Err(TableError::KeyNotFound),
        }
    }

    /// Returns one unit of the counter at `key`.
    pub fn release(&mut self, key: &K) -> Result<u32, TableError> {
        match self.inner.get_mut(key) {
            Some(counter) => counter.try_release().ok_or(TableError::CounterUnderflow),
            None => Err(TableError::KeyNotFound),
        }
    }

    /// Returns the usage at `key`, or `None` if the key is not found.
    pub fn used(&self, key: &K) -> Option<u32> {
        self.inner.get(key).map(|c| c.used())
    }
}

impl<K, V> Default for Table<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic id generator starting at 1.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibernet_types::SplitterPorts;

    #[test]
    fn test_get_does_not_create_entry() {
        let table: Table<u64, SplitterPorts> = Table::new();
        assert!(table.get(&1).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_acquire_until_full() {
        let mut table: Table<u64, SplitterPorts> = Table::new();
        table.insert(1, SplitterPorts::new(2));

        assert_eq!(table.acquire(&1), Ok(1));
        assert_eq!(table.acquire(&1), Ok(2));
        assert_eq!(table.acquire(&1), Err(TableError::CapacityExhausted));
        assert_eq!(table.used(&1), Some(2));
    }

    #[test]
    fn test_release_underflow() {
        let mut table: Table<u64, SplitterPorts> = Table::new();
        table.insert(1, SplitterPorts::new(4));
        assert_eq!(table.release(&1), Err(TableError::CounterUnderflow));
        assert_eq!(table.used(&1), Some(0));
    }

    #[test]
    fn test_missing_key_never_vivified() {
        let mut table: Table<u64, SplitterPorts> = Table::new();
        assert_eq!(table.acquire(&9), Err(TableError::KeyNotFound));
        assert_eq!(table.release(&9), Err(TableError::KeyNotFound));
        assert!(!table.contains_key(&9));
    }

    #[test]
    fn test_id_sequence() {
        let seq = IdSequence::new();
        assert_eq!(seq.next_id(), 1);
        assert_eq!(seq.next_id(), 2);
    }
}
