// 🧠 Memo - run-scoped key → value cache
//
// One instance per resolution function (postcode → point, indicator → outreach
// type, (firm, account) → office, ...). The resolver is passed at call time so
// it can borrow the store and geocoder of the current run.
//
// Not synchronised: a Memo belongs to exactly one import worker.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Memo {
            entries: HashMap::new(),
        }
    }

    /// Return the cached value for `key`, computing it with `f` on first use.
    ///
    /// Whatever `f` returns is cached, including `None` for a failed
    /// resolution, so `f` runs at most once per key until `clear()`.
    pub fn resolve<F>(&mut self, key: K, f: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(value) = self.entries.get(&key) {
            return value.clone();
        }
        let value = f(&key);
        self.entries.insert(key, value.clone());
        value
    }

    /// Like `resolve`, but an `Err` from `f` is returned without being cached,
    /// so the next call for the same key tries again.
    pub fn try_resolve<F, E>(&mut self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.entries.get(&key) {
            return Ok(value.clone());
        }
        let value = f(&key)?;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    /// Seed an entry without calling any resolver
    pub fn prime(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, V> Default for Memo<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
