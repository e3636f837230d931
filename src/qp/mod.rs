//! Lock-free QP-trie backend.
//!
//! A case-insensitive (by default) ordered trie keyed by the 51-bit
//! popcount bitmap encoding of wire-form domain names. Readers are
//! wait-free; writers publish through CAS on immutable branch states and
//! may spin under contention on the same branch, but never block.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::NameStore;
use crate::error::{Result, StoreError};
use crate::name::wire;
use crate::stats::{Statistics, StatsSnapshot};

pub(crate) mod bitmap;
pub(crate) mod bulk;
pub(crate) mod cursor;
pub(crate) mod node;
pub(crate) mod trie;

mod iter;

pub use iter::QpIter;

use bulk::BulkEntry;
use trie::{QpTrie, Upsert};

/// Domain-name keyed in-memory store over the lock-free QP-trie.
pub struct QpStore<V> {
    trie: QpTrie<V>,
    fold: bool,
    stats: Arc<Statistics>,
}

impl<V> Default for QpStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> QpStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Case-insensitive store (names are folded to lowercase).
    pub fn new() -> Self {
        Self::with_case_sensitivity(false)
    }

    /// `case_sensitive = true` keeps ASCII case distinctions in both the
    /// stored names and the ordering.
    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self {
            trie: QpTrie::new(),
            fold: !case_sensitive,
            stats: Arc::new(Statistics::new()),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats
            .entry_count
            .store(self.trie.len(), Ordering::Release);
        self.stats.snapshot()
    }

    fn canonical(&self, name: &str) -> String {
        if self.fold {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    fn encode(&self, name: &str) -> Result<Vec<u8>> {
        wire::encode_wire(name, self.fold)
    }

    /// Insert or update; `true` when a new entry was created.
    pub fn set(&self, name: &str, value: V) -> Result<bool> {
        let start = Instant::now();
        let key = self.encode(name)?;
        let canonical = self.canonical(name);
        let inserted = match self.trie.upsert(&canonical, &key, &value, false) {
            Upsert::Inserted => true,
            Upsert::Updated | Upsert::Rejected => false,
        };
        self.stats
            .record_add(start.elapsed().as_nanos() as u64, !inserted);
        Ok(inserted)
    }

    pub fn add(&self, name: &str, value: V) -> Result<()> {
        let start = Instant::now();
        let key = self.encode(name)?;
        let canonical = self.canonical(name);
        match self.trie.upsert(&canonical, &key, &value, true) {
            Upsert::Inserted => {
                self.stats
                    .record_add(start.elapsed().as_nanos() as u64, false);
                Ok(())
            }
            Upsert::Rejected => Err(StoreError::AlreadyExists),
            Upsert::Updated => Err(StoreError::AlreadyExists),
        }
    }

    pub fn try_add(&self, name: &str, value: V) -> bool {
        self.add(name, value).is_ok()
    }

    pub fn get(&self, name: &str) -> Result<V> {
        let start = Instant::now();
        let key = self.encode(name)?;
        let result = self.trie.get_value(&key).ok_or(StoreError::KeyNotFound);
        self.stats
            .record_get(start.elapsed().as_nanos() as u64, result.is_ok());
        result
    }

    pub fn try_get(&self, name: &str) -> Option<V> {
        let key = self.encode(name).ok()?;
        self.trie.get_value(&key)
    }

    pub fn contains(&self, name: &str) -> bool {
        match self.encode(name) {
            Ok(key) => self.trie.contains(&key),
            Err(_) => false,
        }
    }

    /// Return the existing value or insert the one produced by `make`.
    /// The factory runs at most once; losing an insert race returns the
    /// racing winner's value.
    pub fn get_or_add<F: FnOnce() -> V>(&self, name: &str, make: F) -> Result<V> {
        let key = self.encode(name)?;
        if let Some(existing) = self.trie.get_value(&key) {
            return Ok(existing);
        }
        let canonical = self.canonical(name);
        let value = make();
        loop {
            match self.trie.upsert(&canonical, &key, &value, true) {
                Upsert::Inserted => return Ok(value),
                Upsert::Rejected => match self.trie.get_value(&key) {
                    Some(existing) => return Ok(existing),
                    // Deleted between attempts: insert again.
                    None => continue,
                },
                Upsert::Updated => return Ok(value),
            }
        }
    }

    /// Lock-free read-modify-write loop; the factories may run once per
    /// CAS retry.
    pub fn add_or_update<A, U>(&self, name: &str, mut add: A, mut update: U) -> Result<V>
    where
        A: FnMut() -> V,
        U: FnMut(V) -> V,
    {
        let key = self.encode(name)?;
        let canonical = self.canonical(name);
        loop {
            match self.trie.get_value(&key) {
                None => {
                    let value = add();
                    if self.trie.upsert(&canonical, &key, &value, true) == Upsert::Inserted {
                        return Ok(value);
                    }
                }
                Some(current) => {
                    let value = update(current.clone());
                    match self
                        .trie
                        .replace_if(&canonical, &key, &value, |v| *v == current)
                    {
                        Some(true) => return Ok(value),
                        Some(false) | None => continue,
                    }
                }
            }
        }
    }

    /// Compare-and-set against the expected value.
    pub fn try_update(&self, name: &str, new_value: V, expected: V) -> Result<bool> {
        let key = self.encode(name)?;
        let canonical = self.canonical(name);
        Ok(self
            .trie
            .replace_if(&canonical, &key, &new_value, |v| *v == expected)
            .unwrap_or(false))
    }

    pub fn try_remove(&self, name: &str) -> Result<Option<V>> {
        let start = Instant::now();
        let Ok(key) = self.encode(name) else {
            return Ok(None);
        };
        let removed = self.trie.remove(&key);
        if removed.is_some() {
            self.stats
                .record_remove(start.elapsed().as_nanos() as u64);
        }
        Ok(removed)
    }

    /// Drop the root; the old tree is reclaimed once readers drain.
    pub fn clear(&self) {
        self.trie.clear();
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// Root-pointer fast path.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Replace the contents from a batch, last occurrence winning per
    /// duplicate name. Equivalent to inserting in order with `set`.
    pub fn bulk_load<I, S>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for (name, value) in items {
            let name = name.as_ref();
            entries.push(BulkEntry {
                name: self.canonical(name).into_boxed_str(),
                key: self.encode(name)?.into_boxed_slice(),
                value,
            });
        }
        let count = entries.len();
        self.trie.bulk_load(entries);
        Ok(count)
    }

    /// Cursor step: smallest entry strictly after `current`.
    pub fn try_get_next(&self, current: Option<&str>) -> Result<Option<(String, V)>> {
        let key = match current {
            None => None,
            Some(name) => Some(self.encode(name)?),
        };
        Ok(self.trie.next_after(key.as_deref()))
    }

    /// Cursor step: largest entry strictly before `current`.
    pub fn try_get_prev(&self, current: Option<&str>) -> Result<Option<(String, V)>> {
        let key = match current {
            None => None,
            Some(name) => Some(self.encode(name)?),
        };
        Ok(self.trie.prev_before(key.as_deref()))
    }

    pub fn enumerate(&self) -> QpIter<'_, V> {
        self.stats
            .total_enumerations
            .fetch_add(1, Ordering::Relaxed);
        QpIter::new(self, true)
    }

    pub fn reverse_enumerate(&self) -> QpIter<'_, V> {
        self.stats
            .total_enumerations
            .fetch_add(1, Ordering::Relaxed);
        QpIter::new(self, false)
    }

    #[cfg(test)]
    pub(crate) fn trie(&self) -> &QpTrie<V> {
        &self.trie
    }
}

impl<V> NameStore<V> for QpStore<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn add(&self, name: &str, value: V) -> Result<()> {
        QpStore::add(self, name, value)
    }

    fn try_add(&self, name: &str, value: V) -> bool {
        QpStore::try_add(self, name, value)
    }

    fn get(&self, name: &str) -> Result<V> {
        QpStore::get(self, name)
    }

    fn try_get(&self, name: &str) -> Result<Option<V>> {
        Ok(QpStore::try_get(self, name))
    }

    fn contains(&self, name: &str) -> bool {
        QpStore::contains(self, name)
    }

    fn get_or_add<F: FnOnce() -> V>(&self, name: &str, make: F) -> Result<V> {
        QpStore::get_or_add(self, name, make)
    }

    fn add_or_update<A: FnMut() -> V, U: FnMut(V) -> V>(
        &self,
        name: &str,
        add: A,
        update: U,
    ) -> Result<V> {
        QpStore::add_or_update(self, name, add, update)
    }

    fn try_update(&self, name: &str, new_value: V, expected: V) -> Result<bool> {
        QpStore::try_update(self, name, new_value, expected)
    }

    fn try_remove(&self, name: &str) -> Result<Option<V>> {
        QpStore::try_remove(self, name)
    }

    fn clear(&self) {
        QpStore::clear(self)
    }

    fn len(&self) -> usize {
        QpStore::len(self)
    }

    fn is_empty(&self) -> bool {
        QpStore::is_empty(self)
    }

    fn enumerate(&self) -> Box<dyn Iterator<Item = Result<(String, V)>> + '_> {
        Box::new(QpStore::enumerate(self).map(Ok))
    }

    fn reverse_enumerate(&self) -> Box<dyn Iterator<Item = Result<(String, V)>> + '_> {
        Box::new(QpStore::reverse_enumerate(self).map(Ok))
    }
}
