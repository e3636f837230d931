use std::time::Instant;

use crate::backend::NameStore;
use crate::codec::ValueCodec;
use crate::error::{Result, StoreError};
use crate::name;
use crate::mmap::staging::StagingTrie;

use super::iter::MmapIter;
use super::MmapStore;

impl<C: ValueCodec> MmapStore<C> {
    /// Insert a new entry into staging.
    ///
    /// # Errors
    ///
    /// * `InvalidName` - the domain fails RFC 1035 validation
    /// * `AlreadyExists` - the name already holds a value
    /// * `Disposed` - the store has been closed
    pub fn add(&self, name: &str, value: &C::Value) -> Result<()> {
        self.ensure_open()?;
        let start = Instant::now();
        let key = name::encode_reverse(name)?;
        let bytes = self.codec().encode(value);
        let result = self.with_staging(|staging| {
            if staging.insert(&key, bytes, false) {
                Ok(())
            } else {
                Err(StoreError::AlreadyExists)
            }
        });
        if result.is_ok() {
            self.stats
                .record_add(start.elapsed().as_nanos() as u64, false);
        }
        result
    }

    /// Insert returning `false` instead of failing; never errors on an
    /// invalid domain.
    pub fn try_add(&self, name: &str, value: &C::Value) -> bool {
        self.add(name, value).is_ok()
    }

    /// Insert or overwrite an entry.
    pub fn put(&self, name: &str, value: &C::Value) -> Result<()> {
        self.ensure_open()?;
        let start = Instant::now();
        let key = name::encode_reverse(name)?;
        let bytes = self.codec().encode(value);
        self.with_staging(|staging| {
            staging.insert(&key, bytes, true);
            Ok(())
        })?;
        self.stats
            .record_add(start.elapsed().as_nanos() as u64, true);
        Ok(())
    }

    /// Look up a value.
    ///
    /// Reads staged state once any mutation has materialized the staging
    /// trie, otherwise the active snapshot (zero-copy until decode).
    pub fn get(&self, name: &str) -> Result<C::Value> {
        self.ensure_open()?;
        let start = Instant::now();
        let key = name::encode_reverse(name)?;
        let result = self.read_value(&key, |bytes| match bytes {
            Some(bytes) => self.codec().decode(bytes),
            None => Err(StoreError::KeyNotFound),
        });
        // Corrupt/I/O failures are counted at their source; only a genuine
        // miss goes into the not-found counter.
        let found = !matches!(result, Err(StoreError::KeyNotFound));
        self.stats
            .record_get(start.elapsed().as_nanos() as u64, found);
        result
    }

    /// Non-failing lookup; `Ok(None)` for absent keys and invalid names,
    /// errors only for integrity and I/O failures.
    pub fn try_get(&self, name: &str) -> Result<Option<C::Value>> {
        match self.get(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_input_error() => Ok(None),
            Err(StoreError::KeyNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        let Ok(key) = name::encode_reverse(name) else {
            return false;
        };
        if self.ensure_open().is_err() {
            return false;
        }
        self.read_value(&key, |bytes| Ok(bytes.is_some()))
            .unwrap_or(false)
    }

    /// Return the existing value or insert the one produced by `make`.
    /// The factory runs at most once, under the staging lock.
    pub fn get_or_add<F: FnOnce() -> C::Value>(&self, name: &str, make: F) -> Result<C::Value> {
        self.ensure_open()?;
        let key = name::encode_reverse(name)?;
        self.with_staging(|staging| {
            if let Some(bytes) = staging.get(&key) {
                return self.codec().decode(bytes);
            }
            let value = make();
            staging.insert(&key, self.codec().encode(&value), true);
            Ok(value)
        })
    }

    /// Atomic insert-or-replace under the staging lock.
    pub fn add_or_update<A, U>(&self, name: &str, mut add: A, mut update: U) -> Result<C::Value>
    where
        A: FnMut() -> C::Value,
        U: FnMut(C::Value) -> C::Value,
    {
        self.ensure_open()?;
        let key = name::encode_reverse(name)?;
        self.with_staging(|staging| {
            let value = match staging.get(&key) {
                Some(bytes) => update(self.codec().decode(bytes)?),
                None => add(),
            };
            staging.insert(&key, self.codec().encode(&value), true);
            Ok(value)
        })
    }

    /// Compare-and-set on the encoded value bytes.
    pub fn try_update(
        &self,
        name: &str,
        new_value: &C::Value,
        expected: &C::Value,
    ) -> Result<bool> {
        self.ensure_open()?;
        let key = name::encode_reverse(name)?;
        let expected_bytes = self.codec().encode(expected);
        let new_bytes = self.codec().encode(new_value);
        self.with_staging(|staging| match staging.get(&key) {
            Some(current) if current[..] == expected_bytes[..] => {
                staging.insert(&key, new_bytes, true);
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    /// Remove an entry from staging, returning the removed value.
    pub fn try_remove(&self, name: &str) -> Result<Option<C::Value>> {
        self.ensure_open()?;
        let start = Instant::now();
        let Ok(key) = name::encode_reverse(name) else {
            return Ok(None);
        };
        let removed = self.with_staging(|staging| match staging.remove(&key) {
            Some(bytes) => Ok(Some(self.codec().decode(&bytes)?)),
            None => Ok(None),
        })?;
        if removed.is_some() {
            self.stats
                .record_remove(start.elapsed().as_nanos() as u64);
        }
        Ok(removed)
    }

    /// Batch insert-or-overwrite under a single staging-lock acquisition.
    pub fn extend<'a, I>(&self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, C::Value)>,
    {
        self.ensure_open()?;
        let mut encoded = Vec::new();
        for (name, value) in items {
            let key = name::encode_reverse(name)?;
            encoded.push((key, self.codec().encode(&value)));
        }
        let count = encoded.len();
        self.with_staging(|staging| {
            for (key, bytes) in encoded {
                staging.insert(&key, bytes, true);
            }
            Ok(())
        })?;
        Ok(count)
    }

    /// Reset staging to empty. The active snapshot is untouched until the
    /// next `swap()`.
    pub fn clear(&self) {
        if self.is_disposed() {
            return;
        }
        *self.staging.lock() = Some(StagingTrie::new());
        self.stats
            .entry_count
            .store(0, std::sync::atomic::Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.live_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered forward traversal of the active snapshot.
    pub fn enumerate(&self) -> MmapIter<'_, C> {
        MmapIter::new(self, true)
    }

    /// Ordered reverse traversal of the active snapshot.
    pub fn reverse_enumerate(&self) -> MmapIter<'_, C> {
        MmapIter::new(self, false)
    }
}

impl<C: ValueCodec> NameStore<C::Value> for MmapStore<C> {
    fn add(&self, name: &str, value: C::Value) -> Result<()> {
        MmapStore::add(self, name, &value)
    }

    fn try_add(&self, name: &str, value: C::Value) -> bool {
        MmapStore::try_add(self, name, &value)
    }

    fn get(&self, name: &str) -> Result<C::Value> {
        MmapStore::get(self, name)
    }

    fn try_get(&self, name: &str) -> Result<Option<C::Value>> {
        MmapStore::try_get(self, name)
    }

    fn contains(&self, name: &str) -> bool {
        MmapStore::contains(self, name)
    }

    fn get_or_add<F: FnOnce() -> C::Value>(&self, name: &str, make: F) -> Result<C::Value> {
        MmapStore::get_or_add(self, name, make)
    }

    fn add_or_update<A: FnMut() -> C::Value, U: FnMut(C::Value) -> C::Value>(
        &self,
        name: &str,
        add: A,
        update: U,
    ) -> Result<C::Value> {
        MmapStore::add_or_update(self, name, add, update)
    }

    fn try_update(&self, name: &str, new_value: C::Value, expected: C::Value) -> Result<bool> {
        MmapStore::try_update(self, name, &new_value, &expected)
    }

    fn try_remove(&self, name: &str) -> Result<Option<C::Value>> {
        MmapStore::try_remove(self, name)
    }

    fn clear(&self) {
        MmapStore::clear(self)
    }

    fn len(&self) -> usize {
        MmapStore::len(self)
    }

    fn enumerate(&self) -> Box<dyn Iterator<Item = Result<(String, C::Value)>> + '_> {
        Box::new(MmapStore::enumerate(self))
    }

    fn reverse_enumerate(&self) -> Box<dyn Iterator<Item = Result<(String, C::Value)>> + '_> {
        Box::new(MmapStore::reverse_enumerate(self))
    }
}
