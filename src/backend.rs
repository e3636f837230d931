//! Shared operation surface implemented by both backends.

use crate::error::Result;

/// A domain-name keyed store.
///
/// Silent operations (`try_add`, `try_get`, `contains`, `try_remove`)
/// convert input errors (invalid names) into `false`/`None`; state and
/// integrity errors still surface where the signature allows it.
pub trait NameStore<V> {
    /// Insert a new entry; `AlreadyExists` when the name is present.
    fn add(&self, name: &str, value: V) -> Result<()>;

    /// Insert a new entry, returning `false` when the name is present or
    /// invalid. Never fails on an invalid domain.
    fn try_add(&self, name: &str, value: V) -> bool;

    /// Look up a value; `KeyNotFound` when absent.
    fn get(&self, name: &str) -> Result<V>;

    /// Look up a value, `Ok(None)` when absent or the name is invalid.
    /// Integrity and I/O errors still surface.
    fn try_get(&self, name: &str) -> Result<Option<V>>;

    /// Membership check.
    fn contains(&self, name: &str) -> bool;

    /// Return the existing value or insert the one produced by `make`.
    /// The factory runs at most once per missing key.
    fn get_or_add<F: FnOnce() -> V>(&self, name: &str, make: F) -> Result<V>;

    /// Atomic read-modify-write: insert `add()` when absent, else replace
    /// with `update(current)`. Returns the stored value. The factories may
    /// run more than once when the lock-free backend loses a race.
    fn add_or_update<A: FnMut() -> V, U: FnMut(V) -> V>(
        &self,
        name: &str,
        add: A,
        update: U,
    ) -> Result<V>;

    /// Compare-and-set: replace with `new_value` only when the stored value
    /// equals `expected`. Returns whether the swap happened.
    fn try_update(&self, name: &str, new_value: V, expected: V) -> Result<bool>;

    /// Remove an entry, returning the removed value. Absence and invalid
    /// names yield `Ok(None)`.
    fn try_remove(&self, name: &str) -> Result<Option<V>>;

    /// Drop every entry. On the snapshot store this clears staging only;
    /// the active snapshot changes at the next publish.
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered traversal, ascending by encoded key.
    fn enumerate(&self) -> Box<dyn Iterator<Item = Result<(String, V)>> + '_>;

    /// Ordered traversal, descending by encoded key.
    fn reverse_enumerate(&self) -> Box<dyn Iterator<Item = Result<(String, V)>> + '_>;
}
