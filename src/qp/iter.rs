//! Stateless cursor-driven enumeration.
//!
//! The iterator carries only the last-returned name and re-runs the cursor
//! per step, so it never pins epoch memory between steps and tolerates
//! concurrent mutation (snapshot-per-step semantics).

use super::QpStore;

pub struct QpIter<'a, V> {
    store: &'a QpStore<V>,
    last: Option<String>,
    forward: bool,
    done: bool,
}

impl<'a, V> QpIter<'a, V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(store: &'a QpStore<V>, forward: bool) -> Self {
        Self {
            store,
            last: None,
            forward,
            done: false,
        }
    }
}

impl<V> Iterator for QpIter<'_, V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    type Item = (String, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = if self.forward {
            self.store.try_get_next(self.last.as_deref())
        } else {
            self.store.try_get_prev(self.last.as_deref())
        };
        match step {
            Ok(Some((name, value))) => {
                self.last = Some(name.clone());
                Some((name, value))
            }
            // The cursor re-encodes the last returned name; it was accepted
            // when stored, so an error here means exhaustion.
            Ok(None) | Err(_) => {
                self.done = true;
                None
            }
        }
    }
}
