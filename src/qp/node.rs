//! QP-trie node representation.
//!
//! A node is a tagged sum of `Leaf | Branch`. Leaves are immutable. A
//! branch owns only its key offset and an atomic pointer to an immutable
//! `BranchState`; the `(bitmap, twigs)` pair is always published together
//! through that single pointer, so one acquire load gives a reader a
//! self-consistent view.
//!
//! Ownership discipline: twig pointers inside a `BranchState` are plain
//! epoch `Atomic`s that never own their targets. Dropping a state frees the
//! twig array only; nodes are reclaimed explicitly by whoever unlinks them.

use crossbeam_epoch::{Atomic, Guard, Owned, Shared};
use std::sync::atomic::Ordering;

use super::bitmap::{bit_mask, has_bit, twig_index};

pub(crate) struct Leaf<V> {
    /// Canonical presentation form (case-folded when the trie folds).
    pub name: Box<str>,
    /// Encoded wire key; equality is decided by comparing this, never by
    /// descent alone.
    pub key: Box<[u8]>,
    pub value: V,
}

pub(crate) struct Branch<V> {
    pub key_offset: usize,
    pub state: Atomic<BranchState<V>>,
}

pub(crate) enum Node<V> {
    Leaf(Leaf<V>),
    Branch(Branch<V>),
}

impl<V> Node<V> {
    pub(crate) fn leaf(name: &str, key: &[u8], value: V) -> Owned<Node<V>> {
        Owned::new(Node::Leaf(Leaf {
            name: name.into(),
            key: key.into(),
            value,
        }))
    }

    pub(crate) fn as_branch(&self) -> Option<&Branch<V>> {
        match self {
            Node::Branch(branch) => Some(branch),
            Node::Leaf(_) => None,
        }
    }
}

pub(crate) struct BranchState<V> {
    pub bitmap: u64,
    pub twigs: Box<[Atomic<Node<V>>]>,
}

impl<V> BranchState<V> {
    /// Two-twig state for a fresh branch; twigs ordered by ascending bit.
    pub(crate) fn pair(
        low_bit: u8,
        low: Shared<'_, Node<V>>,
        high_bit: u8,
        high: Shared<'_, Node<V>>,
    ) -> Owned<BranchState<V>> {
        debug_assert!(low_bit < high_bit);
        Owned::new(BranchState {
            bitmap: bit_mask(low_bit) | bit_mask(high_bit),
            twigs: vec![Atomic::from(low), Atomic::from(high)].into_boxed_slice(),
        })
    }

    pub(crate) fn has(&self, bit: u8) -> bool {
        has_bit(self.bitmap, bit)
    }

    pub(crate) fn slot_of(&self, bit: u8) -> usize {
        twig_index(self.bitmap, bit)
    }

    pub(crate) fn len(&self) -> usize {
        self.twigs.len()
    }

    pub(crate) fn twig<'g>(&self, slot: usize, guard: &'g Guard) -> Shared<'g, Node<V>> {
        self.twigs[slot].load(Ordering::Acquire, guard)
    }

    /// Copy with the twig at `slot` replaced.
    pub(crate) fn with_replaced(
        &self,
        slot: usize,
        node: Shared<'_, Node<V>>,
        guard: &Guard,
    ) -> Owned<BranchState<V>> {
        let mut twigs = Vec::with_capacity(self.twigs.len());
        for (i, twig) in self.twigs.iter().enumerate() {
            if i == slot {
                twigs.push(Atomic::from(node));
            } else {
                twigs.push(Atomic::from(twig.load(Ordering::Acquire, guard)));
            }
        }
        Owned::new(BranchState {
            bitmap: self.bitmap,
            twigs: twigs.into_boxed_slice(),
        })
    }

    /// Copy with `bit` added and `node` spliced into its sorted slot.
    pub(crate) fn with_inserted(
        &self,
        bit: u8,
        node: Shared<'_, Node<V>>,
        guard: &Guard,
    ) -> Owned<BranchState<V>> {
        debug_assert!(!self.has(bit));
        let slot = self.slot_of(bit);
        let mut twigs = Vec::with_capacity(self.twigs.len() + 1);
        for twig in &self.twigs[..slot] {
            twigs.push(Atomic::from(twig.load(Ordering::Acquire, guard)));
        }
        twigs.push(Atomic::from(node));
        for twig in &self.twigs[slot..] {
            twigs.push(Atomic::from(twig.load(Ordering::Acquire, guard)));
        }
        Owned::new(BranchState {
            bitmap: self.bitmap | bit_mask(bit),
            twigs: twigs.into_boxed_slice(),
        })
    }

    /// Copy with `bit` cleared and its twig dropped from the array.
    pub(crate) fn with_removed(&self, bit: u8, guard: &Guard) -> Owned<BranchState<V>> {
        debug_assert!(self.has(bit));
        let slot = self.slot_of(bit);
        let mut twigs = Vec::with_capacity(self.twigs.len() - 1);
        for (i, twig) in self.twigs.iter().enumerate() {
            if i != slot {
                twigs.push(Atomic::from(twig.load(Ordering::Acquire, guard)));
            }
        }
        Owned::new(BranchState {
            bitmap: self.bitmap & !bit_mask(bit),
            twigs: twigs.into_boxed_slice(),
        })
    }

    /// Structural sanity: `popcount(bitmap & mask) == twigs.len()`.
    #[cfg(test)]
    pub(crate) fn check_invariant(&self) -> bool {
        super::bitmap::twig_count(self.bitmap) == self.twigs.len()
            && super::bitmap::bits_below(2) & self.bitmap == 0
    }
}
