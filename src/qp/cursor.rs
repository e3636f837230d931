//! Ordered successor/predecessor cursor.
//!
//! `next_after(None)` yields the minimum key; `next_after(Some(k))` yields
//! the smallest key strictly greater than `k`, whether or not `k` is still
//! present. The cursor re-descends per step (snapshot semantics): a NearTwig
//! descent finds the divergence offset, then a second walk records the
//! deepest right-sibling subtree before descending it leftmost. A key
//! deleted concurrently with the step may still be returned once.

use crossbeam_epoch::{self as epoch, Guard, Shared};
use std::sync::atomic::Ordering;

use super::bitmap::key_bit;
use super::node::{BranchState, Node};
use super::trie::QpTrie;

impl<V: Clone> QpTrie<V> {
    /// Smallest entry strictly after `current` (or the minimum for `None`).
    pub(crate) fn next_after(&self, current: Option<&[u8]>) -> Option<(String, V)> {
        let guard = &epoch::pin();
        let root = self.root.load(Ordering::Acquire, guard);
        if root.is_null() {
            return None;
        }
        let key = match current {
            None => return descend_min(root, guard),
            Some(key) => key,
        };

        let near_key = near_leaf_key(root, key, guard);
        let diff = common_prefix(key, near_key).min(key.len());

        // Second walk: remember the deepest subtree that sorts just after
        // the current key, then take its minimum.
        let mut candidate: Shared<'_, Node<V>> = Shared::null();
        let mut node = root;
        loop {
            match unsafe { node.deref() } {
                Node::Leaf(leaf) => {
                    if *leaf.key > *key {
                        candidate = node;
                    }
                    break;
                }
                Node::Branch(branch) => {
                    if branch.key_offset > diff {
                        // The whole subtree compares like the near leaf.
                        if near_key > key {
                            candidate = node;
                        }
                        break;
                    }
                    let state = unsafe { branch.state.load(Ordering::Acquire, guard).deref() };
                    let bit = key_bit(key, branch.key_offset);
                    if state.has(bit) {
                        let slot = state.slot_of(bit);
                        if slot + 1 < state.len() {
                            candidate = state.twig(slot + 1, guard);
                        }
                        node = state.twig(slot, guard);
                    } else {
                        // Slot of the first greater twig; nothing below it
                        // can follow the current key.
                        let slot = state.slot_of(bit);
                        if slot < state.len() {
                            candidate = state.twig(slot, guard);
                        }
                        break;
                    }
                }
            }
        }
        if candidate.is_null() {
            None
        } else {
            descend_min(candidate, guard)
        }
    }

    /// Largest entry strictly before `current` (or the maximum for `None`).
    pub(crate) fn prev_before(&self, current: Option<&[u8]>) -> Option<(String, V)> {
        let guard = &epoch::pin();
        let root = self.root.load(Ordering::Acquire, guard);
        if root.is_null() {
            return None;
        }
        let key = match current {
            None => return descend_max(root, guard),
            Some(key) => key,
        };

        let near_key = near_leaf_key(root, key, guard);
        let diff = common_prefix(key, near_key).min(key.len());

        let mut candidate: Shared<'_, Node<V>> = Shared::null();
        let mut node = root;
        loop {
            match unsafe { node.deref() } {
                Node::Leaf(leaf) => {
                    if *leaf.key < *key {
                        candidate = node;
                    }
                    break;
                }
                Node::Branch(branch) => {
                    if branch.key_offset > diff {
                        if near_key < key {
                            candidate = node;
                        }
                        break;
                    }
                    let state = unsafe { branch.state.load(Ordering::Acquire, guard).deref() };
                    let bit = key_bit(key, branch.key_offset);
                    if state.has(bit) {
                        let slot = state.slot_of(bit);
                        if slot > 0 {
                            candidate = state.twig(slot - 1, guard);
                        }
                        node = state.twig(slot, guard);
                    } else {
                        let slot = state.slot_of(bit);
                        if slot > 0 {
                            candidate = state.twig(slot - 1, guard);
                        }
                        break;
                    }
                }
            }
        }
        if candidate.is_null() {
            None
        } else {
            descend_max(candidate, guard)
        }
    }
}

/// NearTwig descent: follow the key's bits, slot 0 where absent; the
/// resulting leaf shares the longest realizable prefix with `key`.
fn near_leaf_key<'g, V>(root: Shared<'g, Node<V>>, key: &[u8], guard: &'g Guard) -> &'g [u8] {
    let mut node = root;
    loop {
        match unsafe { node.deref() } {
            Node::Leaf(leaf) => return &leaf.key,
            Node::Branch(branch) => {
                let state: &BranchState<V> =
                    unsafe { branch.state.load(Ordering::Acquire, guard).deref() };
                let bit = key_bit(key, branch.key_offset);
                let slot = if state.has(bit) { state.slot_of(bit) } else { 0 };
                node = state.twig(slot, guard);
            }
        }
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    super::bitmap::first_diff_offset(a, b).unwrap_or(a.len().min(b.len()))
}

fn descend_min<V: Clone>(node: Shared<'_, Node<V>>, guard: &Guard) -> Option<(String, V)> {
    descend_edge(node, guard, false)
}

fn descend_max<V: Clone>(node: Shared<'_, Node<V>>, guard: &Guard) -> Option<(String, V)> {
    descend_edge(node, guard, true)
}

fn descend_edge<V: Clone>(
    node: Shared<'_, Node<V>>,
    guard: &Guard,
    max: bool,
) -> Option<(String, V)> {
    let mut node = node;
    loop {
        match unsafe { node.deref() } {
            Node::Leaf(leaf) => return Some((leaf.name.to_string(), leaf.value.clone())),
            Node::Branch(branch) => {
                let state = unsafe { branch.state.load(Ordering::Acquire, guard).deref() };
                let slot = if max { state.len() - 1 } else { 0 };
                node = state.twig(slot, guard);
            }
        }
    }
}
