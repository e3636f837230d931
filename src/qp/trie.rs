//! Lock-free QP-trie: wait-free readers, CAS-publishing writers.
//!
//! All mutation is published through two kinds of single pointer swaps:
//! the root pointer, and a branch's `state` pointer (which carries the
//! `(bitmap, twigs)` pair as one immutable unit). Writers that lose a CAS
//! restart from the root. Unlinked leaves and states are handed to the
//! epoch collector so readers holding a pin never observe freed memory.
//!
//! Reclamation is shallow and explicit: dropping a `BranchState` frees only
//! its twig array, so every path that unlinks a node says exactly which
//! nodes die with it. A branch node is reclaimed together with whatever
//! state it holds at reclamation time, which keeps a racing state swap on
//! a just-collapsed branch from double-freeing.

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::bitmap::{first_diff_offset, key_bit, twig_count};
use super::node::{Branch, BranchState, Leaf, Node};

pub(crate) struct QpTrie<V> {
    pub(super) root: CachePadded<Atomic<Node<V>>>,
    pub(super) count: CachePadded<AtomicUsize>,
}

/// What an upsert attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    Inserted,
    Updated,
    /// Key already present and `only_if_absent` was requested.
    Rejected,
}

impl<V: Clone> QpTrie<V> {
    pub(crate) fn new() -> Self {
        Self {
            root: CachePadded::new(Atomic::null()),
            count: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Root-pointer fast path; exact under quiescence.
    pub(crate) fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        self.root.load(Ordering::Acquire, guard).is_null()
    }

    /// Wait-free lookup: one atomic load per branch, no allocation.
    pub(crate) fn get<R>(&self, key: &[u8], read: impl FnOnce(&Leaf<V>) -> R) -> Option<R> {
        let guard = &epoch::pin();
        let mut node = self.root.load(Ordering::Acquire, guard);
        while !node.is_null() {
            match unsafe { node.deref() } {
                Node::Branch(branch) => {
                    let state = unsafe { branch.state.load(Ordering::Acquire, guard).deref() };
                    let bit = key_bit(key, branch.key_offset);
                    if !state.has(bit) {
                        return None;
                    }
                    node = state.twig(state.slot_of(bit), guard);
                }
                Node::Leaf(leaf) => {
                    return if *leaf.key == *key {
                        Some(read(leaf))
                    } else {
                        None
                    };
                }
            }
        }
        None
    }

    pub(crate) fn get_value(&self, key: &[u8]) -> Option<V> {
        self.get(key, |leaf| leaf.value.clone())
    }

    pub(crate) fn contains(&self, key: &[u8]) -> bool {
        self.get(key, |_| ()).is_some()
    }

    /// Insert or update `key`. With `only_if_absent`, an existing entry is
    /// left alone and `Rejected` is returned.
    pub(crate) fn upsert(
        &self,
        name: &str,
        key: &[u8],
        value: &V,
        only_if_absent: bool,
    ) -> Upsert {
        let guard = &epoch::pin();
        loop {
            let root = self.root.load(Ordering::Acquire, guard);
            if root.is_null() {
                let leaf = Node::leaf(name, key, value.clone());
                match self.root.compare_exchange(
                    Shared::null(),
                    leaf,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => {
                        self.count.fetch_add(1, Ordering::Relaxed);
                        return Upsert::Inserted;
                    }
                    Err(_) => continue,
                }
            }

            // NearTwig descent: follow the key's bits, falling back to slot
            // 0 where a bit is absent. Any nearby leaf works for computing
            // the first divergence offset.
            let mut near_parent: Shared<'_, Node<V>> = Shared::null();
            let mut near_state: Shared<'_, BranchState<V>> = Shared::null();
            let mut near_slot = 0usize;
            let mut node = root;
            let near = loop {
                match unsafe { node.deref() } {
                    Node::Branch(branch) => {
                        let state = branch.state.load(Ordering::Acquire, guard);
                        let state_ref = unsafe { state.deref() };
                        let bit = key_bit(key, branch.key_offset);
                        let slot = if state_ref.has(bit) {
                            state_ref.slot_of(bit)
                        } else {
                            0
                        };
                        near_parent = node;
                        near_state = state;
                        near_slot = slot;
                        node = state_ref.twig(slot, guard);
                    }
                    Node::Leaf(leaf) => break leaf,
                }
            };

            let Some(diff) = first_diff_offset(key, &near.key) else {
                // Identical key: single-CAS replace of the leaf slot. For a
                // present key the NearTwig descent followed the exact path,
                // so the tracked parent is the correct CAS target.
                if only_if_absent {
                    return Upsert::Rejected;
                }
                if near_parent.is_null() {
                    let leaf = Node::leaf(name, key, value.clone());
                    match self.root.compare_exchange(
                        node,
                        leaf,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            unsafe { guard.defer_destroy(node) };
                            return Upsert::Updated;
                        }
                        Err(_) => continue,
                    }
                }
                let leaf = Node::leaf(name, key, value.clone()).into_shared(guard);
                let near_state_ref = unsafe { near_state.deref() };
                let new_state = near_state_ref.with_replaced(near_slot, leaf, guard);
                let Some(parent) = (unsafe { near_parent.deref() }).as_branch() else {
                    unsafe { free_leaf(leaf) };
                    continue;
                };
                match parent.state.compare_exchange(
                    near_state,
                    new_state,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => {
                        unsafe {
                            guard.defer_destroy(near_state);
                            guard.defer_destroy(node);
                        }
                        return Upsert::Updated;
                    }
                    Err(err) => {
                        drop(err.new);
                        unsafe { free_leaf(leaf) };
                        continue;
                    }
                }
            };

            let new_bit = key_bit(key, diff);
            let old_bit = key_bit(&near.key, diff);
            debug_assert_ne!(new_bit, old_bit);

            // Structural descent: find the exact insertion point for a
            // branch at `diff`.
            let mut parent: Shared<'_, Node<V>> = Shared::null();
            let mut parent_state: Shared<'_, BranchState<V>> = Shared::null();
            let mut parent_slot = 0usize;
            let mut cur = self.root.load(Ordering::Acquire, guard);
            if cur.is_null() {
                continue;
            }
            enum Point {
                Grow,
                Split,
            }
            let point = loop {
                let branch = match unsafe { cur.deref() } {
                    Node::Leaf(_) => break Point::Split,
                    Node::Branch(branch) => branch,
                };
                if branch.key_offset == diff {
                    break Point::Grow;
                }
                if branch.key_offset > diff {
                    break Point::Split;
                }
                let state = branch.state.load(Ordering::Acquire, guard);
                let state_ref = unsafe { state.deref() };
                let bit = key_bit(key, branch.key_offset);
                if !state_ref.has(bit) {
                    break Point::Split;
                }
                let slot = state_ref.slot_of(bit);
                parent = cur;
                parent_state = state;
                parent_slot = slot;
                cur = state_ref.twig(slot, guard);
            };

            match point {
                Point::Grow => {
                    let Some(branch) = (unsafe { cur.deref() }).as_branch() else {
                        continue;
                    };
                    let state = branch.state.load(Ordering::Acquire, guard);
                    let state_ref = unsafe { state.deref() };
                    if state_ref.has(new_bit) {
                        // A concurrent insert claimed the bit; restart and
                        // re-resolve against the fresh structure.
                        continue;
                    }
                    let leaf = Node::leaf(name, key, value.clone()).into_shared(guard);
                    let new_state = state_ref.with_inserted(new_bit, leaf, guard);
                    match branch.state.compare_exchange(
                        state,
                        new_state,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            unsafe { guard.defer_destroy(state) };
                            self.count.fetch_add(1, Ordering::Relaxed);
                            return Upsert::Inserted;
                        }
                        Err(err) => {
                            drop(err.new);
                            unsafe { free_leaf(leaf) };
                            continue;
                        }
                    }
                }
                Point::Split => {
                    // Two-child branch at the divergence offset; the lower
                    // bit occupies slot 0.
                    let leaf = Node::leaf(name, key, value.clone()).into_shared(guard);
                    let state = if new_bit < old_bit {
                        BranchState::pair(new_bit, leaf, old_bit, cur)
                    } else {
                        BranchState::pair(old_bit, cur, new_bit, leaf)
                    };
                    let branch = Owned::new(Node::Branch(Branch {
                        key_offset: diff,
                        state: Atomic::from(state),
                    }));
                    if parent.is_null() {
                        match self.root.compare_exchange(
                            cur,
                            branch,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        ) {
                            Ok(_) => {
                                self.count.fetch_add(1, Ordering::Relaxed);
                                return Upsert::Inserted;
                            }
                            Err(err) => {
                                unsafe {
                                    free_unlinked_branch(err.new.into_shared(guard));
                                    free_leaf(leaf);
                                }
                                continue;
                            }
                        }
                    }
                    let branch = branch.into_shared(guard);
                    let parent_state_ref = unsafe { parent_state.deref() };
                    let new_state = parent_state_ref.with_replaced(parent_slot, branch, guard);
                    let Some(parent_branch) = (unsafe { parent.deref() }).as_branch() else {
                        unsafe {
                            free_unlinked_branch(branch);
                            free_leaf(leaf);
                        }
                        continue;
                    };
                    match parent_branch.state.compare_exchange(
                        parent_state,
                        new_state,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            unsafe { guard.defer_destroy(parent_state) };
                            self.count.fetch_add(1, Ordering::Relaxed);
                            return Upsert::Inserted;
                        }
                        Err(err) => {
                            drop(err.new);
                            unsafe {
                                free_unlinked_branch(branch);
                                free_leaf(leaf);
                            }
                            continue;
                        }
                    }
                }
            }
        }
    }

    /// Replace the value for `key` only when the current value satisfies
    /// `matches`. `None` when the key is absent.
    pub(crate) fn replace_if(
        &self,
        name: &str,
        key: &[u8],
        value: &V,
        matches: impl Fn(&V) -> bool,
    ) -> Option<bool> {
        let guard = &epoch::pin();
        loop {
            let mut parent: Shared<'_, Node<V>> = Shared::null();
            let mut parent_state: Shared<'_, BranchState<V>> = Shared::null();
            let mut parent_slot = 0usize;
            let mut cur = self.root.load(Ordering::Acquire, guard);
            if cur.is_null() {
                return None;
            }
            let leaf = loop {
                match unsafe { cur.deref() } {
                    Node::Branch(branch) => {
                        let state = branch.state.load(Ordering::Acquire, guard);
                        let state_ref = unsafe { state.deref() };
                        let bit = key_bit(key, branch.key_offset);
                        if !state_ref.has(bit) {
                            return None;
                        }
                        let slot = state_ref.slot_of(bit);
                        parent = cur;
                        parent_state = state;
                        parent_slot = slot;
                        cur = state_ref.twig(slot, guard);
                    }
                    Node::Leaf(leaf) => break leaf,
                }
            };
            if *leaf.key != *key {
                return None;
            }
            if !matches(&leaf.value) {
                return Some(false);
            }
            if parent.is_null() {
                let replacement = Node::leaf(name, key, value.clone());
                match self.root.compare_exchange(
                    cur,
                    replacement,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => {
                        unsafe { guard.defer_destroy(cur) };
                        return Some(true);
                    }
                    Err(_) => continue,
                }
            }
            let replacement = Node::leaf(name, key, value.clone()).into_shared(guard);
            let new_state =
                unsafe { parent_state.deref() }.with_replaced(parent_slot, replacement, guard);
            let Some(parent_branch) = (unsafe { parent.deref() }).as_branch() else {
                unsafe { free_leaf(replacement) };
                continue;
            };
            match parent_branch.state.compare_exchange(
                parent_state,
                new_state,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    unsafe {
                        guard.defer_destroy(parent_state);
                        guard.defer_destroy(cur);
                    }
                    return Some(true);
                }
                Err(err) => {
                    drop(err.new);
                    unsafe { free_leaf(replacement) };
                    continue;
                }
            }
        }
    }

    /// Delete `key`, collapsing a two-child parent onto the surviving
    /// sibling. Strict descent: no NearTwig fallback.
    pub(crate) fn remove(&self, key: &[u8]) -> Option<V> {
        let guard = &epoch::pin();
        'retry: loop {
            let root = self.root.load(Ordering::Acquire, guard);
            if root.is_null() {
                return None;
            }
            let mut gparent: Shared<'_, Node<V>> = Shared::null();
            let mut gstate: Shared<'_, BranchState<V>> = Shared::null();
            let mut gslot = 0usize;
            let mut parent: Shared<'_, Node<V>> = Shared::null();
            let mut pstate: Shared<'_, BranchState<V>> = Shared::null();
            let mut pslot = 0usize;
            let mut pbit = 0u8;
            let mut cur = root;
            let leaf = loop {
                match unsafe { cur.deref() } {
                    Node::Branch(branch) => {
                        let state = branch.state.load(Ordering::Acquire, guard);
                        let state_ref = unsafe { state.deref() };
                        let bit = key_bit(key, branch.key_offset);
                        if !state_ref.has(bit) {
                            return None;
                        }
                        let slot = state_ref.slot_of(bit);
                        gparent = parent;
                        gstate = pstate;
                        gslot = pslot;
                        parent = cur;
                        pstate = state;
                        pslot = slot;
                        pbit = bit;
                        cur = state_ref.twig(slot, guard);
                    }
                    Node::Leaf(leaf) => break leaf,
                }
            };
            if *leaf.key != *key {
                return None;
            }
            let value = leaf.value.clone();

            if parent.is_null() {
                // Sole entry.
                match self.root.compare_exchange(
                    cur,
                    Shared::null(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => {
                        unsafe { guard.defer_destroy(cur) };
                        self.count.fetch_sub(1, Ordering::Relaxed);
                        return Some(value);
                    }
                    Err(_) => continue 'retry,
                }
            }

            let pstate_ref = unsafe { pstate.deref() };
            if twig_count(pstate_ref.bitmap) == 2 {
                // Collapse: splice the surviving sibling into the
                // grandparent, removing the parent branch entirely.
                let sibling = pstate_ref.twig(1 - pslot, guard);
                if gparent.is_null() {
                    match self.root.compare_exchange(
                        parent,
                        sibling,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            unsafe {
                                defer_free_branch(guard, parent);
                                guard.defer_destroy(cur);
                            }
                            self.count.fetch_sub(1, Ordering::Relaxed);
                            return Some(value);
                        }
                        Err(_) => continue 'retry,
                    }
                }
                let new_gstate = unsafe { gstate.deref() }.with_replaced(gslot, sibling, guard);
                let Some(gbranch) = (unsafe { gparent.deref() }).as_branch() else {
                    continue 'retry;
                };
                match gbranch.state.compare_exchange(
                    gstate,
                    new_gstate,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => {
                        unsafe {
                            guard.defer_destroy(gstate);
                            defer_free_branch(guard, parent);
                            guard.defer_destroy(cur);
                        }
                        self.count.fetch_sub(1, Ordering::Relaxed);
                        return Some(value);
                    }
                    Err(err) => {
                        drop(err.new);
                        continue 'retry;
                    }
                }
            }

            // Shrink: parent keeps >= 2 children after removal.
            let new_pstate = pstate_ref.with_removed(pbit, guard);
            let Some(pbranch) = (unsafe { parent.deref() }).as_branch() else {
                continue 'retry;
            };
            match pbranch.state.compare_exchange(
                pstate,
                new_pstate,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => {
                    unsafe {
                        guard.defer_destroy(pstate);
                        guard.defer_destroy(cur);
                    }
                    self.count.fetch_sub(1, Ordering::Relaxed);
                    return Some(value);
                }
                Err(err) => {
                    drop(err.new);
                    continue 'retry;
                }
            }
        }
    }

    /// Drop the whole tree; the subtree is reclaimed after the grace period.
    pub(crate) fn clear(&self) {
        let guard = &epoch::pin();
        let old = self.root.swap(Shared::null(), Ordering::AcqRel, guard);
        self.count.store(0, Ordering::Relaxed);
        if !old.is_null() {
            unsafe { defer_free_subtree(guard, old) };
        }
    }

    /// Release-publish a bulk-built root, retiring any previous tree.
    pub(super) fn publish_root(&self, node: Option<Owned<Node<V>>>, count: usize) {
        let guard = &epoch::pin();
        let new = match node {
            Some(node) => node.into_shared(guard),
            None => Shared::null(),
        };
        let old = self.root.swap(new, Ordering::AcqRel, guard);
        self.count.store(count, Ordering::Release);
        if !old.is_null() {
            unsafe { defer_free_subtree(guard, old) };
        }
    }
}

impl<V> Drop for QpTrie<V> {
    fn drop(&mut self) {
        // Exclusive access: reclaim immediately, no grace period needed.
        unsafe {
            let guard = epoch::unprotected();
            let root = self.root.load(Ordering::Relaxed, guard);
            if !root.is_null() {
                free_subtree(root.as_raw());
            }
        }
    }
}

/// Free a leaf node that was never linked into the trie (or has already
/// been unlinked by the caller's own failed attempt).
unsafe fn free_leaf<V>(leaf: Shared<'_, Node<V>>) {
    drop(leaf.into_owned());
}

/// Free a branch node that was never published: its state dies with it,
/// its twigs do not (they reference pre-existing nodes).
unsafe fn free_unlinked_branch<V>(branch: Shared<'_, Node<V>>) {
    let owned = branch.into_owned();
    if let Node::Branch(b) = &*owned {
        let state = b.state.load(Ordering::Relaxed, epoch::unprotected());
        if !state.is_null() {
            drop(state.into_owned());
        }
    }
    drop(owned);
}

/// Defer-free an unlinked branch node together with whatever state it holds
/// once the grace period ends. Loading the state at reclamation time (not
/// now) is what tolerates a racing state swap on the dying branch: the
/// racer retires the state it replaced, we free the one that remains.
unsafe fn defer_free_branch<V>(guard: &Guard, branch: Shared<'_, Node<V>>) {
    let raw = branch.as_raw() as usize;
    guard.defer_unchecked(move || unsafe {
        let shared: Shared<'_, Node<V>> = Shared::from(raw as *const Node<V>);
        let owned = shared.into_owned();
        if let Node::Branch(b) = &*owned {
            let state = b.state.load(Ordering::Relaxed, epoch::unprotected());
            if !state.is_null() {
                drop(state.into_owned());
            }
        }
        drop(owned);
    });
}

/// Defer-free an entire unlinked subtree.
unsafe fn defer_free_subtree<V>(guard: &Guard, node: Shared<'_, Node<V>>) {
    let raw = node.as_raw() as usize;
    guard.defer_unchecked(move || unsafe { free_subtree(raw as *const Node<V>) });
}

unsafe fn free_subtree<V>(ptr: *const Node<V>) {
    if ptr.is_null() {
        return;
    }
    let shared: Shared<'_, Node<V>> = Shared::from(ptr);
    match shared.deref() {
        Node::Leaf(_) => drop(shared.into_owned()),
        Node::Branch(branch) => {
            let state = branch.state.load(Ordering::Relaxed, epoch::unprotected());
            if !state.is_null() {
                for twig in state.deref().twigs.iter() {
                    free_subtree(twig.load(Ordering::Relaxed, epoch::unprotected()).as_raw());
                }
                drop(state.into_owned());
            }
            drop(shared.into_owned());
        }
    }
}

#[cfg(test)]
impl<V: Clone> QpTrie<V> {
    /// Walk the whole trie checking the branch bitmap invariant; returns
    /// the number of reachable leaves.
    pub(crate) fn check_reachable(&self) -> usize {
        fn walk<V>(node: Shared<'_, Node<V>>, guard: &Guard) -> usize {
            match unsafe { node.deref() } {
                Node::Leaf(_) => 1,
                Node::Branch(branch) => {
                    let state = unsafe { branch.state.load(Ordering::Acquire, guard).deref() };
                    assert!(state.check_invariant(), "bitmap/twig mismatch");
                    assert!(state.len() >= 2, "interior branch with < 2 children");
                    (0..state.len())
                        .map(|slot| walk(state.twig(slot, guard), guard))
                        .sum()
                }
            }
        }
        let guard = &epoch::pin();
        let root = self.root.load(Ordering::Acquire, guard);
        if root.is_null() {
            0
        } else {
            walk(root, guard)
        }
    }
}
