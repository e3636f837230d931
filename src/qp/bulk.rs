//! Sorted bulk construction of an optimized trie.
//!
//! Small batches go through the regular insert path; larger ones are
//! sorted, deduplicated last-wins, and built bottom-up in one linear pass
//! per level: each recursion finds the first offset where the sorted run
//! disagrees, partitions on the byte at that offset, and emits a branch
//! whose twigs arrive already in ascending bit order.

use crossbeam_epoch::{Atomic, Owned};

use crate::constants::BULK_INLINE_MAX;

use super::bitmap::{bit_mask, first_diff_offset, key_bit};
use super::node::{Branch, BranchState, Node};
use super::trie::QpTrie;

pub(crate) struct BulkEntry<V> {
    pub name: Box<str>,
    pub key: Box<[u8]>,
    pub value: V,
}

impl<V: Clone> QpTrie<V> {
    /// Replace the trie contents with `entries`, last occurrence winning
    /// per duplicate key. Publishes the new root with one release swap.
    pub(crate) fn bulk_load(&self, mut entries: Vec<BulkEntry<V>>) {
        if entries.len() <= BULK_INLINE_MAX {
            for entry in entries {
                self.upsert(&entry.name, &entry.key, &entry.value, false);
            }
            return;
        }
        // Stable sort keeps duplicate keys in input order, so a forward
        // pass keeping the later element implements last-wins.
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        let mut deduped: Vec<BulkEntry<V>> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.last() {
                Some(last) if last.key == entry.key => {
                    let slot = deduped.len() - 1;
                    deduped[slot] = entry;
                }
                _ => deduped.push(entry),
            }
        }
        let count = deduped.len();
        let root = build(deduped);
        self.publish_root(Some(root), count);
    }
}

/// Recursively build a subtree from a sorted, deduplicated, non-empty run.
fn build<V>(mut entries: Vec<BulkEntry<V>>) -> Owned<Node<V>> {
    if entries.len() == 1 {
        let entry = match entries.pop() {
            Some(entry) => entry,
            None => unreachable!("non-empty by construction"),
        };
        return Owned::new(Node::Leaf(super::node::Leaf {
            name: entry.name,
            key: entry.key,
            value: entry.value,
        }));
    }

    // Smallest offset where not all keys agree: since the run is sorted,
    // the first and last key witness every divergence.
    let split = {
        let first = &entries[0].key;
        let last = &entries[entries.len() - 1].key;
        match first_diff_offset(first, last) {
            Some(offset) => offset,
            None => unreachable!("duplicate keys survive dedup"),
        }
    };

    let mut bitmap = 0u64;
    let mut twigs: Vec<Atomic<Node<V>>> = Vec::new();
    let mut run: Vec<BulkEntry<V>> = Vec::new();
    let mut run_bit = None;
    for entry in entries {
        let bit = key_bit(&entry.key, split);
        if run_bit != Some(bit) {
            if let Some(prev) = run_bit {
                bitmap |= bit_mask(prev);
                twigs.push(Atomic::from(build(std::mem::take(&mut run))));
            }
            run_bit = Some(bit);
        }
        run.push(entry);
    }
    if let Some(prev) = run_bit {
        bitmap |= bit_mask(prev);
        twigs.push(Atomic::from(build(run)));
    }

    Owned::new(Node::Branch(Branch {
        key_offset: split,
        state: Atomic::from(Owned::new(BranchState {
            bitmap,
            twigs: twigs.into_boxed_slice(),
        })),
    }))
}
