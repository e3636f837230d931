//! Snapshot enumerator.
//!
//! Holds a lease on the snapshot that was active when iteration began, so
//! a concurrent `swap()` never changes what an in-flight enumerator sees.
//! Forward order pushes children descending so ascending labels pop first;
//! reverse order mirrors that and emits a node's value after its subtree.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::codec::ValueCodec;
use crate::constants::NODE_SIZE;
use crate::error::{CorruptKind, Result, StoreError};
use crate::name;

use super::layout::{self, RawNode};
use super::snapshot::Snapshot;
use super::MmapStore;

enum Frame {
    Visit { offset: u64, depth: usize },
    Emit { offset: u64, depth: usize },
}

pub struct MmapIter<'a, C: ValueCodec> {
    store: &'a MmapStore<C>,
    snapshot: Option<Arc<Snapshot>>,
    stack: Vec<Frame>,
    key: Vec<u8>,
    forward: bool,
    done: bool,
}

impl<'a, C: ValueCodec> MmapIter<'a, C> {
    pub(crate) fn new(store: &'a MmapStore<C>, forward: bool) -> Self {
        store
            .stats
            .total_enumerations
            .fetch_add(1, Ordering::Relaxed);
        match store.acquire_active() {
            Ok(snapshot) => {
                let root = snapshot.root_offset();
                Self {
                    store,
                    snapshot: Some(snapshot),
                    stack: vec![Frame::Visit {
                        offset: root,
                        depth: 0,
                    }],
                    key: Vec::new(),
                    forward,
                    done: false,
                }
            }
            // Acquiring after dispose: surface `Disposed` on the first step.
            Err(_) => Self {
                store,
                snapshot: None,
                stack: Vec::new(),
                key: Vec::new(),
                forward,
                done: false,
            },
        }
    }

    fn step(&mut self) -> Result<Option<(String, C::Value)>> {
        if self.store.is_disposed() {
            return Err(StoreError::Disposed);
        }
        let Some(snapshot) = self.snapshot.clone() else {
            return Err(StoreError::Disposed);
        };
        let data = snapshot.data();
        let root = snapshot.root_offset();
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Visit { offset, depth } => {
                    let node = RawNode::read(data, offset)?;
                    self.push_label(root, offset, &node, depth)?;
                    if self.forward {
                        if let Some((start, count)) = layout::children_range(data, &node)? {
                            for i in (0..count as u64).rev() {
                                self.stack.push(Frame::Visit {
                                    offset: start + i * NODE_SIZE,
                                    depth: self.key.len(),
                                });
                            }
                        }
                        if let Some(bytes) = snapshot.value_bytes(&node)? {
                            return Ok(Some(self.decode_entry(bytes)?));
                        }
                    } else {
                        // Children first (descending), own value afterwards.
                        self.stack.push(Frame::Emit { offset, depth });
                        if let Some((start, count)) = layout::children_range(data, &node)? {
                            for i in 0..count as u64 {
                                self.stack.push(Frame::Visit {
                                    offset: start + i * NODE_SIZE,
                                    depth: self.key.len(),
                                });
                            }
                        }
                    }
                }
                Frame::Emit { offset, depth } => {
                    let node = RawNode::read(data, offset)?;
                    self.push_label(root, offset, &node, depth)?;
                    if let Some(bytes) = snapshot.value_bytes(&node)? {
                        return Ok(Some(self.decode_entry(bytes)?));
                    }
                }
            }
        }
        Ok(None)
    }

    fn push_label(&mut self, root: u64, offset: u64, node: &RawNode, depth: usize) -> Result<()> {
        self.key.truncate(depth);
        if offset != root {
            if node.label_id > u8::MAX as u32 {
                return Err(StoreError::Corrupt(CorruptKind::LabelCode));
            }
            self.key.push(node.label_id as u8);
        }
        Ok(())
    }

    fn decode_entry(&self, bytes: &[u8]) -> Result<(String, C::Value)> {
        let name = name::decode_reverse(&self.key)?;
        let value = self.store.codec().decode(bytes)?;
        Ok((name, value))
    }
}

impl<C: ValueCodec> Iterator for MmapIter<'_, C> {
    type Item = Result<(String, C::Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.store.stats.record_error(&err);
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
