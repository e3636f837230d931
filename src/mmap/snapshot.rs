//! Immutable, reference-counted read view of one snapshot file.
//!
//! A `Snapshot` maps the file read-only, validates the header and root, and
//! serves zero-copy lookups. Leases are `Arc<Snapshot>` clones: the mapping
//! is released only when the publisher and every in-flight reader have
//! dropped theirs, so retiring a snapshot never invalidates a live read.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::constants::NODE_SIZE;
use crate::error::{CorruptKind, Result, StoreError};

use super::layout::{self, Header, RawNode};

pub(crate) struct Snapshot {
    mmap: Mmap,
    header: Header,
    value_count: usize,
}

impl Snapshot {
    /// Map and validate a snapshot file.
    pub(crate) fn open(path: &Path) -> Result<Snapshot> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the publisher never writes to
        // a live target file; replacement happens via rename.
        let mmap = unsafe { Mmap::map(&file)? };
        let header = Header::parse(&mmap)?;
        // The root must be readable before we accept the file.
        let root = RawNode::read(&mmap, header.node_region_offset)?;
        layout::children_range(&mmap, &root)?;

        let mut value_count = 0usize;
        for i in 0..header.node_count {
            let node = RawNode::read(&mmap, header.node_region_offset + i * NODE_SIZE)?;
            if node.value_offset != 0 {
                value_count += 1;
            }
        }
        debug!(
            path = %path.display(),
            nodes = header.node_count,
            values = value_count,
            "opened snapshot"
        );
        Ok(Snapshot {
            mmap,
            header,
            value_count,
        })
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.mmap
    }

    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn root_offset(&self) -> u64 {
        self.header.node_region_offset
    }

    /// Number of nodes carrying a value.
    pub(crate) fn value_count(&self) -> usize {
        self.value_count
    }

    /// Iterative descent by label codes. With `require_value`, a terminal
    /// node without a value reads as absent.
    pub(crate) fn find_node(&self, key: &[u8], require_value: bool) -> Result<Option<RawNode>> {
        let data = self.data();
        let mut node = RawNode::read(data, self.root_offset())?;
        for &code in key {
            match layout::find_child(data, &node, code)? {
                Some(child_offset) => node = RawNode::read(data, child_offset)?,
                None => return Ok(None),
            }
        }
        if require_value && node.value_offset == 0 {
            return Ok(None);
        }
        Ok(Some(node))
    }

    /// Zero-copy read of a node's value blob.
    pub(crate) fn value_bytes(&self, node: &RawNode) -> Result<Option<&[u8]>> {
        layout::value_bytes(self.data(), &self.header, node)
    }

    /// Depth-first walk in ascending key order, invoking `f` with each
    /// (encoded key, value bytes) pair. Used to materialize staging.
    pub(crate) fn for_each_entry<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        let data = self.data();
        let root = self.root_offset();
        let mut stack: Vec<(u64, usize)> = vec![(root, 0)];
        let mut key = Vec::new();
        while let Some((offset, depth)) = stack.pop() {
            key.truncate(depth);
            let node = RawNode::read(data, offset)?;
            if offset != root {
                if node.label_id > u8::MAX as u32 {
                    return Err(StoreError::Corrupt(CorruptKind::LabelCode));
                }
                key.push(node.label_id as u8);
            }
            if let Some(bytes) = self.value_bytes(&node)? {
                f(&key, bytes)?;
            }
            if let Some((start, count)) = layout::children_range(data, &node)? {
                // Push descending so ascending labels pop first.
                for i in (0..count as u64).rev() {
                    stack.push((start + i * NODE_SIZE, key.len()));
                }
            }
        }
        Ok(())
    }
}
