//! Snapshot file layout and bounds-checked accessors.
//!
//! A snapshot is a single file: a 32-byte header, a packed array of 28-byte
//! little-endian nodes, then length-prefixed value blobs. Every read goes
//! through accessors that validate offsets against the mapped length; the
//! `unchecked-io` feature compiles those checks out for trusted files.

use crate::constants::{
    HEADER_SIZE, NODE_SIZE, SNAPSHOT_ENDIAN_LE, SNAPSHOT_MAGIC, SNAPSHOT_VERSION,
};
use crate::error::{CorruptKind, Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub node_region_offset: u64,
    pub node_count: u64,
    pub value_region_offset: u64,
}

impl Header {
    /// Parse and validate the header against the file length.
    pub(crate) fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < HEADER_SIZE as usize {
            return Err(StoreError::Corrupt(CorruptKind::Bounds));
        }
        if le_u32(data, 0) != SNAPSHOT_MAGIC {
            return Err(StoreError::Corrupt(CorruptKind::Magic));
        }
        if le_u16(data, 4) != SNAPSHOT_VERSION {
            return Err(StoreError::Corrupt(CorruptKind::Version));
        }
        if le_u16(data, 6) != SNAPSHOT_ENDIAN_LE {
            return Err(StoreError::Corrupt(CorruptKind::Endianness));
        }
        let header = Header {
            node_region_offset: le_u64(data, 8),
            node_count: le_u64(data, 16),
            value_region_offset: le_u64(data, 24),
        };
        let node_region_end = header
            .node_count
            .checked_mul(NODE_SIZE)
            .and_then(|n| n.checked_add(header.node_region_offset))
            .ok_or(StoreError::Corrupt(CorruptKind::Bounds))?;
        if header.node_region_offset < HEADER_SIZE
            || header.node_count < 1
            || header.value_region_offset < node_region_end
            || header.value_region_offset > data.len() as u64
        {
            return Err(StoreError::Corrupt(CorruptKind::Bounds));
        }
        Ok(header)
    }

    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&SNAPSHOT_MAGIC.to_le_bytes());
        buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        buf.extend_from_slice(&SNAPSHOT_ENDIAN_LE.to_le_bytes());
        buf.extend_from_slice(&self.node_region_offset.to_le_bytes());
        buf.extend_from_slice(&self.node_count.to_le_bytes());
        buf.extend_from_slice(&self.value_region_offset.to_le_bytes());
    }
}

/// One packed trie node as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawNode {
    pub label_id: u32,
    pub first_child_pos: i64,
    pub child_count: u32,
    pub value_offset: i64,
    pub value_length: i32,
}

impl RawNode {
    /// Bounds-checked node read at an absolute file offset.
    pub(crate) fn read(data: &[u8], offset: u64) -> Result<RawNode> {
        check_range(data, offset, NODE_SIZE)?;
        let at = offset as usize;
        Ok(RawNode {
            label_id: le_u32(data, at),
            first_child_pos: le_u64(data, at + 4) as i64,
            child_count: le_u32(data, at + 12),
            value_offset: le_u64(data, at + 16) as i64,
            value_length: le_u32(data, at + 24) as i32,
        })
    }

    pub(crate) fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.label_id.to_le_bytes());
        buf.extend_from_slice(&self.first_child_pos.to_le_bytes());
        buf.extend_from_slice(&self.child_count.to_le_bytes());
        buf.extend_from_slice(&self.value_offset.to_le_bytes());
        buf.extend_from_slice(&self.value_length.to_le_bytes());
    }
}

/// Read just the label of the node at `offset`; used by child binary search.
pub(crate) fn read_label_id(data: &[u8], offset: u64) -> Result<u32> {
    check_range(data, offset, 4)?;
    Ok(le_u32(data, offset as usize))
}

/// Validated child region of a node: `(first_child_offset, child_count)`.
///
/// Enforces the structural invariant `first_child_pos = 0 ⇔ child_count = 0`
/// and that the whole contiguous child block lies inside the file.
pub(crate) fn children_range(data: &[u8], node: &RawNode) -> Result<Option<(u64, u32)>> {
    if node.first_child_pos == 0 || node.child_count == 0 {
        if node.first_child_pos != 0 || node.child_count != 0 {
            return Err(StoreError::Corrupt(CorruptKind::Bounds));
        }
        return Ok(None);
    }
    if node.first_child_pos < 0 {
        return Err(StoreError::Corrupt(CorruptKind::Bounds));
    }
    let start = node.first_child_pos as u64;
    let span = NODE_SIZE
        .checked_mul(node.child_count as u64)
        .ok_or(StoreError::Corrupt(CorruptKind::Bounds))?;
    check_range(data, start, span)?;
    Ok(Some((start, node.child_count)))
}

/// Binary-search a node's children (sorted ascending by label) for `label`.
pub(crate) fn find_child(data: &[u8], node: &RawNode, label: u8) -> Result<Option<u64>> {
    let Some((start, count)) = children_range(data, node)? else {
        return Ok(None);
    };
    let mut lo = 0u64;
    let mut hi = count as u64;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let offset = start + mid * NODE_SIZE;
        let mid_label = read_label_id(data, offset)?;
        match mid_label.cmp(&(label as u32)) {
            std::cmp::Ordering::Equal => return Ok(Some(offset)),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }
    Ok(None)
}

/// Bounds-checked value blob read. `None` when the node has no value.
pub(crate) fn value_bytes<'a>(
    data: &'a [u8],
    header: &Header,
    node: &RawNode,
) -> Result<Option<&'a [u8]>> {
    if node.value_offset == 0 {
        return Ok(None);
    }
    if node.value_offset < 0 {
        return Err(StoreError::Corrupt(CorruptKind::Bounds));
    }
    let at = header
        .value_region_offset
        .checked_add(node.value_offset as u64)
        .ok_or(StoreError::Corrupt(CorruptKind::Bounds))?;
    check_range(data, at, 4)?;
    let prefix = le_u32(data, at as usize) as i32;
    if prefix < 0 {
        return Err(StoreError::Corrupt(CorruptKind::NegativeLength));
    }
    if prefix != node.value_length {
        return Err(StoreError::Corrupt(CorruptKind::LengthMismatch));
    }
    let payload_at = at + 4;
    check_range(data, payload_at, prefix as u64)?;
    let at = payload_at as usize;
    Ok(Some(&data[at..at + prefix as usize]))
}

#[inline]
fn le_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
fn le_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn le_u64(data: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(raw)
}

#[inline]
#[allow(unused_variables)]
fn check_range(data: &[u8], offset: u64, len: u64) -> Result<()> {
    #[cfg(not(feature = "unchecked-io"))]
    {
        let end = offset
            .checked_add(len)
            .ok_or(StoreError::Corrupt(CorruptKind::Bounds))?;
        if end > data.len() as u64 {
            return Err(StoreError::Corrupt(CorruptKind::Bounds));
        }
    }
    Ok(())
}
