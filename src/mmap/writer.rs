//! Snapshot serialization and blue/green file replacement.
//!
//! `publish()` never touches the live target in place: it writes a complete
//! file beside it, fsyncs, then moves it over the target while keeping the
//! previous generation as a `.bak` sidecar. `recover_sidecars()` runs at
//! open to promote whichever sidecar survived a crash mid-publish.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::constants::{
    BACKUP_SUFFIX, HEADER_SIZE, NODE_SIZE, TEMP_SUFFIX, VALUE_REGION_PAD,
};
use crate::error::{Result, StoreError};

use super::layout::{Header, RawNode};
use super::staging::{StagingNode, StagingTrie};

/// What one publish wrote; feeds the statistics hub.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PublishStats {
    pub nodes: u64,
    pub value_bytes: u64,
}

/// `<path>.<suffix>` with the suffix appended, not substituted.
pub(crate) fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Serialize `staging` into a fresh snapshot at `target`.
///
/// Builds `<target>.tmp`, fsyncs it, then swings it over the target. The
/// temp file is gone on every path; on error the target is untouched.
pub(crate) fn publish(
    staging: &StagingTrie,
    target: &Path,
    node_capacity: u64,
    value_capacity: u64,
) -> Result<PublishStats> {
    let tmp = sidecar(target, TEMP_SUFFIX);
    let result = write_snapshot_file(staging, &tmp, node_capacity, value_capacity)
        .and_then(|stats| {
            replace_file(&tmp, target)?;
            Ok(stats)
        });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_snapshot_file(
    staging: &StagingTrie,
    tmp: &Path,
    node_capacity: u64,
    value_capacity: u64,
) -> Result<PublishStats> {
    // Breadth-first layout: children of each node occupy a contiguous run,
    // in ascending label order because staging child slots are byte-indexed.
    let mut order: Vec<(&StagingNode, u8)> = vec![(staging.root(), 0)];
    let mut shapes: Vec<(u64, u32)> = Vec::new(); // (first_child_index, child_count)
    let mut head = 0usize;
    while head < order.len() {
        let (node, _) = order[head];
        let first_child = order.len() as u64;
        let mut child_count = 0u32;
        for (label, child) in node.children.iter().enumerate() {
            if let Some(child) = child {
                order.push((child, label as u8));
                child_count += 1;
            }
        }
        shapes.push((if child_count == 0 { 0 } else { first_child }, child_count));
        head += 1;
    }

    let node_count = order.len() as u64;
    if node_count > node_capacity {
        return Err(StoreError::NodeCapacityExceeded {
            nodes: node_count,
            limit: node_capacity,
        });
    }

    let node_region_offset = HEADER_SIZE;
    let value_region_offset = node_region_offset + node_count * NODE_SIZE;

    // Assign value offsets; the pad keeps every real offset positive so 0
    // stays the no-value sentinel.
    let mut value_cursor = VALUE_REGION_PAD;
    let mut value_offsets = Vec::with_capacity(order.len());
    for (node, _) in &order {
        match &node.value {
            Some(bytes) => {
                value_offsets.push(value_cursor as i64);
                value_cursor += 4 + bytes.len() as u64;
            }
            None => value_offsets.push(0),
        }
    }
    if value_cursor > value_capacity {
        return Err(StoreError::ValueCapacityExceeded {
            bytes: value_cursor,
            limit: value_capacity,
        });
    }

    let mut buf = Vec::with_capacity((value_region_offset + value_cursor) as usize);
    Header {
        node_region_offset,
        node_count,
        value_region_offset,
    }
    .write_to(&mut buf);
    for (i, (node, label)) in order.iter().enumerate() {
        let (first_child, child_count) = shapes[i];
        RawNode {
            label_id: *label as u32,
            first_child_pos: if child_count == 0 {
                0
            } else {
                (node_region_offset + first_child * NODE_SIZE) as i64
            },
            child_count,
            value_offset: value_offsets[i],
            value_length: node.value.as_ref().map_or(0, |b| b.len() as i32),
        }
        .write_to(&mut buf);
    }
    buf.extend_from_slice(&[0u8; VALUE_REGION_PAD as usize]);
    for (node, _) in &order {
        if let Some(bytes) = &node.value {
            buf.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
    }

    let file = File::create(tmp)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&buf)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    debug!(
        tmp = %tmp.display(),
        nodes = node_count,
        value_bytes = value_cursor,
        "wrote snapshot temp file"
    );
    Ok(PublishStats {
        nodes: node_count,
        value_bytes: value_cursor,
    })
}

/// Move `tmp` over `target`, retaining the previous generation as `.bak`.
///
/// When the backup rename fails we fall back to delete-then-move, which is
/// not atomic; a crash in that window is repaired by `recover_sidecars`.
fn replace_file(tmp: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        let backup = sidecar(target, BACKUP_SUFFIX);
        match fs::rename(target, &backup) {
            Ok(()) => fs::rename(tmp, target)?,
            Err(err) => {
                warn!(
                    target = %target.display(),
                    %err,
                    "backup rename failed; falling back to delete-then-move"
                );
                fs::remove_file(target)?;
                fs::rename(tmp, target)?;
            }
        }
    } else {
        fs::rename(tmp, target)?;
    }
    Ok(())
}

/// Repair the aftermath of a crashed publish before opening `target`.
pub(crate) fn recover_sidecars(target: &Path) -> Result<()> {
    let tmp = sidecar(target, TEMP_SUFFIX);
    let backup = sidecar(target, BACKUP_SUFFIX);
    if !target.exists() {
        if tmp.exists() {
            // Crash after the old target moved away but before the temp
            // file landed: the temp file is the complete new generation.
            warn!(target = %target.display(), "promoting .tmp sidecar");
            fs::rename(&tmp, target)?;
        } else if backup.exists() {
            warn!(target = %target.display(), "promoting .bak sidecar");
            fs::rename(&backup, target)?;
        }
    } else if tmp.exists() {
        debug!(target = %target.display(), "removing stale .tmp sidecar");
        fs::remove_file(&tmp)?;
    }
    Ok(())
}
