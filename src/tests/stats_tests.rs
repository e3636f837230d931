use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::codec::Utf8Codec;
use crate::constants::{HEADER_SIZE, NODE_SIZE};
use crate::error::StoreError;
use crate::mmap::layout::{Header, RawNode};
use crate::mmap::MmapStore;

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("store.snap")
}

fn s(v: &str) -> String {
    v.to_string()
}

#[test]
fn test_report_reflects_operations() {
    let dir = TempDir::new().unwrap();
    let store = MmapStore::open(store_path(&dir), Utf8Codec).unwrap();
    store.add("a.example", &s("1")).unwrap();
    store.add("b.example", &s("2")).unwrap();
    store.get("a.example").unwrap();
    store.get("b.example").unwrap();
    assert!(matches!(store.get("missing.example"), Err(StoreError::KeyNotFound)));
    store.swap().unwrap();

    let snapshot = store.stats();
    assert_eq!(snapshot.entry_count, 2);
    assert_eq!(snapshot.total_gets, 3);
    assert_eq!(snapshot.total_adds, 2);
    assert_eq!(snapshot.key_not_found_errors, 1);

    let report = snapshot.report();
    assert!(report.contains("entries: 2"));
    assert!(report.contains("ops: 3 gets, 2 adds"));
    assert!(report.contains("publish: 1 swaps"));
    assert!(report.contains("1 not-found, 0 corrupt, 0 io"));
}

#[test]
fn test_corrupt_read_is_counted() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    // A file that passes open validation (header and root are sound) but
    // carries an interior node whose child block points past the end.
    let header = Header {
        node_region_offset: HEADER_SIZE,
        node_count: 2,
        value_region_offset: HEADER_SIZE + 2 * NODE_SIZE,
    };
    let mut buf = Vec::new();
    header.write_to(&mut buf);
    RawNode {
        label_id: 0,
        first_child_pos: (HEADER_SIZE + NODE_SIZE) as i64,
        child_count: 1,
        value_offset: 0,
        value_length: 0,
    }
    .write_to(&mut buf);
    RawNode {
        label_id: 15, // 'a'
        first_child_pos: 1_000_000,
        child_count: 3,
        value_offset: 0,
        value_length: 0,
    }
    .write_to(&mut buf);
    buf.extend_from_slice(&[0u8; 4]);
    fs::write(&path, &buf).unwrap();

    let store = MmapStore::open(&path, Utf8Codec).unwrap();
    // Descending through the damaged node trips the bounds check.
    assert!(matches!(store.get("aa"), Err(StoreError::Corrupt(_))));

    let snapshot = store.stats();
    assert_eq!(snapshot.corrupt_errors, 1);
    assert_eq!(snapshot.key_not_found_errors, 0);
    assert!(snapshot.report().contains("1 corrupt"));
}

#[test]
fn test_failed_publish_counts_io_error() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);
    let store = MmapStore::open(&path, Utf8Codec).unwrap();
    store.add("a.example", &s("1")).unwrap();

    // Occupy the temp sidecar with a directory so the publish write fails.
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    fs::create_dir(&tmp).unwrap();

    assert!(matches!(store.swap(), Err(StoreError::Io(_))));

    let snapshot = store.stats();
    assert_eq!(snapshot.io_errors, 1);
    assert_eq!(snapshot.swap_count, 0);
    assert!(snapshot.report().contains("1 io"));

    // The staged entry survived the failed publish.
    assert_eq!(store.get("a.example").unwrap(), "1");
}
