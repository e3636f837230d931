use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::name::wire;
use crate::qp::QpStore;

fn random_name(rng: &mut StdRng) -> String {
    let alphabet = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let labels = rng.random_range(1..=4);
    let mut parts = Vec::new();
    for _ in 0..labels {
        let len = rng.random_range(1..=12);
        let label: String = (0..len)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
            .collect();
        parts.push(label);
    }
    parts.join(".")
}

/// Sort names the way the trie orders them: by encoded wire key.
fn sorted_by_key(mut names: Vec<String>) -> Vec<String> {
    names.sort_by_key(|name| wire::encode_wire(name, true).unwrap());
    names
}

#[test]
fn test_cursor_visits_every_key_once_in_order() {
    let mut rng = StdRng::seed_from_u64(0xD0_57_41_E5);
    let store: QpStore<u32> = QpStore::new();
    let mut names = Vec::new();
    for i in 0..500u32 {
        let name = random_name(&mut rng);
        if store.set(&name, i).unwrap() {
            names.push(name);
        }
    }
    let expected = sorted_by_key(names);

    let mut walked = Vec::new();
    let mut cursor: Option<String> = None;
    while let Some((name, _)) = store.try_get_next(cursor.as_deref()).unwrap() {
        walked.push(name.clone());
        cursor = Some(name);
    }
    assert_eq!(walked, expected);
}

#[test]
fn test_cursor_from_absent_key() {
    let store: QpStore<u32> = QpStore::new();
    // Same-length labels keep the length prefix out of the comparison.
    for (i, name) in ["aaaa.com", "gggg.com", "zzzz.com"].iter().enumerate() {
        store.set(name, i as u32).unwrap();
    }
    // "bbbb.com" is not present; the successor is the next stored key.
    assert_eq!(
        store.try_get_next(Some("bbbb.com")).unwrap(),
        Some(("gggg.com".to_string(), 1))
    );
    // Digits sort before letters: a probe below everything.
    assert_eq!(
        store.try_get_next(Some("0000.com")).unwrap(),
        Some(("aaaa.com".to_string(), 0))
    );
    // A longer final label sorts after every four-byte label.
    assert_eq!(store.try_get_next(Some("zzzzz.com")).unwrap(), None);
}

#[test]
fn test_cursor_sees_prefix_extensions() {
    let store: QpStore<u32> = QpStore::new();
    store.set("com", 0).unwrap();
    store.set("google.com", 1).unwrap();
    store.set("www.google.com", 2).unwrap();

    assert_eq!(
        store.try_get_next(Some("com")).unwrap(),
        Some(("google.com".to_string(), 1))
    );
    assert_eq!(
        store.try_get_next(Some("google.com")).unwrap(),
        Some(("www.google.com".to_string(), 2))
    );
    assert_eq!(store.try_get_next(Some("www.google.com")).unwrap(), None);
}

#[test]
fn test_prev_mirrors_next() {
    let mut rng = StdRng::seed_from_u64(42);
    let store: QpStore<u32> = QpStore::new();
    let mut names = Vec::new();
    for i in 0..200u32 {
        let name = random_name(&mut rng);
        if store.set(&name, i).unwrap() {
            names.push(name);
        }
    }
    let expected = sorted_by_key(names);

    let mut walked = Vec::new();
    let mut cursor: Option<String> = None;
    while let Some((name, _)) = store.try_get_prev(cursor.as_deref()).unwrap() {
        walked.push(name.clone());
        cursor = Some(name);
    }
    walked.reverse();
    assert_eq!(walked, expected);
}

#[test]
fn test_enumerate_matches_cursor() {
    let store: QpStore<u32> = QpStore::new();
    for (i, name) in ["b.org", "a.org", "c.net", "a.com", "m.a.com"]
        .iter()
        .enumerate()
    {
        store.set(name, i as u32).unwrap();
    }
    let forward: Vec<String> = store.enumerate().map(|(n, _)| n).collect();
    let mut reverse: Vec<String> = store.reverse_enumerate().map(|(n, _)| n).collect();
    reverse.reverse();
    assert_eq!(forward, reverse);
    assert_eq!(forward.len(), 5);
    // TLD-first ordering groups by suffix.
    assert_eq!(forward, ["a.com", "m.a.com", "c.net", "a.org", "b.org"]);
}

#[test]
fn test_cursor_on_single_and_empty() {
    let store: QpStore<u32> = QpStore::new();
    assert_eq!(store.try_get_next(None).unwrap(), None);
    assert_eq!(store.try_get_prev(None).unwrap(), None);

    store.set("only.example", 1).unwrap();
    assert_eq!(
        store.try_get_next(None).unwrap(),
        Some(("only.example".to_string(), 1))
    );
    assert_eq!(store.try_get_next(Some("only.example")).unwrap(), None);
    assert_eq!(
        store.try_get_prev(None).unwrap(),
        Some(("only.example".to_string(), 1))
    );
    assert_eq!(store.try_get_prev(Some("only.example")).unwrap(), None);
}
