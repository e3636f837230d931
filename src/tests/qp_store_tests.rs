use crate::error::StoreError;
use crate::qp::QpStore;

fn s(v: &str) -> String {
    v.to_string()
}

#[test]
fn test_set_get_update_delete() {
    let store: QpStore<u32> = QpStore::new();
    assert!(store.set("a.com", 1).unwrap());
    assert!(store.set("b.com", 2).unwrap());
    assert!(!store.set("a.com", 3).unwrap()); // update, not insert
    assert_eq!(store.get("a.com").unwrap(), 3);
    assert_eq!(store.len(), 2);

    assert_eq!(store.try_remove("a.com").unwrap(), Some(3));
    assert_eq!(store.try_remove("a.com").unwrap(), None);
    assert_eq!(store.len(), 1);

    // Scenario: cursor from the start lands on the survivor.
    assert_eq!(
        store.try_get_next(None).unwrap(),
        Some((s("b.com"), 2))
    );
}

#[test]
fn test_add_rejects_duplicates() {
    let store: QpStore<String> = QpStore::new();
    store.add("x.example", s("first")).unwrap();
    assert!(matches!(
        store.add("x.example", s("second")),
        Err(StoreError::AlreadyExists)
    ));
    assert!(!store.try_add("x.example", s("third")));
    assert_eq!(store.get("x.example").unwrap(), "first");
}

#[test]
fn test_case_insensitive_by_default() {
    let store: QpStore<u32> = QpStore::new();
    store.set("WWW.Example.COM", 7).unwrap();
    assert_eq!(store.get("www.example.com").unwrap(), 7);
    assert!(store.contains("WwW.eXaMpLe.CoM"));
    // Canonical lowercase comes back out.
    let entries: Vec<_> = store.enumerate().collect();
    assert_eq!(entries, vec![(s("www.example.com"), 7)]);
}

#[test]
fn test_case_sensitive_mode() {
    let store: QpStore<u32> = QpStore::with_case_sensitivity(true);
    store.set("Api.example", 1).unwrap();
    store.set("api.example", 2).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("Api.example").unwrap(), 1);
    assert_eq!(store.get("api.example").unwrap(), 2);
}

#[test]
fn test_empty_name_is_a_key() {
    let store: QpStore<u32> = QpStore::new();
    store.set("", 42).unwrap();
    store.set("com", 1).unwrap();
    assert_eq!(store.get("").unwrap(), 42);
    // The empty key sorts before everything.
    assert_eq!(store.try_get_next(None).unwrap(), Some((s(""), 42)));
    assert_eq!(
        store.try_get_next(Some("")).unwrap(),
        Some((s("com"), 1))
    );
}

#[test]
fn test_get_or_add() {
    let store: QpStore<String> = QpStore::new();
    let mut calls = 0;
    let v = store
        .get_or_add("lazy.example", || {
            calls += 1;
            s("made")
        })
        .unwrap();
    assert_eq!(v, "made");
    let v = store.get_or_add("lazy.example", || s("other")).unwrap();
    assert_eq!(v, "made");
    assert_eq!(calls, 1);
}

#[test]
fn test_add_or_update() {
    let store: QpStore<u32> = QpStore::new();
    assert_eq!(store.add_or_update("n.example", || 1, |v| v + 10).unwrap(), 1);
    assert_eq!(
        store.add_or_update("n.example", || 1, |v| v + 10).unwrap(),
        11
    );
    assert_eq!(store.get("n.example").unwrap(), 11);
}

#[test]
fn test_try_update() {
    let store: QpStore<u32> = QpStore::new();
    store.set("cas.example", 5).unwrap();
    assert!(!store.try_update("cas.example", 6, 9).unwrap());
    assert!(store.try_update("cas.example", 6, 5).unwrap());
    assert_eq!(store.get("cas.example").unwrap(), 6);
    assert!(!store.try_update("missing.example", 1, 1).unwrap());
}

#[test]
fn test_clear_drops_root() {
    let store: QpStore<u32> = QpStore::new();
    for i in 0..50 {
        store.set(&format!("h{i}.example"), i).unwrap();
    }
    assert!(!store.is_empty());
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.len(), 0);
    assert_eq!(store.try_get_next(None).unwrap(), None);
    // Still usable after clear.
    store.set("again.example", 1).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn test_invalid_names_silent_on_try_paths() {
    let store: QpStore<u32> = QpStore::new();
    assert!(!store.try_add("a..b", 1));
    assert!(store.try_get("a..b").is_none());
    assert!(!store.contains("-a.com"));
    assert_eq!(store.try_remove("a*b.com").unwrap(), None);
    assert!(matches!(
        store.add("a..b", 1),
        Err(StoreError::InvalidName(_))
    ));
}

#[test]
fn test_escaped_names_are_distinct_keys() {
    let store: QpStore<u32> = QpStore::new();
    store.set("a\\.b.com", 1).unwrap(); // dot inside the first label
    store.set("a.b.com", 2).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a\\.b.com").unwrap(), 1);
    assert_eq!(store.get("a.b.com").unwrap(), 2);
    // \068 is 'D'; folding still applies to the decoded byte.
    store.set("\\068up.example", 3).unwrap();
    assert_eq!(store.get("dup.example").unwrap(), 3);
}

#[test]
fn test_branch_invariants_after_churn() {
    let store: QpStore<u32> = QpStore::new();
    for i in 0..300u32 {
        store.set(&format!("h{i}.d{}.example", i % 7), i).unwrap();
    }
    for i in (0..300u32).step_by(3) {
        store.try_remove(&format!("h{i}.d{}.example", i % 7)).unwrap();
    }
    // popcount(bitmap) == twigs.len() on every reachable branch, and the
    // reachable-leaf count matches the maintained count.
    assert_eq!(store.trie().check_reachable(), store.len());
    for i in 0..300u32 {
        let expected = i % 3 != 0;
        assert_eq!(
            store.contains(&format!("h{i}.d{}.example", i % 7)),
            expected,
            "key {i}"
        );
    }
}

#[test]
fn test_removal_leaves_no_interior_nodes() {
    let store: QpStore<u32> = QpStore::new();
    store.set("deep.tree.example", 1).unwrap();
    store.set("wide.tree.example", 2).unwrap();
    store.set("tree.example", 3).unwrap();
    store.try_remove("deep.tree.example").unwrap();
    store.try_remove("wide.tree.example").unwrap();
    store.try_remove("tree.example").unwrap();
    assert!(store.is_empty());
    assert_eq!(store.trie().check_reachable(), 0);
}
