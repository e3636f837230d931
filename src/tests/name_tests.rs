use crate::error::{NameErrorKind, StoreError};
use crate::name::{decode_reverse, encode_reverse, wire};

#[test]
fn test_roundtrip_preserves_canonical_form() {
    for name in [
        "",
        "com",
        "google.com",
        "www.google.com",
        "a-b.c-d.example",
        "xn--55qx5d.example",
        "*",
        "*.example.com",
        "_tcp.example.com",
        "123.456.example",
    ] {
        let key = encode_reverse(name).unwrap();
        assert_eq!(decode_reverse(&key).unwrap(), name, "roundtrip of {name}");
    }
    // Mixed case decodes to the lowercase canonical form.
    let key = encode_reverse("WwW.GooGle.CoM").unwrap();
    assert_eq!(decode_reverse(&key).unwrap(), "www.google.com");
}

#[test]
fn test_distinct_names_have_distinct_keys() {
    let names = [
        "", "com", "org", "a.com", "b.com", "aa.com", "a.a.com", "*", "*.com", "a-b.com",
        "ab.com", "a.b.com",
    ];
    for (i, a) in names.iter().enumerate() {
        for b in names.iter().skip(i + 1) {
            assert_ne!(
                encode_reverse(a).unwrap(),
                encode_reverse(b).unwrap(),
                "{a} vs {b}"
            );
            assert_ne!(
                wire::encode_wire(a, true).unwrap(),
                wire::encode_wire(b, true).unwrap(),
                "wire {a} vs {b}"
            );
        }
    }
}

#[test]
fn test_length_boundaries() {
    let label63 = "a".repeat(63);
    let label64 = "a".repeat(64);
    assert!(encode_reverse(&label63).is_ok());
    assert!(encode_reverse(&label64).is_err());
    assert!(wire::encode_wire(&label63, true).is_ok());
    assert!(wire::encode_wire(&label64, true).is_err());

    // 255 bytes accepted, 256 rejected, in both encodings.
    let name255 = format!("{l}.{l}.{l}.{l}", l = label63);
    assert_eq!(name255.len(), 255);
    assert!(encode_reverse(&name255).is_ok());
    assert!(wire::encode_wire(&name255, true).is_ok());

    let name256 = format!("ab.{}", name255);
    assert_eq!(name256.len(), 258);
    assert!(matches!(
        encode_reverse(&name256),
        Err(StoreError::InvalidName(NameErrorKind::NameLength(_)))
    ));
    assert!(wire::encode_wire(&name256, true).is_err());
}

#[test]
fn test_hyphen_and_dot_placement() {
    for bad in ["-a.com", "a-.com", "b.-a.com", "a..b", ".a", "a.", "..", "."] {
        assert!(encode_reverse(bad).is_err(), "{bad} should be rejected");
        assert!(
            wire::encode_wire(bad, true).is_err(),
            "{bad} should be rejected by wire encoder"
        );
    }
    // Interior hyphens are fine.
    assert!(encode_reverse("a-b-c.com").is_ok());
    assert!(wire::encode_wire("a-b-c.com", true).is_ok());
}

#[test]
fn test_wildcard_is_a_whole_label_token() {
    assert!(encode_reverse("*").is_ok());
    assert!(encode_reverse("*.google.com").is_ok());
    assert!(encode_reverse("a*b.com").is_err());
    assert!(encode_reverse("*a.com").is_err());
    // The wildcard key differs from any ordinary label.
    assert_ne!(
        encode_reverse("*").unwrap(),
        encode_reverse("a").unwrap()
    );
}

#[test]
fn test_escape_value_range() {
    assert!(wire::encode_wire("\\000.com", true).is_ok());
    assert!(wire::encode_wire("\\255.com", true).is_ok());
    for bad in ["\\256.com", "\\999.com", "\\99", "x\\"] {
        assert!(matches!(
            wire::encode_wire(bad, true),
            Err(StoreError::InvalidName(NameErrorKind::Escape)),
        ), "{bad}");
    }
}

#[test]
fn test_reverse_key_orders_suffixes_first() {
    // Shared suffixes become shared prefixes of the encoded key.
    let com = encode_reverse("com").unwrap();
    let google = encode_reverse("google.com").unwrap();
    let www = encode_reverse("www.google.com").unwrap();
    assert!(google.starts_with(&com[..]));
    assert!(www.starts_with(&google[..]));
}
