//! Wire-length key encoding for the QP trie.
//!
//! Labels are emitted TLD-first as `[len][bytes...]` with every byte,
//! length included, mapped through the bitmap alphabet: one key byte for a
//! DNS hostname byte, two for anything else (split encoding). Input with no
//! backslash takes the fast path; input containing `\` goes through the
//! RFC 1035 §5.1 escape parser (`\DDD` decimal octet, `\X` literal byte).

use crate::constants::{MAX_LABELS, MAX_LABEL_LEN, MAX_NAME_LEN};
use crate::error::{NameErrorKind, Result, StoreError};
use super::table::BYTE_BITS;
use super::validate_label;

/// Encode a domain name into its QP byte key.
///
/// `fold` lowercases ASCII letters first (the default, case-insensitive
/// trie). The empty name encodes to the empty key.
pub fn encode_wire(name: &str, fold: bool) -> Result<Vec<u8>> {
    if name.is_empty() {
        return Ok(Vec::new());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidName(NameErrorKind::NameLength(
            name.len(),
        )));
    }

    let labels = if name.as_bytes().contains(&b'\\') {
        parse_escaped_labels(name.as_bytes())?
    } else {
        parse_plain_labels(name.as_bytes())?
    };

    if labels.len() > MAX_LABELS {
        return Err(StoreError::InvalidName(NameErrorKind::LabelCount(
            labels.len(),
        )));
    }
    let wire_len: usize = labels.iter().map(|l| 1 + l.len()).sum();
    if wire_len > MAX_NAME_LEN {
        return Err(StoreError::InvalidName(NameErrorKind::EncodedLength(
            wire_len,
        )));
    }

    Ok(encode_labels(&labels, fold))
}

/// Encode already-split raw label bytes. Wire input carries no escapes, so
/// this is the unconditional fast path.
pub fn encode_labels(labels: &[Vec<u8>], fold: bool) -> Vec<u8> {
    let mut key = Vec::with_capacity(labels.iter().map(|l| 1 + l.len()).sum::<usize>() + 8);
    for label in labels.iter().rev() {
        push_byte(&mut key, label.len() as u8);
        for &b in label {
            let b = if fold { b.to_ascii_lowercase() } else { b };
            push_byte(&mut key, b);
        }
    }
    key
}

#[inline]
fn push_byte(key: &mut Vec<u8>, b: u8) {
    let (hi, lo) = BYTE_BITS[b as usize];
    key.push(hi);
    if lo != 0 {
        key.push(lo);
    }
}

/// Fast path: no escapes, labels are dot-separated hostname text.
fn parse_plain_labels(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut labels = Vec::new();
    for label in bytes.split(|&b| b == b'.') {
        validate_label(label)?;
        check_charset(label)?;
        labels.push(label.to_vec());
    }
    Ok(labels)
}

/// Slow path: `\DDD` and `\X` escapes. Escaped bytes bypass the hostname
/// character-set check; that is what the escapes are for.
fn parse_escaped_labels(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut labels = Vec::new();
    let mut label = Vec::new();
    let mut escaped = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let (b, used) = parse_escape(&bytes[i..])?;
                label.push(b);
                escaped.push(true);
                i += used;
            }
            b'.' => {
                finish_label(&mut labels, &mut label, &mut escaped)?;
                i += 1;
                // A trailing dot would leave a final empty label, which the
                // length check below rejects; nothing special needed here.
                if i == bytes.len() {
                    return Err(StoreError::InvalidName(NameErrorKind::LabelLength(0)));
                }
            }
            b => {
                label.push(b);
                escaped.push(false);
                i += 1;
            }
        }
    }
    finish_label(&mut labels, &mut label, &mut escaped)?;
    Ok(labels)
}

fn finish_label(
    labels: &mut Vec<Vec<u8>>,
    label: &mut Vec<u8>,
    escaped: &mut Vec<bool>,
) -> Result<()> {
    validate_label(label)?;
    for (idx, &b) in label.iter().enumerate() {
        if !escaped[idx] {
            check_charset_byte(b, label.len() == 1)?;
        }
    }
    labels.push(std::mem::take(label));
    escaped.clear();
    Ok(())
}

fn check_charset(label: &[u8]) -> Result<()> {
    for &b in label {
        check_charset_byte(b, label.len() == 1)?;
    }
    Ok(())
}

#[inline]
fn check_charset_byte(b: u8, lone: bool) -> Result<()> {
    let ok = matches!(b, b'-' | b'/' | b'_' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
        || (b == b'*' && lone);
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName(NameErrorKind::Character(b)))
    }
}

/// Parse one escape starting at a backslash; returns (byte, bytes consumed).
fn parse_escape(rest: &[u8]) -> Result<(u8, usize)> {
    debug_assert_eq!(rest[0], b'\\');
    match rest.get(1).copied() {
        None => Err(StoreError::InvalidName(NameErrorKind::Escape)),
        Some(d0) if d0.is_ascii_digit() => {
            let (d1, d2) = match (rest.get(2).copied(), rest.get(3).copied()) {
                (Some(d1), Some(d2)) if d1.is_ascii_digit() && d2.is_ascii_digit() => (d1, d2),
                _ => return Err(StoreError::InvalidName(NameErrorKind::Escape)),
            };
            let value =
                (d0 - b'0') as u16 * 100 + (d1 - b'0') as u16 * 10 + (d2 - b'0') as u16;
            if value > 255 {
                return Err(StoreError::InvalidName(NameErrorKind::Escape));
            }
            Ok((value as u8, 4))
        }
        Some(x) => Ok((x, 2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::table::QP_NOBYTE;

    #[test]
    fn empty_name_empty_key() {
        assert_eq!(encode_wire("", true).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn every_key_byte_is_a_bitmap_bit() {
        for name in ["google.com", "a-b.c_d.e", "xn--55qx5d.example", "*.wild.org"] {
            for &b in &encode_wire(name, true).unwrap() {
                assert!(b > QP_NOBYTE && b <= crate::constants::QP_MAX_BIT, "byte {b} in {name}");
            }
        }
    }

    #[test]
    fn tld_first_shares_prefix() {
        let com = encode_wire("com", true).unwrap();
        let google = encode_wire("google.com", true).unwrap();
        assert_eq!(&google[..com.len()], &com[..]);
    }

    #[test]
    fn folding_unifies_case() {
        assert_eq!(
            encode_wire("GOOGLE.Com", true).unwrap(),
            encode_wire("google.com", true).unwrap()
        );
        assert_ne!(
            encode_wire("GOOGLE.Com", false).unwrap(),
            encode_wire("google.com", false).unwrap()
        );
    }

    #[test]
    fn escapes_decimal_and_literal() {
        // \065 = 'A', folded to 'a'
        assert_eq!(
            encode_wire("\\065bc.com", true).unwrap(),
            encode_wire("abc.com", true).unwrap()
        );
        // Escaped dot stays inside the label.
        let one = encode_wire("a\\.b.com", true).unwrap();
        let two = encode_wire("a.b.com", true).unwrap();
        assert_ne!(one, two);
        // Out-of-range and truncated escapes are rejected.
        assert!(matches!(
            encode_wire("\\256.com", true),
            Err(StoreError::InvalidName(NameErrorKind::Escape))
        ));
        assert!(matches!(
            encode_wire("\\25", true),
            Err(StoreError::InvalidName(NameErrorKind::Escape))
        ));
        assert!(matches!(
            encode_wire("tail\\", true),
            Err(StoreError::InvalidName(NameErrorKind::Escape))
        ));
    }

    #[test]
    fn escaped_bytes_take_split_encoding() {
        // 0xC3 sits in block 0xC0..=0xDF: expect a two-byte split pair.
        let key = encode_wire("a\\195b.com", true).unwrap();
        let plain = encode_wire("ab.com", true).unwrap();
        assert_eq!(key.len(), plain.len() + 2);
    }

    #[test]
    fn label_count_limit() {
        let name = vec!["a"; 127].join(".");
        assert!(encode_wire(&name, true).is_ok());
        let name = vec!["a"; 128].join(".");
        assert!(matches!(
            encode_wire(&name, true),
            Err(StoreError::InvalidName(NameErrorKind::LabelCount(128)))
        ));
    }

    #[test]
    fn ordering_matches_canonical_name_order() {
        let mut by_key: Vec<(Vec<u8>, &str)> = ["b.com", "a.com", "aa.com", "a.net", "com", "z.com"]
            .iter()
            .map(|n| (encode_wire(n, true).unwrap(), *n))
            .collect();
        by_key.sort();
        let ordered: Vec<&str> = by_key.into_iter().map(|(_, n)| n).collect();
        assert_eq!(ordered, ["com", "a.com", "aa.com", "b.com", "z.com", "a.net"]);
        // Shorter name sorts before its extension.
        assert!(encode_wire("com", true).unwrap() < encode_wire("google.com", true).unwrap());
    }
}
