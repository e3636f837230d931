//! Domain name validation and byte-key encoding.
//!
//! Both backends key their tries with byte sequences derived from a domain
//! name. The snapshot trie uses the reverse-label form (labels right to
//! left, dense character codes, code 0 between labels); the QP trie uses
//! the wire-length form (TLD first, `[len][bytes...]`, mapped through the
//! bitmap alphabet). Validation follows RFC 1035 §2.3.4: at most 255 bytes
//! per name, 1..=63 bytes per label, no leading or trailing hyphen, and the
//! hostname character set plus the lone `*` wildcard label.

pub mod table;
pub mod wire;

use crate::constants::{CODE_SEPARATOR, CODE_WILDCARD, MAX_LABEL_LEN, MAX_NAME_LEN};
use crate::error::{CorruptKind, NameErrorKind, Result, StoreError};
use table::{CHAR_CODES, CODE_CHARS, NO_CODE};

/// Validate `name` and produce its reverse-label byte key.
///
/// The empty name encodes to the empty key and addresses the root node.
/// A lone `*` label becomes the wildcard code, so `*` and `*.example.com`
/// are valid while `a*b.example.com` is not.
pub fn encode_reverse(name: &str) -> Result<Vec<u8>> {
    if name.is_empty() {
        return Ok(Vec::new());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(StoreError::InvalidName(NameErrorKind::NameLength(
            name.len(),
        )));
    }

    let bytes = name.as_bytes();
    let mut key = Vec::with_capacity(bytes.len());
    let mut first = true;
    for label in bytes.rsplit(|&b| b == b'.') {
        if !first {
            key.push(CODE_SEPARATOR);
        }
        first = false;
        validate_label(label)?;
        if label.len() == 1 && label[0] == b'*' {
            key.push(CODE_WILDCARD);
            continue;
        }
        for &b in label {
            let code = CHAR_CODES[b as usize];
            if code == NO_CODE || code == CODE_WILDCARD {
                return Err(StoreError::InvalidName(NameErrorKind::Character(b)));
            }
            key.push(code);
        }
    }
    Ok(key)
}

/// Structural and hostname checks for one raw label.
pub(crate) fn validate_label(label: &[u8]) -> Result<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(StoreError::InvalidName(NameErrorKind::LabelLength(
            label.len(),
        )));
    }
    if label[0] == b'-' || label[label.len() - 1] == b'-' {
        return Err(StoreError::InvalidName(NameErrorKind::Hyphen));
    }
    Ok(())
}

/// Rebuild the canonical lowercase name from a reverse-label key.
///
/// Used by the snapshot enumerator; a code outside the alphabet means the
/// file is damaged, not that the caller passed bad input.
pub fn decode_reverse(key: &[u8]) -> Result<String> {
    if key.is_empty() {
        return Ok(String::new());
    }
    let mut labels: Vec<&[u8]> = key.split(|&c| c == CODE_SEPARATOR).collect();
    labels.reverse();
    let mut name = String::with_capacity(key.len());
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            name.push('.');
        }
        for &code in *label {
            if code >= CODE_CHARS.len() as u8 {
                return Err(StoreError::Corrupt(CorruptKind::LabelCode));
            }
            name.push(CODE_CHARS[code as usize] as char);
        }
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_root() {
        assert_eq!(encode_reverse("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_reverse(&[]).unwrap(), "");
    }

    #[test]
    fn labels_reverse_and_separate() {
        let key = encode_reverse("google.com").unwrap();
        let com = [CHAR_CODES[b'c' as usize], CHAR_CODES[b'o' as usize], CHAR_CODES[b'm' as usize]];
        assert_eq!(&key[..3], &com);
        assert_eq!(key[3], CODE_SEPARATOR);
        assert_eq!(decode_reverse(&key).unwrap(), "google.com");
    }

    #[test]
    fn case_folds_to_lowercase() {
        assert_eq!(
            encode_reverse("GoOgLe.CoM").unwrap(),
            encode_reverse("google.com").unwrap()
        );
        let key = encode_reverse("GOOGLE.COM").unwrap();
        assert_eq!(decode_reverse(&key).unwrap(), "google.com");
    }

    #[test]
    fn wildcard_label() {
        assert_eq!(encode_reverse("*").unwrap(), vec![CODE_WILDCARD]);
        let key = encode_reverse("*.example.com").unwrap();
        assert_eq!(*key.last().unwrap(), CODE_WILDCARD);
        assert!(matches!(
            encode_reverse("a*b.example.com"),
            Err(StoreError::InvalidName(NameErrorKind::Character(b'*')))
        ));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(
            encode_reverse(&"a".repeat(256)),
            Err(StoreError::InvalidName(NameErrorKind::NameLength(256)))
        ));
        assert!(matches!(
            encode_reverse("a..b"),
            Err(StoreError::InvalidName(NameErrorKind::LabelLength(0)))
        ));
        assert!(matches!(
            encode_reverse(".leading"),
            Err(StoreError::InvalidName(NameErrorKind::LabelLength(0)))
        ));
        assert!(matches!(
            encode_reverse("trailing."),
            Err(StoreError::InvalidName(NameErrorKind::LabelLength(0)))
        ));
        let long = "b".repeat(64);
        assert!(matches!(
            encode_reverse(&long),
            Err(StoreError::InvalidName(NameErrorKind::LabelLength(64)))
        ));
        assert!(matches!(
            encode_reverse("-dash.com"),
            Err(StoreError::InvalidName(NameErrorKind::Hyphen))
        ));
        assert!(matches!(
            encode_reverse("dash-.com"),
            Err(StoreError::InvalidName(NameErrorKind::Hyphen))
        ));
        assert!(matches!(
            encode_reverse("sp ace.com"),
            Err(StoreError::InvalidName(NameErrorKind::Character(b' ')))
        ));
    }

    #[test]
    fn boundary_lengths_accepted() {
        let label63 = "c".repeat(63);
        assert!(encode_reverse(&label63).is_ok());
        // 255 bytes total: 63 + 1 + 63 + 1 + 63 + 1 + 63 = 255
        let name255 = format!("{l}.{l}.{l}.{l}", l = label63);
        assert_eq!(name255.len(), 255);
        assert!(encode_reverse(&name255).is_ok());
    }

    #[test]
    fn distinct_names_distinct_keys() {
        let names = ["com", "google.com", "www.google.com", "mail.google.com", "*"];
        let mut keys: Vec<Vec<u8>> = names.iter().map(|n| encode_reverse(n).unwrap()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), names.len());
    }
}
