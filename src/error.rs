use std::io;
use thiserror::Error;

/// Why a domain name failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameErrorKind {
    /// Whole name longer than 255 bytes.
    NameLength(usize),
    /// Empty label or label longer than 63 bytes.
    LabelLength(usize),
    /// Label starts or ends with a hyphen.
    Hyphen,
    /// Byte with no code in the character map.
    Character(u8),
    /// Malformed RFC 1035 escape sequence.
    Escape,
    /// More than 127 labels.
    LabelCount(usize),
    /// Encoded wire form longer than 255 bytes.
    EncodedLength(usize),
}

/// What integrity check a snapshot file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptKind {
    Magic,
    Version,
    Endianness,
    /// Offset or length points outside the file.
    Bounds,
    NegativeLength,
    /// Blob length prefix disagrees with the node's value length.
    LengthMismatch,
    /// Node carries a label code outside the alphabet.
    LabelCode,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid domain name: {0:?}")]
    InvalidName(NameErrorKind),

    #[error("key not found")]
    KeyNotFound,

    #[error("key already exists")]
    AlreadyExists,

    #[error("store has been disposed")]
    Disposed,

    #[error("corrupt snapshot file: {0:?}")]
    Corrupt(CorruptKind),

    #[error("node capacity exceeded: {nodes} nodes, limit {limit}")]
    NodeCapacityExceeded { nodes: u64, limit: u64 },

    #[error("value capacity exceeded: {bytes} bytes, limit {limit}")]
    ValueCapacityExceeded { bytes: u64, limit: u64 },

    #[error("invalid argument")]
    InvalidArgument,

    #[error("value codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// True for errors caused by the caller's input rather than store state.
    /// Silent operations (`try_add`, `try_get`, ...) swallow exactly these.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidName(_) | StoreError::InvalidArgument
        )
    }
}
