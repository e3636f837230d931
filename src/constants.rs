// Domain name limits (RFC 1035)
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_LABELS: usize = 127;

// Reverse-label character codes (MMAP key alphabet)
pub const CODE_SEPARATOR: u8 = 0; // '.'
pub const CODE_WILDCARD: u8 = 1; // whole-label '*'
pub const CODE_COUNT: u8 = 41;

// Snapshot file layout
pub const SNAPSHOT_MAGIC: u32 = u32::from_le_bytes(*b"MMAP");
pub const SNAPSHOT_VERSION: u16 = 1;
pub const SNAPSHOT_ENDIAN_LE: u16 = 1;
pub const HEADER_SIZE: u64 = 32;
pub const NODE_SIZE: u64 = 28;
// The value region starts with pad bytes so every real blob offset is
// positive; offset 0 stays the no-value sentinel.
pub const VALUE_REGION_PAD: u64 = 4;

// Sidecar suffixes used by blue/green publishing and crash recovery
pub const TEMP_SUFFIX: &str = "tmp";
pub const BACKUP_SUFFIX: &str = "bak";

// Default capacity hints for the writer; a publish exceeding these fails
// with a capacity error and rolls back.
pub const DEFAULT_NODE_CAPACITY: u64 = 1 << 24;
pub const DEFAULT_VALUE_CAPACITY: u64 = 1 << 32;

// QP-trie bitmap layout: 64 bits, meaningful range 2..=52.
pub const QP_BITMAP_MASK: u64 = ((1u64 << 53) - 1) & !0b11;
pub const QP_MAX_BIT: u8 = 52;

// Inline threshold below which bulk build falls back to per-item inserts.
pub const BULK_INLINE_MAX: usize = 16;
