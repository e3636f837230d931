//! # domtrie - Domain-Name Indexed Key-Value Store
//!
//! domtrie stores values under DNS names in a family of interchangeable
//! tries tuned for DNS-style workloads: deep hierarchies, heavily shared
//! suffixes, read-mostly traffic.
//!
//! ## Backends
//!
//! - **[`MmapStore`]**: a persistent, single-file, zero-copy snapshot trie.
//!   Readers map the file and never block; mutations accumulate in an
//!   in-memory staging trie and become visible through blue/green
//!   publishing (`swap()`), which writes a complete new file beside the old
//!   one and atomically retires the previous mapping once its readers
//!   drain.
//! - **[`QpStore`]**: a lock-free, case-insensitive, ordered QP-trie.
//!   Wait-free readers, CAS-publishing writers, popcount-indexed branches
//!   over a 51-bit bitmap alphabet, and an ordered cursor.
//!
//! Both backends share the [`NameStore`] operation surface and the RFC 1035
//! name validation and key-encoding discipline.
//!
//! ## Quick Start
//!
//! ### Lock-free in-memory store
//! ```rust
//! use domtrie::QpStore;
//!
//! # fn main() -> domtrie::Result<()> {
//! let store: QpStore<u32> = QpStore::new();
//! store.set("google.com", 1)?;
//! store.set("www.google.com", 2)?;
//!
//! assert_eq!(store.get("GOOGLE.COM")?, 1); // case-insensitive
//! assert_eq!(store.len(), 2);
//!
//! // Ordered traversal, ascending by encoded key.
//! let names: Vec<String> = store.enumerate().map(|(name, _)| name).collect();
//! assert_eq!(names, ["google.com", "www.google.com"]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Persistent snapshot store
//! ```no_run
//! use domtrie::{mmap::StoreBuilder, Utf8Codec};
//!
//! # fn main() -> domtrie::Result<()> {
//! let store = StoreBuilder::new("/var/lib/zones.snap").build(Utf8Codec)?;
//!
//! store.add("example.com", &"10.0.0.1".to_string())?;
//! store.swap()?; // publish a new snapshot generation
//!
//! assert_eq!(store.get("example.com")?, "10.0.0.1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency model
//!
//! - `MmapStore` readers acquire a lease (a reference-counted snapshot
//!   handle); a `swap()` concurrent with an enumeration never changes what
//!   that enumeration observes, and the superseded mapping is unmapped only
//!   after the last lease drops.
//! - `QpStore` publishes every branch mutation through a single CAS on an
//!   immutable `(bitmap, twigs)` state, so one acquire load gives readers a
//!   self-consistent view; writers restart on contention and never block.
//!
//! ## Errors
//!
//! Fallible operations return [`StoreError`]; the non-throwing forms
//! (`try_add`, `try_get`, `contains`, `try_remove`) turn input errors into
//! `false`/`None` and never fail on an invalid domain, while integrity
//! errors (corrupt snapshot files) always surface.

pub mod backend;
pub mod codec;
pub mod constants;
pub mod error;
pub mod mmap;
pub mod name;
pub mod qp;
pub mod stats;

pub use backend::NameStore;
pub use codec::{RawCodec, Utf8Codec, ValueCodec};
pub use error::{CorruptKind, NameErrorKind, Result, StoreError};
pub use mmap::MmapStore;
pub use qp::QpStore;
pub use stats::{Statistics, StatsSnapshot};

#[cfg(test)]
mod tests;
