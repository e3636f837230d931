use std::path::PathBuf;

use crate::codec::ValueCodec;
use crate::constants::{DEFAULT_NODE_CAPACITY, DEFAULT_VALUE_CAPACITY};
use crate::error::Result;

use super::MmapStore;

/// Resolved configuration for an [`MmapStore`].
pub struct StoreConfig {
    pub path: PathBuf,
    pub node_capacity: u64,
    pub value_capacity: u64,
}

/// Fluent builder for [`MmapStore`].
///
/// # Example
///
/// ```no_run
/// use domtrie::{mmap::StoreBuilder, Utf8Codec};
///
/// # fn main() -> domtrie::Result<()> {
/// let store = StoreBuilder::new("/path/to/zones.snap")
///     .node_capacity(1 << 20)
///     .build(Utf8Codec)?;
/// # Ok(())
/// # }
/// ```
pub struct StoreBuilder {
    path: PathBuf,
    node_capacity: u64,
    value_capacity: u64,
}

impl StoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            node_capacity: DEFAULT_NODE_CAPACITY,
            value_capacity: DEFAULT_VALUE_CAPACITY,
        }
    }

    /// Cap the number of nodes a publish may serialize.
    ///
    /// A `swap()` that would exceed the cap fails with
    /// `NodeCapacityExceeded` and leaves the active snapshot unchanged.
    pub fn node_capacity(mut self, nodes: u64) -> Self {
        self.node_capacity = nodes;
        self
    }

    /// Cap the value-region size (in bytes) a publish may serialize.
    pub fn value_capacity(mut self, bytes: u64) -> Self {
        self.value_capacity = bytes;
        self
    }

    /// Open the store, recovering crash sidecars and bootstrapping an empty
    /// snapshot when the target file does not exist yet.
    pub fn build<C: ValueCodec>(self, codec: C) -> Result<MmapStore<C>> {
        MmapStore::with_config(
            StoreConfig {
                path: self.path,
                node_capacity: self.node_capacity,
                value_capacity: self.value_capacity,
            },
            codec,
        )
    }
}
