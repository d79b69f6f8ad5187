//! Configuration constants and open options for the index.

/// Size of a page in bytes (4KB).
///
/// Every page in the index file, including the metadata page, occupies
/// exactly this many bytes. Page N starts at file offset `N × PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Order used when a new index is created without an explicit one.
pub const DEFAULT_ORDER: u32 = 100;

/// Smallest legal order. A B+tree needs at least ternary branching
/// for a split to leave both halves non-empty.
pub const MIN_ORDER: u32 = 3;

/// Largest legal order. Key counts are stored as a `u16`.
pub const MAX_ORDER: u32 = u16::MAX as u32;

/// Longest key accepted by `insert`, in bytes.
///
/// An entry of this size takes less than a quarter of a page, so any page
/// that overflows on bytes can always be cut into two halves that fit.
pub const MAX_KEY_SIZE: usize = 1000;

/// Magic number at the start of page 0 identifying the file format.
pub const META_MAGIC: u32 = 0x1357_9BDF;

/// Options used when creating or opening an index.
///
/// # Example
/// ```
/// use bptree_index::IndexOptions;
///
/// let options = IndexOptions::new().order(4).sync_writes(true);
/// assert_eq!(options.order, 4);
/// assert!(options.sync_writes);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Maximum fan-out of an internal page. Only used when a new file is
    /// created; an existing file keeps the order it was created with.
    pub order: u32,
    /// Call `fsync()` after every page write.
    ///
    /// Off by default. The file is always synced on `flush`, `close`
    /// and drop.
    pub sync_writes: bool,
}

impl IndexOptions {
    /// Options with the default order and no per-write sync.
    pub fn new() -> Self {
        Self {
            order: DEFAULT_ORDER,
            sync_writes: false,
        }
    }

    /// Set the order for newly created files.
    pub fn order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    /// Enable or disable fsync after every page write.
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self::new()
    }
}
