//! The B+tree index: navigation, search, range scans and insertion.

use std::path::Path;

use log::{debug, trace};

use crate::common::config::{MAX_KEY_SIZE, PAGE_SIZE};
use crate::common::{Error, IndexOptions, PageId, RecordId, Result};
use crate::storage::page::{BTreePage, InternalPage, LeafPage, PageType};
use crate::storage::{PageStore, StatsSnapshot};

use super::scan::RangeScan;
use super::split::{internal_split_point, leaf_split_point};

/// Deepest descent tolerated before the tree is declared cyclic. An order-3
/// tree over every addressable page is far shallower than this.
pub(super) const MAX_HEIGHT: usize = 64;

/// A disk-backed B+tree mapping byte-string keys to record ids.
///
/// Pages are not cached: each operation reads the pages it needs from the
/// file and writes back the ones it changes. Parents are found through the
/// path recorded on the way down, never through back links.
///
/// # Duplicate keys
/// Inserting a key that is already present adds another entry after the
/// existing ones. [`search`](Self::search) returns all of them in insertion
/// order.
///
/// # Example
/// ```
/// use bptree_index::BPlusTreeIndex;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut index = BPlusTreeIndex::create(dir.path().join("names.idx"), 4).unwrap();
///
/// index.insert(b"alice", 1001).unwrap();
/// index.insert(b"bob", 1002).unwrap();
/// index.insert(b"carol", 1003).unwrap();
///
/// assert_eq!(index.search(b"bob").unwrap(), vec![1002]);
/// assert_eq!(index.range_query(b"b", b"d").unwrap(), vec![1002, 1003]);
/// ```
pub struct BPlusTreeIndex {
    pub(super) store: PageStore,
}

impl BPlusTreeIndex {
    /// Create a new index file with the given order.
    ///
    /// # Errors
    /// - `Error::InvalidOrder` if `order` is below 3 or above 65535
    /// - `Error::Io` if the file already exists or cannot be written
    pub fn create<P: AsRef<Path>>(path: P, order: u32) -> Result<Self> {
        Self::create_with(path, &IndexOptions::new().order(order))
    }

    /// Create a new index file with explicit options.
    pub fn create_with<P: AsRef<Path>>(path: P, options: &IndexOptions) -> Result<Self> {
        Ok(Self {
            store: PageStore::create(path, options)?,
        })
    }

    /// Open an existing index file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &IndexOptions::new())
    }

    /// Open an existing index file with explicit options.
    pub fn open_with<P: AsRef<Path>>(path: P, options: &IndexOptions) -> Result<Self> {
        Ok(Self {
            store: PageStore::open(path, options)?,
        })
    }

    /// Open the index at `path`, creating it with `order` if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, order: u32) -> Result<Self> {
        let options = IndexOptions::new().order(order);
        if path.as_ref().exists() {
            Self::open_with(path, &options)
        } else {
            Self::create_with(path, &options)
        }
    }

    /// Maximum fan-out of the tree.
    pub fn order(&self) -> u32 {
        self.store.order()
    }

    /// Current root page.
    pub fn root_page_id(&self) -> PageId {
        self.store.root()
    }

    /// I/O counters since the index was opened.
    pub fn stats(&self) -> StatsSnapshot {
        self.store.stats().snapshot()
    }

    /// Borrow the underlying page store.
    pub fn page_store(&mut self) -> &mut PageStore {
        &mut self.store
    }

    /// All record ids stored under `key`, in insertion order.
    pub fn search(&mut self, key: &[u8]) -> Result<Vec<RecordId>> {
        self.range(key, key)?
            .map(|entry| entry.map(|(_, value)| value))
            .collect()
    }

    /// Record ids of every key in `[start, end]`, in ascending key order.
    ///
    /// Returns an empty result when `start > end`.
    pub fn range_query(&mut self, start: &[u8], end: &[u8]) -> Result<Vec<RecordId>> {
        self.range(start, end)?
            .map(|entry| entry.map(|(_, value)| value))
            .collect()
    }

    /// Iterate over the entries with keys in `[start, end]`.
    pub fn range(&mut self, start: &[u8], end: &[u8]) -> Result<RangeScan<'_>> {
        if start > end {
            return Ok(RangeScan::empty(&mut self.store));
        }
        let leaf = self.locate_first_leaf(start)?;
        let pos = leaf.lower_bound(start);
        Ok(RangeScan::new(&mut self.store, leaf, pos, Some(end.to_vec())))
    }

    /// Iterate over every entry in key order.
    pub fn iter(&mut self) -> Result<RangeScan<'_>> {
        let (leaf, _) = self.descend(|node| node.children.first().copied())?;
        Ok(RangeScan::new(&mut self.store, leaf, 0, None))
    }

    /// Number of entries in the index. Walks the whole leaf chain.
    pub fn len(&mut self) -> Result<usize> {
        self.iter()?.try_fold(0, |count, entry| entry.map(|_| count + 1))
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        let root = self.store.get_page(self.store.root())?;
        Ok(matches!(root, BTreePage::Leaf(ref leaf) if leaf.is_empty()))
    }

    /// Number of levels, 1 when the root is a leaf.
    pub fn height(&mut self) -> Result<usize> {
        let (_, path) = self.descend(|node| node.children.first().copied())?;
        Ok(path.len() + 1)
    }

    /// Insert `key` with `value`.
    ///
    /// # Errors
    /// Returns `Error::KeyTooLarge` if the key is longer than `MAX_KEY_SIZE`.
    /// An I/O error during a split leaves the pages already written in place.
    pub fn insert(&mut self, key: &[u8], value: RecordId) -> Result<()> {
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge {
                len: key.len(),
                max: MAX_KEY_SIZE,
            });
        }

        let (mut leaf, path) = self.locate_leaf(key)?;
        leaf.insert(key, value);
        if !self.overflows(leaf.len(), leaf.encoded_len()) {
            return self.store.write_page(&BTreePage::Leaf(leaf));
        }

        let left = leaf.page_id;
        let (separator, right) = self.split_leaf(leaf)?;
        self.insert_into_parent(left, separator, right, path)
    }

    /// Flush the index file to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    /// Flush and close the index.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Descend to the leaf where `key` belongs, recording the internal
    /// pages passed on the way. A key equal to a separator goes right.
    pub(crate) fn locate_leaf(&mut self, key: &[u8]) -> Result<(LeafPage, Vec<PageId>)> {
        self.descend(|node| node.child_for(key).ok())
    }

    /// Descend to the leftmost leaf that can hold `key`.
    fn locate_first_leaf(&mut self, key: &[u8]) -> Result<LeafPage> {
        let (leaf, _) = self.descend(|node| node.first_child_for(key).ok())?;
        Ok(leaf)
    }

    fn descend<F>(&mut self, mut route: F) -> Result<(LeafPage, Vec<PageId>)>
    where
        F: FnMut(&InternalPage) -> Option<PageId>,
    {
        let mut path = Vec::new();
        let mut page_id = self.store.root();
        loop {
            match self.store.get_page(page_id)? {
                BTreePage::Leaf(leaf) => return Ok((leaf, path)),
                BTreePage::Internal(node) => {
                    if path.len() >= MAX_HEIGHT {
                        return Err(Error::corrupted(page_id, "tree deeper than any valid tree"));
                    }
                    path.push(page_id);
                    page_id = route(&node)
                        .ok_or_else(|| Error::corrupted(page_id, "internal page without children"))?;
                    trace!("descend {} -> {}", node.page_id, page_id);
                }
            }
        }
    }

    fn overflows(&self, key_count: usize, encoded_len: usize) -> bool {
        key_count > self.store.order() as usize - 1 || encoded_len > PAGE_SIZE
    }

    /// Move the upper part of `leaf` into a new right sibling and link it
    /// into the chain. Returns the separator (the sibling's first key,
    /// which stays in the sibling) and the sibling's id.
    fn split_leaf(&mut self, mut leaf: LeafPage) -> Result<(Vec<u8>, PageId)> {
        let at = leaf_split_point(self.store.order() as usize, &leaf.keys);
        let mut right = self.store.allocate_page(PageType::Leaf)?.into_leaf()?;

        right.keys = leaf.keys.split_off(at);
        right.values = leaf.values.split_off(at);
        right.next_page = leaf.next_page;
        leaf.next_page = Some(right.page_id);

        let separator = right.keys[0].clone();
        let right_id = right.page_id;
        debug!(
            "split leaf {}: {} keys stay, {} move to {}",
            leaf.page_id,
            leaf.len(),
            right.len(),
            right_id
        );

        // Sibling first, so the chain never links to an unwritten page.
        self.store.write_page(&BTreePage::Leaf(right))?;
        self.store.write_page(&BTreePage::Leaf(leaf))?;
        Ok((separator, right_id))
    }

    /// Move the keys after the middle one into a new right sibling. The
    /// middle key leaves both pages and is returned for the parent.
    fn split_internal(&mut self, mut node: InternalPage) -> Result<(Vec<u8>, PageId)> {
        let mid = internal_split_point(self.store.order() as usize, &node.keys);
        let mut right = self.store.allocate_page(PageType::Internal)?.into_internal()?;

        right.keys = node.keys.split_off(mid + 1);
        right.children = node.children.split_off(mid + 1);
        let promoted = node
            .keys
            .pop()
            .ok_or_else(|| Error::corrupted(node.page_id, "split of an empty internal page"))?;

        let right_id = right.page_id;
        debug!(
            "split internal {}: {} keys stay, {} move to {}",
            node.page_id,
            node.len(),
            right.len(),
            right_id
        );

        self.store.write_page(&BTreePage::Internal(right))?;
        self.store.write_page(&BTreePage::Internal(node))?;
        Ok((promoted, right_id))
    }

    /// Hook the new page `right` into the tree next to `left`, splitting
    /// ancestors from the bottom of `path` upward as long as they overflow.
    fn insert_into_parent(
        &mut self,
        mut left: PageId,
        mut separator: Vec<u8>,
        mut right: PageId,
        mut path: Vec<PageId>,
    ) -> Result<()> {
        while let Some(parent_id) = path.pop() {
            let mut parent = self.store.get_page(parent_id)?.into_internal()?;
            let idx = parent.child_index(left).ok_or_else(|| {
                Error::corrupted(parent_id, format!("{} is not a child", left))
            })?;
            parent.keys.insert(idx, separator);
            parent.children.insert(idx + 1, right);

            if !self.overflows(parent.len(), parent.encoded_len()) {
                return self.store.write_page(&BTreePage::Internal(parent));
            }

            let (promoted, sibling) = self.split_internal(parent)?;
            left = parent_id;
            separator = promoted;
            right = sibling;
        }

        self.grow_root(left, separator, right)
    }

    /// Replace the root with a new internal page over `left` and `right`.
    fn grow_root(&mut self, left: PageId, separator: Vec<u8>, right: PageId) -> Result<()> {
        let mut root = self.store.allocate_page(PageType::Internal)?.into_internal()?;
        root.keys.push(separator);
        root.children = vec![left, right];

        let root_id = root.page_id;
        self.store.write_page(&BTreePage::Internal(root))?;
        self.store.set_root(root_id)?;

        debug!("root split: {} now roots {} and {}", root_id, left, right);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
