//! Page Store - typed page access, allocation and the metadata page.
//!
//! The [`PageStore`] sits on top of the [`DiskManager`] and owns:
//! - the in-memory copy of page 0 ([`Metadata`])
//! - the free-page list
//! - encoding/decoding of data pages through [`BTreePage`]
//!
//! There is no page cache: every `get_page` reads from the file.

use std::path::Path;

use log::{debug, trace};

use crate::common::config::{MAX_ORDER, MIN_ORDER};
use crate::common::{Error, IndexOptions, PageId, Result};
use crate::storage::disk_manager::DiskManager;
use crate::storage::meta::{Metadata, MAX_FREE_PAGES};
use crate::storage::page::{BTreePage, PageType};
use crate::storage::stats::IoStats;

/// Owns the index file, its metadata page and the page allocator.
///
/// # Example
/// ```
/// use bptree_index::storage::page::PageType;
/// use bptree_index::storage::PageStore;
/// use bptree_index::{IndexOptions, PageId};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("store.idx");
///
/// let mut store = PageStore::create(&path, &IndexOptions::new().order(4)).unwrap();
/// assert_eq!(store.root(), PageId::new(1));
///
/// let page = store.allocate_page(PageType::Leaf).unwrap();
/// assert_eq!(page.page_id(), PageId::new(2));
/// ```
pub struct PageStore {
    disk: DiskManager,
    meta: Metadata,
    stats: IoStats,
}

impl PageStore {
    /// Create a new index file: page 0 holds the metadata and page 1 an
    /// empty leaf that serves as the root.
    ///
    /// # Errors
    /// - `Error::InvalidOrder` if `options.order` is outside `[3, 65535]`
    /// - `Error::Io` if the file already exists or cannot be written
    pub fn create<P: AsRef<Path>>(path: P, options: &IndexOptions) -> Result<Self> {
        if !(MIN_ORDER..=MAX_ORDER).contains(&options.order) {
            return Err(Error::InvalidOrder(options.order));
        }

        let mut disk = DiskManager::create(&path)?;
        disk.set_sync_writes(options.sync_writes);

        let mut store = Self {
            disk,
            meta: Metadata::new(options.order),
            stats: IoStats::new(),
        };
        store.write_metadata()?;
        let root = BTreePage::empty(store.meta.root, PageType::Leaf);
        store.write_page(&root)?;

        debug!(
            "created index file {} with order {}",
            path.as_ref().display(),
            options.order
        );
        Ok(store)
    }

    /// Open an existing index file and load its metadata.
    ///
    /// `options.order` is ignored; the file keeps the order it was created with.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the file is too short to hold page 0
    /// - `Error::InvalidMagic` / `Error::ChecksumMismatch` / `Error::Corrupted`
    ///   if page 0 is not valid metadata
    pub fn open<P: AsRef<Path>>(path: P, options: &IndexOptions) -> Result<Self> {
        let mut disk = DiskManager::open(&path)?;
        disk.set_sync_writes(options.sync_writes);

        let mut store = Self {
            disk,
            meta: Metadata::new(MIN_ORDER),
            stats: IoStats::new(),
        };
        store.load_metadata()?;

        debug!(
            "opened index file {} ({} bytes): order {}, root {}, {} pages, {} free",
            path.as_ref().display(),
            store.disk.file_size(),
            store.meta.order,
            store.meta.root,
            store.disk.page_count(),
            store.meta.free_pages.len()
        );
        Ok(store)
    }

    /// Re-read page 0 and replace the in-memory metadata with it.
    pub fn load_metadata(&mut self) -> Result<&Metadata> {
        let page = self.disk.read_page(PageId::META)?;
        IoStats::record(&self.stats.pages_read);
        let meta = Metadata::decode(&page)?;

        let page_count = self.disk.page_count();
        if meta.root.0 >= page_count {
            return Err(Error::corrupted(
                PageId::META,
                format!("root {} beyond end of file", meta.root),
            ));
        }
        if let Some(id) = meta.free_pages.iter().find(|id| id.0 >= page_count) {
            return Err(Error::corrupted(
                PageId::META,
                format!("free {} beyond end of file", id),
            ));
        }

        self.meta = meta;
        Ok(&self.meta)
    }

    /// The in-memory metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Tree order recorded in the metadata page.
    pub fn order(&self) -> u32 {
        self.meta.order
    }

    /// Current root page.
    pub fn root(&self) -> PageId {
        self.meta.root
    }

    /// Point the metadata at a new root page and persist it.
    pub fn set_root(&mut self, root: PageId) -> Result<()> {
        if !root.is_data_page() || root.0 >= self.disk.page_count() {
            return Err(Error::InvalidPageId(root));
        }
        self.meta.root = root;
        self.write_metadata()
    }

    /// Read and decode a data page.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for page 0
    /// - `Error::PageNotFound` if the page lies beyond the end of the file
    /// - `Error::UnknownPageType` / `Error::Corrupted` if it does not decode
    pub fn get_page(&mut self, page_id: PageId) -> Result<BTreePage> {
        if !page_id.is_data_page() {
            return Err(Error::InvalidPageId(page_id));
        }
        let raw = self.disk.read_page(page_id)?;
        IoStats::record(&self.stats.pages_read);
        BTreePage::decode(page_id, &raw)
    }

    /// Encode a data page and write it at its offset, extending the file
    /// if needed.
    pub fn write_page(&mut self, page: &BTreePage) -> Result<()> {
        let page_id = page.page_id();
        if !page_id.is_data_page() {
            return Err(Error::InvalidPageId(page_id));
        }
        let raw = page.encode()?;
        self.disk.write_page(page_id, &raw)?;
        IoStats::record(&self.stats.pages_written);
        Ok(())
    }

    /// Hand out an empty page of the requested type.
    ///
    /// Reuses the most recently freed page if there is one, otherwise
    /// appends a page to the file. The empty page is written right away.
    pub fn allocate_page(&mut self, page_type: PageType) -> Result<BTreePage> {
        let reused = self.meta.free_pages.last().copied();
        let page_id = match reused {
            Some(id) => id,
            None => {
                let next = self.disk.page_count();
                if next == u32::MAX {
                    return Err(Error::InvalidPageId(PageId::new(next)));
                }
                PageId::new(next)
            }
        };

        let page = BTreePage::empty(page_id, page_type);
        self.write_page(&page)?;
        IoStats::record(&self.stats.pages_allocated);

        if reused.is_some() {
            self.meta.free_pages.pop();
            self.write_metadata()?;
            IoStats::record(&self.stats.pages_reused);
        }

        trace!("allocated {:?} {}", page_type, page_id);
        Ok(page)
    }

    /// Return a page to the free list and persist the metadata.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for page 0, the root, a page beyond the end
    ///   of the file, or a page that is already free
    /// - `Error::FreeListFull` if the metadata page has no room left
    pub fn free_page(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_data_page()
            || page_id == self.meta.root
            || page_id.0 >= self.disk.page_count()
            || self.meta.free_pages.contains(&page_id)
        {
            return Err(Error::InvalidPageId(page_id));
        }
        if self.meta.free_pages.len() >= MAX_FREE_PAGES {
            return Err(Error::FreeListFull(self.meta.free_pages.len()));
        }

        self.meta.free_pages.push(page_id);
        self.write_metadata()?;
        IoStats::record(&self.stats.pages_freed);

        trace!("freed {}", page_id);
        Ok(())
    }

    /// Number of pages in the file, including page 0.
    pub fn page_count(&self) -> u32 {
        self.disk.page_count()
    }

    /// I/O counters.
    pub fn stats(&self) -> &IoStats {
        &self.stats
    }

    /// `fsync()` the index file.
    pub fn flush(&mut self) -> Result<()> {
        self.disk.sync()
    }

    /// Flush and release the file. Unlike dropping the store, a failed
    /// sync is reported.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        debug!("closed index file: {}", self.stats.snapshot());
        Ok(())
    }

    fn write_metadata(&mut self) -> Result<()> {
        let page = self.meta.encode()?;
        self.disk.write_page(PageId::META, &page)?;
        IoStats::record(&self.stats.pages_written);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use crate::storage::page::{InternalPage, LeafPage};
    use tempfile::tempdir;

    fn options(order: u32) -> IndexOptions {
        IndexOptions::new().order(order)
    }

    #[test]
    fn test_create_initializes_meta_and_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let mut store = PageStore::create(&path, &options(4)).unwrap();
        assert_eq!(store.order(), 4);
        assert_eq!(store.root(), PageId::new(1));
        assert_eq!(store.page_count(), 2);
        assert!(store.metadata().free_pages.is_empty());

        let root = store.get_page(PageId::new(1)).unwrap().into_leaf().unwrap();
        assert!(root.is_empty());
        assert_eq!(root.next_page, None);
    }

    #[test]
    fn test_create_rejects_small_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let err = PageStore::create(&path, &options(2)).err().unwrap();
        assert!(matches!(err, Error::InvalidOrder(2)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!path.exists());
    }

    #[test]
    fn test_create_accepts_min_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let store = PageStore::create(&path, &options(MIN_ORDER)).unwrap();
        assert_eq!(store.order(), 3);
    }

    #[test]
    fn test_open_restores_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let mut store = PageStore::create(&path, &options(7)).unwrap();
            let page = store.allocate_page(PageType::Internal).unwrap();
            store.set_root(page.page_id()).unwrap();
            store.free_page(PageId::new(1)).unwrap();
        }

        let store = PageStore::open(&path, &options(100)).unwrap();
        assert_eq!(store.order(), 7);
        assert_eq!(store.root(), PageId::new(2));
        assert_eq!(store.metadata().free_pages, vec![PageId::new(1)]);
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        std::fs::write(&path, vec![0xAAu8; 8192]).unwrap();

        let err = PageStore::open(&path, &IndexOptions::new()).err().unwrap();
        assert!(matches!(err, Error::InvalidMagic(_)));
    }

    #[test]
    fn test_open_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        std::fs::write(&path, b"").unwrap();

        let err = PageStore::open(&path, &IndexOptions::new()).err().unwrap();
        assert!(matches!(err, Error::PageNotFound(_)));
    }

    #[test]
    fn test_load_metadata_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let mut store = PageStore::create(&path, &options(4)).unwrap();
        store.allocate_page(PageType::Leaf).unwrap();
        store.free_page(PageId::new(2)).unwrap();

        let first = store.load_metadata().unwrap().clone();
        let second = store.load_metadata().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.free_pages, vec![PageId::new(2)]);
    }

    #[test]
    fn test_write_and_get_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut store = PageStore::create(&path, &options(4)).unwrap();

        let leaf = BTreePage::Leaf(LeafPage {
            page_id: PageId::new(1),
            keys: vec![b"a".to_vec(), b"b".to_vec()],
            values: vec![10, 20],
            next_page: Some(PageId::new(3)),
        });
        store.write_page(&leaf).unwrap();

        let node = BTreePage::Internal(InternalPage {
            page_id: PageId::new(3),
            keys: vec![b"m".to_vec()],
            children: vec![PageId::new(1), PageId::new(2)],
        });
        store.write_page(&node).unwrap();
        assert_eq!(store.page_count(), 4);

        assert_eq!(store.get_page(PageId::new(1)).unwrap(), leaf);
        assert_eq!(store.get_page(PageId::new(3)).unwrap(), node);
    }

    #[test]
    fn test_get_page_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut store = PageStore::create(&path, &options(4)).unwrap();

        assert!(matches!(
            store.get_page(PageId::META),
            Err(Error::InvalidPageId(_))
        ));

        let err = store.get_page(PageId::new(50)).unwrap_err();
        assert!(matches!(err, Error::PageNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_allocate_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut store = PageStore::create(&path, &options(4)).unwrap();

        let a = store.allocate_page(PageType::Leaf).unwrap();
        let b = store.allocate_page(PageType::Internal).unwrap();
        assert_eq!(a.page_id(), PageId::new(2));
        assert_eq!(b.page_id(), PageId::new(3));
        assert_eq!(b.page_type(), PageType::Internal);
        assert_eq!(store.page_count(), 4);

        // The empty page is already on disk
        assert_eq!(store.get_page(PageId::new(3)).unwrap(), b);
    }

    #[test]
    fn test_allocate_reuses_freed_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut store = PageStore::create(&path, &options(4)).unwrap();

        for _ in 0..3 {
            store.allocate_page(PageType::Leaf).unwrap();
        }
        store.free_page(PageId::new(2)).unwrap();
        store.free_page(PageId::new(4)).unwrap();

        // Most recently freed first
        let page = store.allocate_page(PageType::Internal).unwrap();
        assert_eq!(page.page_id(), PageId::new(4));
        assert_eq!(store.metadata().free_pages, vec![PageId::new(2)]);
        assert_eq!(store.page_count(), 5);

        let page = store.allocate_page(PageType::Leaf).unwrap();
        assert_eq!(page.page_id(), PageId::new(2));
        assert!(store.metadata().free_pages.is_empty());

        let snapshot = store.stats().snapshot();
        assert_eq!(snapshot.pages_reused, 2);
        assert_eq!(snapshot.pages_freed, 2);
        assert_eq!(snapshot.pages_allocated, 5);

        // Free list change reached the disk
        let reloaded = store.load_metadata().unwrap();
        assert!(reloaded.free_pages.is_empty());
    }

    #[test]
    fn test_free_page_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut store = PageStore::create(&path, &options(4)).unwrap();
        store.allocate_page(PageType::Leaf).unwrap();

        assert!(matches!(store.free_page(PageId::META), Err(Error::InvalidPageId(_))));
        assert!(matches!(store.free_page(PageId::new(1)), Err(Error::InvalidPageId(_))));
        assert!(matches!(store.free_page(PageId::new(9)), Err(Error::InvalidPageId(_))));

        store.free_page(PageId::new(2)).unwrap();
        assert!(matches!(store.free_page(PageId::new(2)), Err(Error::InvalidPageId(_))));
    }

    #[test]
    fn test_set_root_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut store = PageStore::create(&path, &options(4)).unwrap();

        assert!(store.set_root(PageId::META).is_err());
        assert!(store.set_root(PageId::new(2)).is_err());
        assert_eq!(store.root(), PageId::new(1));
    }

    #[test]
    fn test_stats_count_io() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut store = PageStore::create(&path, &options(4)).unwrap();

        // meta + root leaf
        assert_eq!(store.stats().snapshot().pages_written, 2);

        store.get_page(PageId::new(1)).unwrap();
        store.get_page(PageId::new(1)).unwrap();
        assert_eq!(store.stats().snapshot().pages_read, 2);
    }
}
