//! Disk Manager - low-level file I/O for index pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing whole pages
//! - Extending the file when a page past the end is written
//! - Syncing the file to disk

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{trace, warn};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single index file.
///
/// # File Layout
/// The index is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (meta)  │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. Every method that touches the file
/// takes `&mut self`.
///
/// # Durability
/// Writes are not atomic: an interrupted write can tear that one page.
/// With `sync_writes` enabled every write is followed by `fsync()`;
/// otherwise the file is synced on [`DiskManager::sync`] and on drop.
pub struct DiskManager {
    file: File,
    /// Number of whole pages in the file.
    page_count: u32,
    /// Call `fsync()` after every page write.
    sync_writes: bool,
}

impl DiskManager {
    /// Create a new index file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
            sync_writes: false,
        })
    }

    /// Open an existing index file.
    ///
    /// A trailing partial page, if any, is ignored.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate page count from file size
        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64).min(u64::from(u32::MAX)) as u32;

        Ok(Self {
            file,
            page_count,
            sync_writes: false,
        })
    }

    /// Enable or disable `fsync()` after every page write.
    pub fn set_sync_writes(&mut self, sync: bool) {
        self.sync_writes = sync;
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page lies beyond the end of the file.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }

        trace!("read {}", page_id);
        self.file.seek(SeekFrom::Start(page_id.offset()))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// Writing at or past the end of the file extends it; any gap is
    /// zero-filled by the file system.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        trace!("write {}", page_id);
        self.file.seek(SeekFrom::Start(page_id.offset()))?;
        self.file.write_all(page.as_slice())?;
        if self.sync_writes {
            self.file.sync_all()?;
        }

        if page_id.0 >= self.page_count {
            self.page_count = page_id.0 + 1;
        }
        Ok(())
    }

    /// Flush buffered data and `fsync()` the file.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!("failed to sync index file on close: {}", e);
        }
    }
}
