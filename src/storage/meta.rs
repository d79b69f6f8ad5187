//! The metadata page (page 0).
//!
//! # Layout
//! ```text
//! Offset  Size      Field
//! ------  --------  -----
//! 0       4         magic (0x13579BDF)
//! 4       4         order
//! 8       8         root page id
//! 16      4         free page count
//! 20      4 × count free page ids
//! 4092    4         CRC32 of bytes [0, 4092)
//! ```
//!
//! All fields are little-endian.

use crate::common::config::{MAX_ORDER, META_MAGIC, MIN_ORDER, PAGE_SIZE};
use crate::common::{Error, PageId, Result};

use super::page::Page;

const OFFSET_MAGIC: usize = 0;
const OFFSET_ORDER: usize = 4;
const OFFSET_ROOT: usize = 8;
const OFFSET_FREE_COUNT: usize = 16;
const OFFSET_FREE_LIST: usize = 20;
const OFFSET_CHECKSUM: usize = PAGE_SIZE - 4;

/// Most free page ids the metadata page can hold.
pub const MAX_FREE_PAGES: usize = (OFFSET_CHECKSUM - OFFSET_FREE_LIST) / 4;

/// In-memory copy of page 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Maximum fan-out, fixed when the file is created.
    pub order: u32,
    /// Current root page.
    pub root: PageId,
    /// Pages available for reuse, popped from the back.
    pub free_pages: Vec<PageId>,
}

impl Metadata {
    /// Metadata for a fresh file whose root leaf is page 1.
    pub fn new(order: u32) -> Self {
        Self {
            order,
            root: PageId::new(1),
            free_pages: Vec::new(),
        }
    }

    /// Serialize into page 0.
    ///
    /// # Errors
    /// Returns `Error::FreeListFull` if the free list does not fit.
    pub fn encode(&self) -> Result<Page> {
        if self.free_pages.len() > MAX_FREE_PAGES {
            return Err(Error::FreeListFull(self.free_pages.len()));
        }

        let mut page = Page::new();
        page.write_u32(OFFSET_MAGIC, META_MAGIC);
        page.write_u32(OFFSET_ORDER, self.order);
        page.write_u64(OFFSET_ROOT, u64::from(self.root.0));
        page.write_u32(OFFSET_FREE_COUNT, self.free_pages.len() as u32);
        for (i, id) in self.free_pages.iter().enumerate() {
            page.write_u32(OFFSET_FREE_LIST + 4 * i, id.0);
        }
        page.write_u32(OFFSET_CHECKSUM, compute_checksum(&page));

        Ok(page)
    }

    /// Parse page 0.
    ///
    /// # Errors
    /// - `Error::InvalidMagic` if the file is not an index file
    /// - `Error::ChecksumMismatch` if the page was damaged
    /// - `Error::Corrupted` if the order, root or free list are out of range
    pub fn decode(page: &Page) -> Result<Self> {
        let magic = page.read_u32(OFFSET_MAGIC);
        if magic != META_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let stored = page.read_u32(OFFSET_CHECKSUM);
        let computed = compute_checksum(page);
        if stored != computed {
            return Err(Error::ChecksumMismatch { stored, computed });
        }

        let order = page.read_u32(OFFSET_ORDER);
        if !(MIN_ORDER..=MAX_ORDER).contains(&order) {
            return Err(Error::corrupted(
                PageId::META,
                format!("order {} out of range", order),
            ));
        }

        let root = data_page_id(page.read_u64(OFFSET_ROOT), "root")?;

        let free_count = page.read_u32(OFFSET_FREE_COUNT) as usize;
        if free_count > MAX_FREE_PAGES {
            return Err(Error::corrupted(
                PageId::META,
                format!("free page count {} overruns the page", free_count),
            ));
        }
        let free_pages = (0..free_count)
            .map(|i| data_page_id(u64::from(page.read_u32(OFFSET_FREE_LIST + 4 * i)), "free"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            order,
            root,
            free_pages,
        })
    }
}

/// CRC32 over everything in page 0 except the checksum field itself.
fn compute_checksum(page: &Page) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&page.as_slice()[..OFFSET_CHECKSUM]);
    hasher.finalize()
}

fn data_page_id(raw: u64, what: &str) -> Result<PageId> {
    match u32::try_from(raw) {
        Ok(id) if id != 0 => Ok(PageId::new(id)),
        _ => Err(Error::corrupted(
            PageId::META,
            format!("invalid {} page id {}", what, raw),
        )),
    }
}

// ============================================================================
// TESTS
// ============================================================================
