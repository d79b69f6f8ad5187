//! Data page header and type definitions.
//!
//! Every leaf and internal page starts with a [`NodeHeader`]:
//! - [`PageType`] discriminator
//! - number of keys stored in the page
//! - next-leaf link (leaves only)

use crate::common::{Error, PageId, Result};

use super::page::Page;

/// Type of a data page.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// B+tree internal (navigation) page.
    Internal = 0,
    /// B+tree leaf page.
    Leaf = 1,
}

impl TryFrom<u8> for PageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(PageType::Internal),
            1 => Ok(PageType::Leaf),
            _ => Err(value),
        }
    }
}

/// Header stored at the beginning of every data page.
///
/// # Layout (7 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (0 = internal, 1 = leaf)
/// 1       2     key_count (little-endian)
/// 3       4     next_page (little-endian, 0 = none, always 0 for internal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    /// Type of this page.
    pub page_type: PageType,
    /// Number of keys in the page.
    pub key_count: u16,
    /// Next leaf in key order.
    pub next_page: Option<PageId>,
}

impl NodeHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 7;

    /// Offset of each field within the header.
    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_KEY_COUNT: usize = 1;
    pub const OFFSET_NEXT_PAGE: usize = 3;

    /// Create a header for an empty page of the given type.
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            key_count: 0,
            next_page: None,
        }
    }

    /// Read the header of the data page `page_id`.
    ///
    /// # Errors
    /// Returns `Error::UnknownPageType` if the type tag is not recognized.
    pub fn read_from(page: &Page, page_id: PageId) -> Result<Self> {
        let tag = page.as_slice()[Self::OFFSET_PAGE_TYPE];
        let page_type =
            PageType::try_from(tag).map_err(|tag| Error::UnknownPageType { page_id, tag })?;

        Ok(Self {
            page_type,
            key_count: page.read_u16(Self::OFFSET_KEY_COUNT),
            next_page: PageId::from_link(page.read_u32(Self::OFFSET_NEXT_PAGE)),
        })
    }

    /// Write this header to the beginning of a page.
    pub fn write_to(&self, page: &mut Page) {
        page.as_mut_slice()[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        page.write_u16(Self::OFFSET_KEY_COUNT, self.key_count);
        page.write_u32(Self::OFFSET_NEXT_PAGE, PageId::to_link(self.next_page));
    }
}

// ============================================================================
// TESTS
// ============================================================================
