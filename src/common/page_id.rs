//! Page identifier type.

use std::fmt;

use super::config::PAGE_SIZE;

/// Identifies a page in the index file.
///
/// Using `u32` allows for 4 billion pages:
/// - 4,294,967,296 pages × 4KB = 16TB maximum index size
///
/// Page 0 always holds the metadata, so no data page ever has id 0. The
/// on-disk encoding uses 0 as "no page" for the leaf chain pointer.
///
/// # Example
/// ```
/// use bptree_index::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_data_page());
/// assert_eq!(page_id.offset(), 42 * 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// The metadata page.
    pub const META: PageId = PageId(0);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Whether this id can hold a leaf or internal page.
    #[inline]
    pub fn is_data_page(&self) -> bool {
        *self != Self::META
    }

    /// Byte offset of this page in the index file.
    #[inline]
    pub fn offset(&self) -> u64 {
        u64::from(self.0) * PAGE_SIZE as u64
    }

    /// Decode an optional page link where 0 means "none".
    #[inline]
    pub fn from_link(raw: u32) -> Option<PageId> {
        if raw == 0 {
            None
        } else {
            Some(PageId(raw))
        }
    }

    /// Encode an optional page link where 0 means "none".
    #[inline]
    pub fn to_link(link: Option<PageId>) -> u32 {
        link.map_or(0, |id| id.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

/// Identifier of a record stored under a key.
pub type RecordId = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_new() {
        let pid = PageId::new(42);
        assert_eq!(pid.0, 42);
        assert!(pid.is_data_page());
    }

    #[test]
    fn test_meta_page_is_not_data() {
        assert!(!PageId::META.is_data_page());
        assert_eq!(PageId::META.offset(), 0);
    }

    #[test]
    fn test_page_id_offset() {
        assert_eq!(PageId::new(1).offset(), 4096);
        assert_eq!(PageId::new(u32::MAX).offset(), u64::from(u32::MAX) * 4096);
    }

    #[test]
    fn test_link_encoding() {
        assert_eq!(PageId::from_link(0), None);
        assert_eq!(PageId::from_link(7), Some(PageId::new(7)));
        assert_eq!(PageId::to_link(None), 0);
        assert_eq!(PageId::to_link(Some(PageId::new(7))), 7);
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert!(PageId::new(5) > PageId::new(3));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
    }
}
