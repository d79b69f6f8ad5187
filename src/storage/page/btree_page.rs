//! Typed leaf and internal pages and their on-disk encoding.
//!
//! # Layout
//! ```text
//! ┌──────────────┬───────────────────────────────────────────────┐
//! │ NodeHeader   │ entries                                       │
//! │ (7 bytes)    │                                               │
//! └──────────────┴───────────────────────────────────────────────┘
//!
//! leaf entry:      [key_len: u16][key bytes][record id: u64]
//! internal entry:  [key_len: u16][key bytes][child id: u64]
//! internal page:   entry × key_count, then one trailing [child id: u64]
//! ```
//!
//! Everything is little-endian. Unused bytes at the end of a page are zero.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};

use super::page::Page;
use super::page_header::{NodeHeader, PageType};

/// Bytes an entry takes besides the key itself: length prefix + payload.
pub const ENTRY_OVERHEAD: usize = 2 + 8;

/// Bytes taken by the trailing child id of an internal page.
pub const CHILD_ID_SIZE: usize = 8;

/// Encoded size of one entry holding `key`.
#[inline]
pub fn entry_len(key: &[u8]) -> usize {
    ENTRY_OVERHEAD + key.len()
}

/// A leaf page: sorted keys with one record id each.
///
/// `keys[i]` maps to `values[i]`. Equal keys are allowed and keep the
/// order in which they were inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPage {
    pub page_id: PageId,
    pub keys: Vec<Vec<u8>>,
    pub values: Vec<RecordId>,
    /// Next leaf in ascending key order.
    pub next_page: Option<PageId>,
}

impl LeafPage {
    /// Create an empty leaf with no successor.
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            keys: Vec::new(),
            values: Vec::new(),
            next_page: None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Bytes this page occupies once encoded.
    pub fn encoded_len(&self) -> usize {
        NodeHeader::SIZE + self.keys.iter().map(|k| entry_len(k)).sum::<usize>()
    }

    /// Index of the first key that is `>= key`.
    pub fn lower_bound(&self, key: &[u8]) -> usize {
        self.keys.partition_point(|k| k.as_slice() < key)
    }

    /// Index of the first key that is `> key`.
    pub fn upper_bound(&self, key: &[u8]) -> usize {
        self.keys.partition_point(|k| k.as_slice() <= key)
    }

    /// Insert an entry at its sorted position, after any equal keys.
    pub fn insert(&mut self, key: &[u8], value: RecordId) {
        let pos = self.upper_bound(key);
        self.keys.insert(pos, key.to_vec());
        self.values.insert(pos, value);
    }
}

/// An internal page: `N` separator keys and `N + 1` child page ids.
///
/// `children[i]` holds keys in `[keys[i - 1], keys[i])`; the first child has
/// no lower bound and the last has no upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalPage {
    pub page_id: PageId,
    pub keys: Vec<Vec<u8>>,
    pub children: Vec<PageId>,
}

impl InternalPage {
    /// Create an internal page with no keys and no children.
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Bytes this page occupies once encoded.
    pub fn encoded_len(&self) -> usize {
        let trailing = if self.children.is_empty() { 0 } else { CHILD_ID_SIZE };
        NodeHeader::SIZE + self.keys.iter().map(|k| entry_len(k)).sum::<usize>() + trailing
    }

    /// Child covering `key`. A key equal to a separator goes right.
    pub fn child_for(&self, key: &[u8]) -> Result<PageId> {
        let idx = self.keys.partition_point(|k| k.as_slice() <= key);
        self.child_at(idx)
    }

    /// Leftmost child that may hold `key`. A key equal to a separator goes
    /// left, since duplicates of a separator can sit at the end of the left
    /// subtree.
    pub fn first_child_for(&self, key: &[u8]) -> Result<PageId> {
        let idx = self.keys.partition_point(|k| k.as_slice() < key);
        self.child_at(idx)
    }

    /// Position of `child` among this page's children.
    pub fn child_index(&self, child: PageId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    fn child_at(&self, idx: usize) -> Result<PageId> {
        self.children
            .get(idx)
            .copied()
            .ok_or_else(|| Error::corrupted(self.page_id, format!("missing child {}", idx)))
    }
}

/// A decoded data page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BTreePage {
    Leaf(LeafPage),
    Internal(InternalPage),
}

impl BTreePage {
    /// An empty page of the given type.
    pub fn empty(page_id: PageId, page_type: PageType) -> Self {
        match page_type {
            PageType::Leaf => BTreePage::Leaf(LeafPage::new(page_id)),
            PageType::Internal => BTreePage::Internal(InternalPage::new(page_id)),
        }
    }

    pub fn page_id(&self) -> PageId {
        match self {
            BTreePage::Leaf(leaf) => leaf.page_id,
            BTreePage::Internal(node) => node.page_id,
        }
    }

    pub fn page_type(&self) -> PageType {
        match self {
            BTreePage::Leaf(_) => PageType::Leaf,
            BTreePage::Internal(_) => PageType::Internal,
        }
    }

    pub fn keys(&self) -> &[Vec<u8>] {
        match self {
            BTreePage::Leaf(leaf) => &leaf.keys,
            BTreePage::Internal(node) => &node.keys,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            BTreePage::Leaf(leaf) => leaf.encoded_len(),
            BTreePage::Internal(node) => node.encoded_len(),
        }
    }

    /// Unwrap a leaf, failing if the page turned out to be internal.
    pub fn into_leaf(self) -> Result<LeafPage> {
        match self {
            BTreePage::Leaf(leaf) => Ok(leaf),
            BTreePage::Internal(node) => {
                Err(Error::corrupted(node.page_id, "expected a leaf page"))
            }
        }
    }

    /// Unwrap an internal page, failing if the page turned out to be a leaf.
    pub fn into_internal(self) -> Result<InternalPage> {
        match self {
            BTreePage::Internal(node) => Ok(node),
            BTreePage::Leaf(leaf) => {
                Err(Error::corrupted(leaf.page_id, "expected an internal page"))
            }
        }
    }

    /// Serialize into a zero-padded page buffer.
    ///
    /// # Errors
    /// Returns `Error::PageOverflow` if the entries do not fit in one page,
    /// and `Error::Corrupted` if an internal page's child count is not its
    /// key count plus one.
    pub fn encode(&self) -> Result<Page> {
        let page_id = self.page_id();
        let len = self.encoded_len();
        if len > PAGE_SIZE {
            return Err(Error::PageOverflow { page_id, len });
        }

        let mut page = Page::new();
        let mut offset = NodeHeader::SIZE;
        let mut put_entry = |page: &mut Page, key: &[u8], payload: u64| {
            page.write_u16(offset, key.len() as u16);
            page.write_bytes(offset + 2, key);
            page.write_u64(offset + 2 + key.len(), payload);
            offset += entry_len(key);
        };

        let mut header = NodeHeader::new(self.page_type());
        header.key_count = self.keys().len() as u16;
        match self {
            BTreePage::Leaf(leaf) => {
                if leaf.keys.len() != leaf.values.len() {
                    return Err(Error::corrupted(page_id, "key and value counts differ"));
                }
                for (key, &value) in leaf.keys.iter().zip(&leaf.values) {
                    put_entry(&mut page, key, value);
                }
                header.next_page = leaf.next_page;
            }
            BTreePage::Internal(node) => {
                // A keyless internal page has no trailing child on disk, so
                // it must have no children at all.
                let consistent = if node.keys.is_empty() {
                    node.children.is_empty()
                } else {
                    node.children.len() == node.keys.len() + 1
                };
                if !consistent {
                    return Err(Error::corrupted(
                        page_id,
                        format!(
                            "{} keys but {} children",
                            node.keys.len(),
                            node.children.len()
                        ),
                    ));
                }
                for (key, child) in node.keys.iter().zip(&node.children) {
                    put_entry(&mut page, key, u64::from(child.0));
                }
                if let Some(last) = node.children.last() {
                    page.write_u64(len - CHILD_ID_SIZE, u64::from(last.0));
                }
            }
        }
        header.write_to(&mut page);

        Ok(page)
    }

    /// Parse the data page `page_id` from its raw bytes.
    ///
    /// # Errors
    /// - `Error::UnknownPageType` if the type tag is not leaf or internal
    /// - `Error::Corrupted` if the key count or a key length runs past the
    ///   end of the page, or a child id is not a valid data page
    pub fn decode(page_id: PageId, page: &Page) -> Result<Self> {
        let header = NodeHeader::read_from(page, page_id)?;
        let count = usize::from(header.key_count);
        let is_internal = header.page_type == PageType::Internal;

        let trailing = if is_internal && count > 0 { CHILD_ID_SIZE } else { 0 };
        let min_len = NodeHeader::SIZE + count * ENTRY_OVERHEAD + trailing;
        if min_len > PAGE_SIZE {
            return Err(Error::corrupted(
                page_id,
                format!("key count {} overruns the page", count),
            ));
        }

        let mut reader = Reader {
            data: page.as_slice(),
            pos: NodeHeader::SIZE,
            page_id,
        };
        let mut keys = Vec::with_capacity(count);
        let mut payloads = Vec::with_capacity(count + 1);
        for _ in 0..count {
            let key_len = usize::from(reader.read_u16()?);
            keys.push(reader.take(key_len)?.to_vec());
            payloads.push(reader.read_u64()?);
        }

        match header.page_type {
            PageType::Leaf => Ok(BTreePage::Leaf(LeafPage {
                page_id,
                keys,
                values: payloads,
                next_page: header.next_page,
            })),
            PageType::Internal => {
                if count > 0 {
                    payloads.push(reader.read_u64()?);
                }
                let children = payloads
                    .into_iter()
                    .map(|raw| child_id(page_id, raw))
                    .collect::<Result<Vec<_>>>()?;
                Ok(BTreePage::Internal(InternalPage {
                    page_id,
                    keys,
                    children,
                }))
            }
        }
    }
}

fn child_id(page_id: PageId, raw: u64) -> Result<PageId> {
    match u32::try_from(raw) {
        Ok(id) if id != 0 => Ok(PageId::new(id)),
        _ => Err(Error::corrupted(page_id, format!("invalid child id {}", raw))),
    }
}

/// Bounds-checked cursor over a page buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    page_id: PageId,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::corrupted(
                    self.page_id,
                    format!("{} bytes at offset {} overrun the page", n, self.pos),
                )
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;
    use proptest::prelude::*;

    fn leaf(id: u32, entries: &[(&[u8], u64)], next: Option<u32>) -> LeafPage {
        LeafPage {
            page_id: PageId::new(id),
            keys: entries.iter().map(|(k, _)| k.to_vec()).collect(),
            values: entries.iter().map(|(_, v)| *v).collect(),
            next_page: next.map(PageId::new),
        }
    }

    #[test]
    fn test_leaf_roundtrip() {
        let page = BTreePage::Leaf(leaf(
            3,
            &[(b"apple", 1), (b"banana", 2), (b"", 3), (b"cherry", u64::MAX)],
            Some(9),
        ));

        let raw = page.encode().unwrap();
        let decoded = BTreePage::decode(PageId::new(3), &raw).unwrap();
        assert_eq!(decoded, page);
    }

    #[test]
    fn test_internal_roundtrip() {
        let page = BTreePage::Internal(InternalPage {
            page_id: PageId::new(5),
            keys: vec![b"g".to_vec(), b"p".to_vec()],
            children: vec![PageId::new(2), PageId::new(3), PageId::new(4)],
        });

        let raw = page.encode().unwrap();
        let decoded = BTreePage::decode(PageId::new(5), &raw).unwrap();
        assert_eq!(decoded, page);
    }

    #[test]
    fn test_empty_pages_roundtrip() {
        for page_type in [PageType::Leaf, PageType::Internal] {
            let page = BTreePage::empty(PageId::new(1), page_type);
            let raw = page.encode().unwrap();
            assert_eq!(BTreePage::decode(PageId::new(1), &raw).unwrap(), page);
        }
    }

    #[test]
    fn test_leaf_byte_layout() {
        let page = BTreePage::Leaf(leaf(1, &[(b"ab", 0x0102)], Some(4)));
        let raw = page.encode().unwrap();
        let bytes = raw.as_slice();

        assert_eq!(bytes[0], 1); // leaf tag
        assert_eq!(&bytes[1..3], &[1, 0]); // key count
        assert_eq!(&bytes[3..7], &[4, 0, 0, 0]); // next page
        assert_eq!(&bytes[7..9], &[2, 0]); // key length
        assert_eq!(&bytes[9..11], b"ab");
        assert_eq!(&bytes[11..19], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert!(bytes[19..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_internal_trailing_child() {
        let page = BTreePage::Internal(InternalPage {
            page_id: PageId::new(2),
            keys: vec![b"m".to_vec()],
            children: vec![PageId::new(7), PageId::new(8)],
        });
        let raw = page.encode().unwrap();
        let bytes = raw.as_slice();

        assert_eq!(bytes[0], 0); // internal tag
        assert_eq!(&bytes[3..7], &[0, 0, 0, 0]); // reserved
        // entry: len(2) + "m"(1) + child(8) = 11 bytes starting at 7
        assert_eq!(bytes[18], 8); // trailing child low byte
        assert_eq!(page.encoded_len(), 26);
    }

    #[test]
    fn test_encoded_len_matches_layout() {
        let l = leaf(1, &[(b"abc", 1), (b"de", 2)], None);
        assert_eq!(l.encoded_len(), 7 + (10 + 3) + (10 + 2));

        let node = InternalPage {
            page_id: PageId::new(2),
            keys: vec![b"abc".to_vec()],
            children: vec![PageId::new(3), PageId::new(4)],
        };
        assert_eq!(node.encoded_len(), 7 + 13 + 8);
    }

    #[test]
    fn test_encode_overflow_rejected() {
        let big = vec![b'x'; 1000];
        let entries: Vec<(&[u8], u64)> = (0..5).map(|i| (big.as_slice(), i)).collect();
        let page = BTreePage::Leaf(leaf(1, &entries, None));

        let err = page.encode().unwrap_err();
        assert!(matches!(err, Error::PageOverflow { .. }));
    }

    #[test]
    fn test_encode_rejects_inconsistent_internal() {
        let page = BTreePage::Internal(InternalPage {
            page_id: PageId::new(2),
            keys: vec![b"a".to_vec(), b"b".to_vec()],
            children: vec![PageId::new(3), PageId::new(4)],
        });
        assert_eq!(page.encode().unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_encode_rejects_keyless_internal_with_child() {
        let page = BTreePage::Internal(InternalPage {
            page_id: PageId::new(2),
            keys: Vec::new(),
            children: vec![PageId::new(5)],
        });

        let err = page.encode().unwrap_err();
        assert!(matches!(err, Error::Corrupted { .. }));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let mut raw = Page::new();
        raw.as_mut_slice()[0] = 2;

        let err = BTreePage::decode(PageId::new(1), &raw).unwrap_err();
        assert!(matches!(err, Error::UnknownPageType { tag: 2, .. }));
    }

    #[test]
    fn test_decode_count_overrun() {
        let mut raw = Page::new();
        NodeHeader {
            page_type: PageType::Leaf,
            key_count: 500, // 500 × 10 bytes > 4096
            next_page: None,
        }
        .write_to(&mut raw);

        let err = BTreePage::decode(PageId::new(1), &raw).unwrap_err();
        assert!(matches!(err, Error::Corrupted { .. }));
    }

    #[test]
    fn test_decode_key_length_overrun() {
        let mut raw = Page::new();
        NodeHeader {
            page_type: PageType::Leaf,
            key_count: 1,
            next_page: None,
        }
        .write_to(&mut raw);
        raw.write_u16(NodeHeader::SIZE, 5000);

        let err = BTreePage::decode(PageId::new(1), &raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_decode_child_pointing_at_meta() {
        let page = BTreePage::Internal(InternalPage {
            page_id: PageId::new(2),
            keys: vec![b"m".to_vec()],
            children: vec![PageId::new(3), PageId::new(4)],
        });
        let mut raw = page.encode().unwrap();
        // First child id lives after the header, length prefix and key.
        raw.write_u64(NodeHeader::SIZE + 3, 0);

        let err = BTreePage::decode(PageId::new(2), &raw).unwrap_err();
        assert!(matches!(err, Error::Corrupted { .. }));
    }

    #[test]
    fn test_leaf_insert_keeps_duplicates_in_order() {
        let mut l = LeafPage::new(PageId::new(1));
        l.insert(b"b", 1);
        l.insert(b"a", 2);
        l.insert(b"b", 3);
        l.insert(b"c", 4);
        l.insert(b"b", 5);

        assert_eq!(l.keys, vec![b"a".to_vec(), b"b".to_vec(), b"b".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(l.values, vec![2, 1, 3, 5, 4]);
        assert_eq!(l.lower_bound(b"b"), 1);
        assert_eq!(l.upper_bound(b"b"), 4);
    }

    #[test]
    fn test_child_routing() {
        let node = InternalPage {
            page_id: PageId::new(9),
            keys: vec![b"d".to_vec(), b"m".to_vec()],
            children: vec![PageId::new(1), PageId::new(2), PageId::new(3)],
        };

        assert_eq!(node.child_for(b"a").unwrap(), PageId::new(1));
        assert_eq!(node.child_for(b"d").unwrap(), PageId::new(2));
        assert_eq!(node.child_for(b"k").unwrap(), PageId::new(2));
        assert_eq!(node.child_for(b"m").unwrap(), PageId::new(3));
        assert_eq!(node.child_for(b"z").unwrap(), PageId::new(3));

        assert_eq!(node.first_child_for(b"d").unwrap(), PageId::new(1));
        assert_eq!(node.first_child_for(b"m").unwrap(), PageId::new(2));
        assert_eq!(node.child_index(PageId::new(3)), Some(2));
        assert_eq!(node.child_index(PageId::new(4)), None);
    }

    #[test]
    fn test_into_variant_mismatch() {
        let page = BTreePage::empty(PageId::new(4), PageType::Leaf);
        assert!(page.clone().into_leaf().is_ok());
        assert_eq!(page.into_internal().unwrap_err().kind(), ErrorKind::Format);
    }

    fn arb_entries() -> impl Strategy<Value = Vec<(Vec<u8>, u64)>> {
        proptest::collection::vec(
            (proptest::collection::vec(any::<u8>(), 0..24), any::<u64>()),
            0..60,
        )
    }

    proptest! {
        #[test]
        fn prop_leaf_decode_inverts_encode(mut entries in arb_entries(), next in 0u32..1000) {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let page = BTreePage::Leaf(LeafPage {
                page_id: PageId::new(1),
                keys: entries.iter().map(|(k, _)| k.clone()).collect(),
                values: entries.iter().map(|(_, v)| *v).collect(),
                next_page: PageId::from_link(next),
            });

            let raw = page.encode().unwrap();
            prop_assert_eq!(BTreePage::decode(PageId::new(1), &raw).unwrap(), page);
        }

        #[test]
        fn prop_internal_decode_inverts_encode(
            mut keys in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..24), 0..60),
            first_child in 1u32..1000,
        ) {
            keys.sort();
            let children = if keys.is_empty() {
                Vec::new()
            } else {
                (0..=keys.len() as u32).map(|i| PageId::new(first_child + i)).collect()
            };
            let page = BTreePage::Internal(InternalPage {
                page_id: PageId::new(2),
                keys,
                children,
            });

            let raw = page.encode().unwrap();
            prop_assert_eq!(BTreePage::decode(PageId::new(2), &raw).unwrap(), page);
        }
    }
}
