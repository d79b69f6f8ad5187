//! Forward iteration along the leaf chain.

use crate::common::{Error, RecordId, Result};
use crate::storage::page::{BTreePage, LeafPage};
use crate::storage::PageStore;

/// Iterator over `(key, record id)` pairs in ascending key order.
///
/// Created by [`BPlusTreeIndex::range`](super::BPlusTreeIndex::range) and
/// [`BPlusTreeIndex::iter`](super::BPlusTreeIndex::iter). Each leaf is read
/// from disk when the scan reaches it. After an error the scan is finished.
pub struct RangeScan<'a> {
    store: &'a mut PageStore,
    leaf: Option<LeafPage>,
    pos: usize,
    /// Inclusive upper bound; `None` scans to the end of the chain.
    end: Option<Vec<u8>>,
    /// Leaves visited so far, to catch a cycle in the chain.
    hops: u32,
}

impl<'a> RangeScan<'a> {
    pub(crate) fn new(
        store: &'a mut PageStore,
        leaf: LeafPage,
        pos: usize,
        end: Option<Vec<u8>>,
    ) -> Self {
        Self {
            store,
            leaf: Some(leaf),
            pos,
            end,
            hops: 0,
        }
    }

    /// A scan that yields nothing.
    pub(crate) fn empty(store: &'a mut PageStore) -> Self {
        Self {
            store,
            leaf: None,
            pos: 0,
            end: None,
            hops: 0,
        }
    }

    fn finish(&mut self) {
        self.leaf = None;
    }
}

impl Iterator for RangeScan<'_> {
    type Item = Result<(Vec<u8>, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_mut()?;

            if self.pos < leaf.keys.len() {
                if let Some(end) = &self.end {
                    if leaf.keys[self.pos].as_slice() > end.as_slice() {
                        self.finish();
                        return None;
                    }
                }
                let key = std::mem::take(&mut leaf.keys[self.pos]);
                let value = leaf.values[self.pos];
                self.pos += 1;
                return Some(Ok((key, value)));
            }

            let Some(next) = leaf.next_page else {
                self.finish();
                return None;
            };

            self.hops += 1;
            if self.hops >= self.store.page_count() {
                self.finish();
                return Some(Err(Error::corrupted(next, "cycle in leaf chain")));
            }

            match self.store.get_page(next).and_then(BTreePage::into_leaf) {
                Ok(leaf) => {
                    self.leaf = Some(leaf);
                    self.pos = 0;
                }
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
    }
}
