//! Structural checks over a whole tree.

use crate::common::{Error, PageId, Result};
use crate::storage::page::{BTreePage, InternalPage, LeafPage};

use super::tree::{BPlusTreeIndex, MAX_HEIGHT};

/// Shape of a tree as seen by [`BPlusTreeIndex::check_invariants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeSummary {
    /// Number of levels, 1 when the root is a leaf.
    pub height: usize,
    pub leaf_pages: usize,
    pub internal_pages: usize,
    /// Total number of entries across all leaves.
    pub entries: usize,
    /// Non-root pages holding fewer than `ceil(order / 2) - 1` keys. Only
    /// byte-driven splits of pages with very long keys produce these.
    pub underfull_pages: usize,
}

/// State carried through the depth-first walk.
struct Walk {
    max_keys: usize,
    min_keys: usize,
    leaf_depth: Option<usize>,
    /// Leaves in tree order.
    leaves: Vec<PageId>,
    summary: TreeSummary,
}

impl BPlusTreeIndex {
    /// Walk every page and the leaf chain and verify the tree's structure.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` on the first violation found: unsorted
    /// keys, an over-full page, a key outside its separators' range, a
    /// child count that is not key count + 1, leaves at different depths,
    /// or a leaf chain that does not visit the leaves in tree order.
    pub fn check_invariants(&mut self) -> Result<TreeSummary> {
        let order = self.order() as usize;
        let mut walk = Walk {
            max_keys: order - 1,
            min_keys: order.div_ceil(2) - 1,
            leaf_depth: None,
            leaves: Vec::new(),
            summary: TreeSummary::default(),
        };

        let root = self.root_page_id();
        self.visit(root, 0, None, None, &mut walk)?;
        self.check_chain(&walk.leaves)?;

        walk.summary.height = walk.leaf_depth.map_or(1, |depth| depth + 1);
        Ok(walk.summary)
    }

    fn visit(
        &mut self,
        page_id: PageId,
        depth: usize,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        walk: &mut Walk,
    ) -> Result<()> {
        if depth > MAX_HEIGHT {
            return Err(Error::corrupted(page_id, "tree deeper than any valid tree"));
        }

        let page = self.store.get_page(page_id)?;
        let is_root = depth == 0;
        check_keys(&page, lower, upper, walk.max_keys)?;
        if !is_root && page.keys().len() < walk.min_keys {
            walk.summary.underfull_pages += 1;
        }

        match page {
            BTreePage::Leaf(leaf) => visit_leaf(&leaf, depth, walk),
            BTreePage::Internal(node) => {
                check_children(&node, is_root)?;
                walk.summary.internal_pages += 1;

                for (i, &child) in node.children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(node.keys[i - 1].as_slice()) };
                    let hi = node.keys.get(i).map(Vec::as_slice).or(upper);
                    self.visit(child, depth + 1, lo, hi, walk)?;
                }
                Ok(())
            }
        }
    }

    /// Follow `next_page` links from the first leaf and compare with the
    /// leaves found by the tree walk.
    fn check_chain(&mut self, leaves: &[PageId]) -> Result<()> {
        let mut last_key: Option<Vec<u8>> = None;
        let mut current = leaves.first().copied();

        for (i, &expected) in leaves.iter().enumerate() {
            let Some(page_id) = current else {
                return Err(Error::corrupted(
                    leaves[i - 1],
                    "leaf chain ends before the last leaf",
                ));
            };
            if page_id != expected {
                return Err(Error::corrupted(
                    page_id,
                    format!("leaf chain reaches {} where {} was expected", page_id, expected),
                ));
            }

            let leaf = self.store.get_page(page_id)?.into_leaf()?;
            if let (Some(prev), Some(first)) = (&last_key, leaf.keys.first()) {
                if first < prev {
                    return Err(Error::corrupted(page_id, "leaf chain keys descend"));
                }
            }
            if let Some(last) = leaf.keys.last() {
                last_key = Some(last.clone());
            }
            current = leaf.next_page;
        }

        match current {
            None => Ok(()),
            Some(extra) => Err(Error::corrupted(
                extra,
                "leaf chain continues past the last leaf",
            )),
        }
    }
}

fn check_keys(
    page: &BTreePage,
    lower: Option<&[u8]>,
    upper: Option<&[u8]>,
    max_keys: usize,
) -> Result<()> {
    let page_id = page.page_id();
    let keys = page.keys();

    if keys.len() > max_keys {
        return Err(Error::corrupted(
            page_id,
            format!("{} keys, at most {} allowed", keys.len(), max_keys),
        ));
    }
    if keys.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(Error::corrupted(page_id, "keys out of order"));
    }
    // Duplicates of a separator may remain at the end of its left subtree,
    // so the upper bound is inclusive.
    let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
        return Ok(());
    };
    if lower.is_some_and(|lo| first.as_slice() < lo) || upper.is_some_and(|hi| last.as_slice() > hi) {
        return Err(Error::corrupted(page_id, "key outside the parent's separator range"));
    }
    Ok(())
}

fn check_children(node: &InternalPage, is_root: bool) -> Result<()> {
    if node.children.len() != node.keys.len() + 1 {
        return Err(Error::corrupted(
            node.page_id,
            format!(
                "{} keys but {} children",
                node.keys.len(),
                node.children.len()
            ),
        ));
    }
    if is_root && node.keys.is_empty() {
        return Err(Error::corrupted(node.page_id, "internal root without keys"));
    }
    Ok(())
}

fn visit_leaf(leaf: &LeafPage, depth: usize, walk: &mut Walk) -> Result<()> {
    match walk.leaf_depth {
        None => walk.leaf_depth = Some(depth),
        Some(expected) if expected != depth => {
            return Err(Error::corrupted(
                leaf.page_id,
                format!("leaf at depth {}, others at depth {}", depth, expected),
            ));
        }
        Some(_) => {}
    }
    walk.leaves.push(leaf.page_id);
    walk.summary.leaf_pages += 1;
    walk.summary.entries += leaf.len();
    Ok(())
}
