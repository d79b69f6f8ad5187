//! Split point selection for overflowing pages.
//!
//! A page overflows when it holds more than `order - 1` keys or when its
//! encoding no longer fits in a page. Count overflows use the fixed split
//! points below. If either half of a fixed split would still not fit, the
//! cut falls at the byte midpoint instead.

use crate::common::config::PAGE_SIZE;
use crate::storage::page::{entry_len, NodeHeader, CHILD_ID_SIZE};

/// Index at which an overflowing leaf is cut. Entries from it onward move
/// to the new right sibling; the key at this index becomes the separator.
///
/// Needs at least two keys.
pub(crate) fn leaf_split_point(order: usize, keys: &[Vec<u8>]) -> usize {
    let sizes = entry_sizes(keys);
    let fits = |part: &[usize]| NodeHeader::SIZE + part.iter().sum::<usize>() <= PAGE_SIZE;

    let at = order.div_ceil(2);
    if keys.len() >= order && at < keys.len() && fits(&sizes[..at]) && fits(&sizes[at..]) {
        return at;
    }
    (byte_midpoint(&sizes) + 1).clamp(1, keys.len() - 1)
}

/// Index of the key an overflowing internal page promotes to its parent.
/// Keys before it stay, keys after it move to the new right sibling.
///
/// Needs at least three keys.
pub(crate) fn internal_split_point(order: usize, keys: &[Vec<u8>]) -> usize {
    let sizes = entry_sizes(keys);
    let fits = |part: &[usize]| {
        NodeHeader::SIZE + part.iter().sum::<usize>() + CHILD_ID_SIZE <= PAGE_SIZE
    };

    let mid = order / 2;
    if keys.len() >= order
        && mid + 1 < keys.len()
        && fits(&sizes[..mid])
        && fits(&sizes[mid + 1..])
    {
        return mid;
    }
    byte_midpoint(&sizes).clamp(1, keys.len() - 2)
}

fn entry_sizes(keys: &[Vec<u8>]) -> Vec<usize> {
    keys.iter().map(|k| entry_len(k)).collect()
}

/// Index of the entry that crosses the halfway mark of the total size.
fn byte_midpoint(sizes: &[usize]) -> usize {
    let total: usize = sizes.iter().sum();
    let mut acc = 0;
    for (i, size) in sizes.iter().enumerate() {
        acc += size;
        if 2 * acc >= total {
            return i;
        }
    }
    sizes.len().saturating_sub(1)
}
