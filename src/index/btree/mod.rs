//! B+tree index over byte-string keys.
//!
//! - [`BPlusTreeIndex`] - insert, point search and range scans
//! - [`RangeScan`] - iterator along the leaf chain
//! - [`TreeSummary`] - result of a structural check
//!
//! Leaves hold the entries and are linked left to right; internal pages
//! only route. A leaf split copies the right half's first key up, while an
//! internal split moves its middle key up.

mod check;
mod scan;
mod split;
mod tree;

pub use check::TreeSummary;
pub use scan::RangeScan;
pub use tree::BPlusTreeIndex;
