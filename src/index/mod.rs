//! Index structures.
//!
//! - [`btree`] - Disk-backed B+tree

pub mod btree;

pub use btree::{BPlusTreeIndex, RangeScan, TreeSummary};
