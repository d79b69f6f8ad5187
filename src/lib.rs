//! bptree-index - A persistent B+tree index mapping byte-string keys to
//! record ids, stored in fixed-size pages within a single file.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         bptree-index                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Tree Engine (index/btree/)                  │   │
//! │  │   locate_leaf → search / range scan / insert + splits    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Page Store (storage/)                       │   │
//! │  │     Metadata (page 0) + free list + page allocation      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │         Page Codec (storage/page/) + DiskManager         │   │
//! │  │        BTreePage ⇄ 4KB Page ⇄ file offset N × 4096       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, config)
//! - [`error`] - Error types
//! - [`storage`] - Disk I/O, page formats and allocation
//! - [`index`] - The B+tree itself
//!
//! # Concurrency
//! Single-threaded and synchronous. Operations take `&mut self` and every
//! page access goes straight to the file.
//!
//! # Quick Start
//! ```no_run
//! use bptree_index::BPlusTreeIndex;
//!
//! // Open the index file, creating it with order 100 if needed
//! let mut index = BPlusTreeIndex::open_or_create("names.idx", 100).unwrap();
//!
//! index.insert(b"alice", 1001).unwrap();
//! let ids = index.search(b"alice").unwrap();
//! let in_range = index.range_query(b"a", b"m").unwrap();
//!
//! index.close().unwrap();
//! ```

pub mod common;
pub mod error;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DEFAULT_ORDER, MAX_KEY_SIZE, PAGE_SIZE};
pub use common::{Error, ErrorKind, IndexOptions, PageId, RecordId, Result};

pub use index::{BPlusTreeIndex, RangeScan, TreeSummary};
pub use storage::page::{BTreePage, InternalPage, LeafPage, PageType};
pub use storage::{IoStats, PageStore, StatsSnapshot};
