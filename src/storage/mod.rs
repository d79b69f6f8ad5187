//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O
//! - [`page`] - Page types and layouts
//! - [`Metadata`] - The metadata page (page 0)
//! - [`PageStore`] - Typed page access, allocation and the free list
//! - [`IoStats`] - I/O counters

mod disk_manager;
mod meta;
pub mod page;
mod page_store;
mod stats;

pub use disk_manager::DiskManager;
pub use meta::{Metadata, MAX_FREE_PAGES};
pub use page_store::PageStore;
pub use stats::{IoStats, StatsSnapshot};
