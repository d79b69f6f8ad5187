//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`NodeHeader`] - Header at the start of every data page
//! - [`PageType`] - Leaf / internal discriminator
//! - [`BTreePage`] - Decoded leaf and internal pages

mod btree_page;
#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use btree_page::{entry_len, BTreePage, InternalPage, LeafPage, CHILD_ID_SIZE, ENTRY_OVERHEAD};
pub use page::Page;
pub use page_header::{NodeHeader, PageType};
