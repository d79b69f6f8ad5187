//! Common types and utilities shared across the index.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and open options
//! - Error types (re-exported from [`crate::error`])
//! - Identifiers (PageId, RecordId)

pub mod config;
mod page_id;

pub use config::IndexOptions;
pub use crate::error::{Error, ErrorKind, Result};
pub use page_id::{PageId, RecordId};
