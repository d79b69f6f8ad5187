//! Page I/O statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by the [`PageStore`](super::PageStore).
///
/// Fields are atomic so they can be bumped through a shared reference.
/// We use `Ordering::Relaxed` throughout: the counters are independent
/// and only need atomicity.
///
/// # Example
/// ```
/// use bptree_index::IoStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = IoStats::new();
/// stats.pages_read.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().pages_read, 1);
/// ```
#[derive(Debug)]
pub struct IoStats {
    /// Number of data and metadata pages read from disk.
    pub pages_read: AtomicU64,

    /// Number of data and metadata pages written to disk.
    pub pages_written: AtomicU64,

    /// Number of pages handed out by the allocator.
    pub pages_allocated: AtomicU64,

    /// Number of allocations served from the free list.
    pub pages_reused: AtomicU64,

    /// Number of pages returned to the free list.
    pub pages_freed: AtomicU64,
}

impl IoStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            pages_read: AtomicU64::new(0),
            pages_written: AtomicU64::new(0),
            pages_allocated: AtomicU64::new(0),
            pages_reused: AtomicU64::new(0),
            pages_freed: AtomicU64::new(0),
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_reused: self.pages_reused.load(Ordering::Relaxed),
            pages_freed: self.pages_freed.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.pages_read.store(0, Ordering::Relaxed);
        self.pages_written.store(0, Ordering::Relaxed);
        self.pages_allocated.store(0, Ordering::Relaxed);
        self.pages_reused.store(0, Ordering::Relaxed);
        self.pages_freed.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for IoStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`IoStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_allocated: u64,
    pub pages_reused: u64,
    pub pages_freed: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ reads: {}, writes: {}, allocated: {}, reused: {}, freed: {} }}",
            self.pages_read,
            self.pages_written,
            self.pages_allocated,
            self.pages_reused,
            self.pages_freed
        )
    }
}
