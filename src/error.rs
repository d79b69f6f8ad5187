//! Error types for the index.

use thiserror::Error;

use crate::common::PageId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
///
/// Callers that only care whether a failure came from a damaged file, the
/// operating system, or a bad argument can match on this instead of on
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file contents do not describe a valid index.
    Format,
    /// Reading or writing the backing file failed.
    Io,
    /// The caller passed a value the index cannot accept.
    InvalidArgument,
}

/// All possible errors raised by the index.
///
/// None of these are retried internally. If a split fails part way through,
/// pages already written stay written.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page lies beyond the end of the file.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Page 0 does not start with the index magic number.
    #[error("invalid magic number {0:#010x}")]
    InvalidMagic(u32),

    /// The metadata page checksum does not match its contents.
    #[error("metadata checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// A data page carries a type tag that is neither leaf nor internal.
    #[error("unknown page type tag {tag} in {page_id}")]
    UnknownPageType { page_id: PageId, tag: u8 },

    /// A page or the tree structure is internally inconsistent.
    #[error("corrupted {page_id}: {reason}")]
    Corrupted { page_id: PageId, reason: String },

    /// Order outside the legal range.
    #[error("invalid order {0}: must be between 3 and 65535")]
    InvalidOrder(u32),

    /// Key is too long to be stored.
    #[error("key of {len} bytes exceeds the maximum of {max} bytes")]
    KeyTooLarge { len: usize, max: usize },

    /// The page id cannot be used for the requested operation.
    #[error("invalid page id {0}")]
    InvalidPageId(PageId),

    /// The free list in the metadata page has no room left.
    #[error("free list is full ({0} entries)")]
    FreeListFull(usize),

    /// A page holds more data than fits in `PAGE_SIZE` bytes.
    #[error("{page_id} needs {len} bytes, more than a page holds")]
    PageOverflow { page_id: PageId, len: usize },
}

impl Error {
    /// Shorthand for a [`Error::Corrupted`] error.
    pub(crate) fn corrupted(page_id: PageId, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            page_id,
            reason: reason.into(),
        }
    }

    /// Which broad category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::PageNotFound(_) => ErrorKind::Io,
            Error::InvalidMagic(_)
            | Error::ChecksumMismatch { .. }
            | Error::UnknownPageType { .. }
            | Error::Corrupted { .. } => ErrorKind::Format,
            Error::InvalidOrder(_)
            | Error::KeyTooLarge { .. }
            | Error::InvalidPageId(_)
            | Error::FreeListFull(_)
            | Error::PageOverflow { .. } => ErrorKind::InvalidArgument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(format!("{}", err), "Page(42) not found");

        let err = Error::InvalidMagic(0xDEADBEEF);
        assert_eq!(format!("{}", err), "invalid magic number 0xdeadbeef");

        let err = Error::KeyTooLarge { len: 2000, max: 1000 };
        assert_eq!(
            format!("{}", err),
            "key of 2000 bytes exceeds the maximum of 1000 bytes"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::PageNotFound(PageId::new(3)).kind(), ErrorKind::Io);
        assert_eq!(Error::InvalidMagic(0).kind(), ErrorKind::Format);
        assert_eq!(
            Error::UnknownPageType {
                page_id: PageId::new(1),
                tag: 9
            }
            .kind(),
            ErrorKind::Format
        );
        assert_eq!(
            Error::corrupted(PageId::new(1), "bad").kind(),
            ErrorKind::Format
        );
        assert_eq!(Error::InvalidOrder(2).kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            Error::KeyTooLarge { len: 1, max: 0 }.kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }
}
