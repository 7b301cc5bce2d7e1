//! Error types for the row store.

use crate::cursor::{CursorFlags, CursorId};
use std::io;
use thiserror::Error;
use winagg_binary::DecodeError;

/// Result type alias for row store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Row store failures.
///
/// Apart from `Io`, every variant is an invariant violation on the caller's side: the store
/// never recovers from them and neither should the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the spill file failed.
    #[error("spill file I/O error: {0}")]
    Io(#[from] io::Error),
    /// A spilled record body could not be decoded.
    #[error("spill record decode error: {0}")]
    Decode(#[from] DecodeError),
    /// A record's length words are inconsistent.
    #[error("corrupt spill record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },
    /// A backward fetch would move below the cursor's mark.
    #[error("cursor {cursor} fetched position {position} before its mark {mark}")]
    FetchBeforeMark {
        cursor: CursorId,
        position: i64,
        mark: i64,
    },
    /// Backward fetch on a cursor without the BACKWARD capability.
    #[error("cursor {cursor} is not backward-capable")]
    BackwardNotAllowed { cursor: CursorId },
    /// Rescan on a cursor without the REWIND capability.
    #[error("cursor {cursor} is not rewind-capable")]
    RewindNotAllowed { cursor: CursorId },
    /// Capabilities requested after rows were stored exceed what was committed.
    #[error("capabilities {requested:?} exceed committed {committed:?} after rows were stored")]
    CapabilityRaised {
        requested: CursorFlags,
        committed: CursorFlags,
    },
    /// The cursor id was never allocated.
    #[error("unknown cursor {cursor}")]
    UnknownCursor { cursor: CursorId },
    /// The requested row was discarded by a trim.
    #[error("row {position} was trimmed; first retained row is {first_retained}")]
    RowTrimmed { position: i64, first_retained: i64 },
    /// A mark may only move forward.
    #[error("mark of cursor {cursor} cannot move backward from {from} to {to}")]
    MarkMovedBackward { cursor: CursorId, from: i64, to: i64 },
}

impl StoreError {
    /// Creates a corrupt record error.
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        StoreError::CorruptRecord {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::FetchBeforeMark {
            cursor: 2,
            position: 3,
            mark: 5,
        };
        assert_eq!(
            err.to_string(),
            "cursor 2 fetched position 3 before its mark 5"
        );

        let err = StoreError::corrupt(128, "trailing length mismatch");
        assert!(err.to_string().contains("offset 128"));
    }

    #[test]
    fn test_from_io_error() {
        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
