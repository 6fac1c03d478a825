//! Wire-level error vocabulary shared by every crate that decodes a Rackkey
//! payload (blocks, `BlockNumList`, `SizeInfo`, `SyncInfo`).

use thiserror::Error;

/// Failure while decoding a self-framed wire payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended in the middle of a fixed-width field or a
    /// length-prefixed section.
    #[error("truncated payload: expected at least {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    /// A length-prefixed field (e.g. a key) exceeded its declared bound.
    #[error("field too large: {field} length {len} exceeds max {max}")]
    FieldTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Bytes that were supposed to be UTF-8 (a key) were not.
    #[error("invalid utf-8 in field {field}")]
    InvalidUtf8 { field: &'static str },
}
