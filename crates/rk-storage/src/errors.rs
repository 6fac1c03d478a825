use rk_types::WireError;

/// Failures raised by the on-disk block store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("key hash collision between {existing:?} and {incoming:?}")]
    HashCollision { existing: String, incoming: String },

    #[error("not enough free disk blocks: need {needed}, have {available}")]
    OutOfSpace { needed: u32, available: u32 },

    #[error("key exceeds configured max length: {len} > {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("store file is malformed: {reason}")]
    Malformed { reason: String },

    #[error("store file has an unrecognized magic number")]
    InvalidMagicNumber,

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}
