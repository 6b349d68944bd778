use blk_types::StorageKey;

/// Errors from blockstore operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Put input is not a well-formed, byte-bearing block.
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// Missing or unparseable key or digest.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The requested block was not found.
    #[error("block not found: {0}")]
    NotFound(StorageKey),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {key}: expected {expected}, computed {computed}")]
    HashMismatch {
        key: StorageKey,
        expected: String,
        computed: String,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend failure that is not an `io::Error`.
    #[error("backend error: {0}")]
    Backend(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidBlock,
    InvalidKey,
    NotFound,
    /// Backend or environment failure; surfaced, never retried here.
    Store,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidBlock(_) => ErrorKind::InvalidBlock,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::HashMismatch { .. } | Self::Io(_) | Self::Backend(_) | Self::Config(_) => {
                ErrorKind::Store
            }
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
