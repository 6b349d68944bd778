use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid base32 string: {0}")]
    InvalidBase32(String),

    #[error("unsupported multihash code {0:#x}")]
    UnsupportedHash(u64),

    #[error("malformed multihash: {0}")]
    MalformedMultihash(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid extension {0:?}: expected 1-32 ASCII alphanumeric characters")]
    InvalidExtension(String),

    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}
