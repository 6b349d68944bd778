use blk_crypto::ContentHasher;
use blk_types::{Extension, Multihash};
use bytes::Bytes;

use crate::error::{StoreError, StoreResult};

/// An immutable block: raw bytes, their digest, and a type tag.
///
/// Blocks built with [`Block::new`] or [`Block::with_hasher`] derive their key
/// from the data. [`Block::from_parts`] trusts the caller; such blocks are
/// re-validated before they are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    data: Bytes,
    key: Multihash,
    extension: Extension,
}

impl Block {
    /// SHA2-256 block with the default `data` extension.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::with_hasher(data, Extension::default(), &ContentHasher::default())
    }

    /// SHA2-256 block with the given extension.
    pub fn with_extension(data: impl Into<Bytes>, extension: Extension) -> Self {
        Self::with_hasher(data, extension, &ContentHasher::default())
    }

    pub fn with_hasher(data: impl Into<Bytes>, extension: Extension, hasher: &ContentHasher) -> Self {
        let data = data.into();
        let key = hasher.hash(&data);
        Self {
            data,
            key,
            extension,
        }
    }

    /// Assemble a block without recomputing its digest.
    pub fn from_parts(data: impl Into<Bytes>, key: Multihash, extension: Extension) -> Self {
        Self {
            data: data.into(),
            key,
            extension,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn key(&self) -> &Multihash {
        &self.key
    }

    pub fn extension(&self) -> &Extension {
        &self.extension
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `key` is the digest of `data`.
    pub fn is_consistent(&self) -> bool {
        ContentHasher::verify(&self.data, &self.key)
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// A value as received at the API boundary, before it is known to be bytes.
///
/// Only binary payloads are block material; text is rejected rather than
/// coerced through some character encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockPayload {
    Binary(Bytes),
    Text(String),
}

impl BlockPayload {
    /// Build a block keyed with `hasher`.
    pub fn into_block(self, extension: Extension, hasher: &ContentHasher) -> StoreResult<Block> {
        match self {
            Self::Binary(data) => Ok(Block::with_hasher(data, extension, hasher)),
            Self::Text(text) => Err(StoreError::InvalidBlock(format!(
                "expected raw bytes, got {} characters of text",
                text.chars().count()
            ))),
        }
    }
}

impl From<Bytes> for BlockPayload {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

impl From<Vec<u8>> for BlockPayload {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data.into())
    }
}

impl From<&'static [u8]> for BlockPayload {
    fn from(data: &'static [u8]) -> Self {
        Self::Binary(Bytes::from_static(data))
    }
}

impl From<String> for BlockPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for BlockPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl TryFrom<BlockPayload> for Block {
    type Error = StoreError;

    fn try_from(payload: BlockPayload) -> StoreResult<Self> {
        payload.into_block(Extension::default(), &ContentHasher::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn new_block_has_consistent_key() {
        let block = Block::new(&b"hello world"[..]);
        assert!(block.is_consistent());
        assert_eq!(block.extension().as_str(), "data");
        assert_eq!(block.len(), 11);
        assert_eq!(
            block.key().to_hex(),
            "1220b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn identical_data_identical_key() {
        let a = Block::new(b"same".to_vec());
        let b = Block::new(b"same".to_vec());
        assert_eq!(a, b);
    }

    #[test]
    fn forged_key_is_inconsistent() {
        let other = ContentHasher::SHA2_256.hash(b"other");
        let block = Block::from_parts(&b"data"[..], other, Extension::default());
        assert!(!block.is_consistent());
    }

    #[test]
    fn blake3_blocks_verify() {
        let block = Block::with_hasher(&b"x"[..], Extension::default(), &ContentHasher::BLAKE3);
        assert!(block.is_consistent());
    }

    #[test]
    fn empty_block_is_valid() {
        let block = Block::new(Bytes::new());
        assert!(block.is_empty());
        assert!(block.is_consistent());
    }

    #[test]
    fn binary_payload_becomes_block() {
        let block = Block::try_from(BlockPayload::from(b"bytes".to_vec())).unwrap();
        assert_eq!(block.data().as_ref(), b"bytes");
    }

    #[test]
    fn text_payload_is_invalid_block() {
        let err = Block::try_from(BlockPayload::from("hello world")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBlock);
    }
}
