use blk_crypto::ContentHasher;
use blk_types::{encode_base32, Extension, KeyInput, Multihash, StorageKey, TypeError};

use crate::block::{Block, BlockPayload};
use crate::config::BlockstoreConfig;
use crate::error::{StoreError, StoreResult};

/// Maps content digests and type tags to storage keys.
///
/// Pure and deterministic: no I/O, no shared state.
#[derive(Clone, Debug)]
pub struct KeyCodec {
    hasher: ContentHasher,
    default_extension: Extension,
}

impl KeyCodec {
    pub fn new(hasher: ContentHasher, default_extension: Extension) -> Self {
        Self {
            hasher,
            default_extension,
        }
    }

    /// Codec using the configured digest and default extension.
    pub fn from_config(config: &BlockstoreConfig) -> Self {
        Self::new(ContentHasher::new(config.hash), config.default_extension.clone())
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn default_extension(&self) -> &Extension {
        &self.default_extension
    }

    /// Digest `data` with the configured algorithm.
    pub fn derive_key(&self, data: &[u8]) -> Multihash {
        self.hasher.hash(data)
    }

    pub fn encode(digest: &Multihash) -> String {
        encode_base32(&digest.to_bytes())
    }

    pub fn to_storage_key(&self, digest: &Multihash, extension: &Extension) -> StorageKey {
        StorageKey::new(digest.clone(), extension.clone())
    }

    /// Normalize caller input to a storage key.
    ///
    /// An explicit `extension` wins over one embedded in the input; with
    /// neither, the configured default applies.
    pub fn parse_storage_key(
        &self,
        input: impl Into<KeyInput>,
        extension: Option<&str>,
    ) -> StoreResult<StorageKey> {
        let parsed = input.into().resolve().map_err(invalid_key)?;
        let extension = match extension {
            Some(tag) => Extension::new(tag).map_err(invalid_key)?,
            None => parsed
                .extension
                .unwrap_or_else(|| self.default_extension.clone()),
        };
        Ok(StorageKey::new(parsed.digest, extension))
    }

    /// Check that a block's key is the digest of its data.
    pub fn validate(&self, block: &Block) -> StoreResult<StorageKey> {
        if !block.is_consistent() {
            return Err(StoreError::InvalidBlock(format!(
                "key {} does not match the digest of its {} bytes",
                block.key(),
                block.len()
            )));
        }
        Ok(self.to_storage_key(block.key(), block.extension()))
    }

    /// Turn a boundary payload into a block keyed with this codec's hasher.
    pub fn block_from_payload(
        &self,
        payload: BlockPayload,
        extension: Option<&Extension>,
    ) -> StoreResult<Block> {
        let extension = extension.unwrap_or(&self.default_extension).clone();
        payload.into_block(extension, &self.hasher)
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(ContentHasher::default(), Extension::default())
    }
}

fn invalid_key(err: TypeError) -> StoreError {
    StoreError::InvalidKey(err.to_string())
}
