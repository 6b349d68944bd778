use std::path::{Path, PathBuf};

use blk_types::{Extension, HashCode};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration for a [`crate::Blockstore`].
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration for an in-memory store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockstoreConfig {
    /// Digest algorithm for newly derived keys.
    pub hash: HashCode,
    /// Extension used when a caller supplies none.
    pub default_extension: Extension,
    /// Writes in flight per put stream, and reads in flight per `get_many`
    /// stream (treated as at least 1).
    pub put_concurrency: usize,
    /// Recompute the digest of every block read.
    pub verify_reads: bool,
    pub backend: BackendConfig,
}

impl Default for BlockstoreConfig {
    fn default() -> Self {
        Self {
            hash: HashCode::default(),
            default_extension: Extension::default(),
            put_concurrency: 16,
            verify_reads: false,
            backend: BackendConfig::default(),
        }
    }
}

impl BlockstoreConfig {
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Filesystem store at `root` with all other settings defaulted.
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::Filesystem { root: root.into() },
            ..Self::default()
        }
    }
}

/// Which raw byte store to open.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    #[default]
    Memory,
    Filesystem { root: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = BlockstoreConfig::default();
        assert_eq!(c.hash, HashCode::Sha2_256);
        assert_eq!(c.default_extension.as_str(), "data");
        assert_eq!(c.put_concurrency, 16);
        assert!(!c.verify_reads);
        assert_eq!(c.backend, BackendConfig::Memory);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(BlockstoreConfig::from_toml_str("").unwrap(), BlockstoreConfig::default());
    }

    #[test]
    fn parse_filesystem_config() {
        let c = BlockstoreConfig::from_toml_str(
            r#"
            hash = "blake3"
            default_extension = "ipld"
            put_concurrency = 4
            verify_reads = true

            [backend]
            kind = "filesystem"
            root = "/var/lib/blocks"
            "#,
        )
        .unwrap();
        assert_eq!(c.hash, HashCode::Blake3);
        assert_eq!(c.default_extension.as_str(), "ipld");
        assert_eq!(c.put_concurrency, 4);
        assert!(c.verify_reads);
        assert_eq!(
            c.backend,
            BackendConfig::Filesystem { root: PathBuf::from("/var/lib/blocks") }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(BlockstoreConfig::from_toml_str("default_extension = \"a/b\"").is_err());
        assert!(BlockstoreConfig::from_toml_str("hash = \"md5\"").is_err());
        assert!(BlockstoreConfig::from_toml_str("unknown = 1").is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let c = BlockstoreConfig::filesystem("/tmp/blocks");
        let text = c.to_toml_string().unwrap();
        assert_eq!(BlockstoreConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockstore.toml");
        std::fs::write(&path, "put_concurrency = 2\n").unwrap();
        assert_eq!(BlockstoreConfig::load(&path).unwrap().put_concurrency, 2);
        assert!(BlockstoreConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
