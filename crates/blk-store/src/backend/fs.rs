use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use super::{Backend, BlockPath};
use crate::error::{StoreError, StoreResult};

/// Temporary files are hidden; encoded block names never start with a dot.
const TMP_PREFIX: char = '.';

/// Directory-tree backend: `{root}/{dir}/{file}`.
///
/// Writes go to a uniquely named temporary file in the target directory,
/// are renamed into place after `fsync`, and the directory is synced, so
/// readers only ever observe complete blocks and a written block survives a
/// crash. Each write runs as one blocking task: dropping the caller's future
/// does not interrupt it halfway.
#[derive(Clone, Debug)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &BlockPath) -> PathBuf {
        self.root.join(&path.dir).join(&path.file)
    }
}

#[async_trait]
impl Backend for FsBackend {
    async fn write(&self, path: &BlockPath, data: Bytes) -> StoreResult<()> {
        let target = self.full_path(path);
        let tmp = target.with_file_name(format!(
            "{TMP_PREFIX}{}.{}",
            path.file,
            uuid::Uuid::now_v7().simple()
        ));
        let len = data.len();

        // Runs to completion even if this future is dropped, so a cancelled
        // put never strands a temporary file.
        tokio::task::spawn_blocking(move || persist(&tmp, &target, &data))
            .await
            .map_err(|e| StoreError::Backend(format!("block write aborted: {e}")))??;
        debug!(%path, bytes = len, "block file written");
        Ok(())
    }

    async fn read(&self, path: &BlockPath) -> StoreResult<Option<Bytes>> {
        match fs::read(self.full_path(path)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &BlockPath) -> StoreResult<bool> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }

    async fn remove(&self, path: &BlockPath) -> StoreResult<()> {
        match fs::remove_file(self.full_path(path)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn ensure_dir(&self, dir: &str) -> StoreResult<()> {
        // create_dir_all tolerates another task creating the same directory.
        fs::create_dir_all(self.root.join(dir)).await?;
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<BlockPath>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk(&root))
            .await
            .map_err(|e| StoreError::Backend(format!("directory walk aborted: {e}")))?
    }
}

/// Write `data` to `tmp`, fsync it, rename it over `target`, then fsync the
/// directory so the new name survives a crash. `tmp` is removed on failure.
fn persist(tmp: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let result = write_then_rename(tmp, target, data);
    if result.is_err() {
        let _ = std::fs::remove_file(tmp);
    }
    result
}

fn write_then_rename(tmp: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = std::fs::File::create(tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(tmp, target)?;
    sync_parent(target)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) => std::fs::File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn walk(root: &Path) -> StoreResult<Vec<BlockPath>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
        let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file = entry.file_name().to_str();
        let dir = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .and_then(|d| d.to_str());
        match (dir, file) {
            (Some(_), Some(file)) if file.starts_with(TMP_PREFIX) => {}
            (Some(dir), Some(file)) => paths.push(BlockPath::new(dir, file)),
            _ => debug!(path = %entry.path().display(), "skipping non-UTF-8 entry"),
        }
    }
    paths.sort();
    Ok(paths)
}
