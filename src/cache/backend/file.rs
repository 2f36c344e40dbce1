//! File backend
//!
//! One JSON file per hashed key inside a cache directory. Writes go to a
//! temporary file that is renamed over the target, so readers never observe
//! a half-written entry. Concurrent writers to one key are last-writer-wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::cache::{is_sentinel, CacheEntry};
use crate::error::Result;

const ENTRY_EXTENSION: &str = "json";

// == File Backend ==
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Opens (creating if needed) the cache directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "File cache backend ready");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    pub async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        read_entry(&self.path_for(key)).await
    }

    pub async fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let bytes = serde_json::to_vec(entry)?;
        let target = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{:016x}.tmp", key, fastrand::u64(..)));

        fs::write(&tmp, &bytes).await?;
        if let Err(err) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Re-reads the entry and deletes it only if it is still expired.
    pub async fn remove_expired(&self, key: &str, now_ms: u64) -> Result<bool> {
        match self.load(key).await? {
            Some(entry) if entry.is_expired_at(now_ms) => self.remove(key).await,
            _ => Ok(false),
        }
    }

    pub async fn clear(&self) -> Result<u64> {
        let mut removed = 0;
        for path in self.entry_paths().await? {
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.entry_paths().await?.len())
    }

    pub async fn purge_expired(&self, now_ms: u64) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_paths().await? {
            match read_entry(&path).await {
                Ok(Some(entry)) if entry.is_expired_at(now_ms) => {
                    match fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(err) if err.kind() == ErrorKind::NotFound => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Skipping unreadable cache file");
                }
            }
        }
        Ok(removed)
    }

    /// Paths of every user entry file currently in the directory.
    async fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let is_entry = path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION);
            let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
            if is_entry && !is_sentinel(stem) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

async fn read_entry(path: &Path) -> Result<Option<CacheEntry>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
