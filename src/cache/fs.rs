//! File-based artifact cache.
//!
//! Entries are stored as JSON files, one per key, under two directories:
//!
//! ```text
//! <root>/artifact/<sha256 of key>.json
//! <root>/blob/<sha256 of key>.json
//! ```
//!
//! The default root is platform-specific:
//! - Linux: `~/.cache/fleetscan/`
//! - macOS: `~/Library/Caches/fleetscan/`
//! - Windows: `%LOCALAPPDATA%\fleetscan\cache\`
//!
//! Writes go to a temporary file that is renamed into place, so readers in
//! other processes see either no entry or a complete one.
//!
//! # Example
//!
//! ```no_run
//! use fleetscan::cache::{ArtifactCache, BlobInfo, FsCache};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let cache = FsCache::new();
//! cache.put_blob("sha256:abc", &BlobInfo::new(vec![])).await?;
//! let blob = cache.get_blob("sha256:abc").await?;
//! assert!(blob.packages.is_empty());
//! # Ok(())
//! # }
//! ```

use super::{ArtifactCache, ArtifactInfo, BlobInfo};
use crate::error::CacheError;
use crate::platform::cache_dir;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

const ARTIFACT_BUCKET: &str = "artifact";
const BLOB_BUCKET: &str = "blob";

/// Distinguishes temporary files of concurrent writers within one process.
static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A file-based cache shared by every process pointing at the same root.
pub struct FsCache {
    dir: PathBuf,
}

impl FsCache {
    /// Creates a cache in the platform cache directory.
    pub fn new() -> Self {
        Self::with_dir(cache_dir())
    }

    /// Creates a cache rooted at `dir`.
    ///
    /// # Example
    ///
    /// ```
    /// use fleetscan::cache::FsCache;
    ///
    /// let cache = FsCache::with_dir("/tmp/fleetscan-cache");
    /// assert!(cache.dir().ends_with("fleetscan-cache"));
    /// ```
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filename of a key. Hashed rather than sanitized, so distinct keys
    /// never share a file.
    fn cache_path(&self, bucket: &str, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(bucket)
            .join(format!("{}.json", hex::encode(digest)))
    }

    async fn read<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<Option<T>, CacheError> {
        let path = self.cache_path(bucket, key);
        match fs::read(&path).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write<T: Serialize>(&self, bucket: &str, key: &str, value: &T) -> Result<(), CacheError> {
        let path = self.cache_path(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec(value)?;
        let tmp = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, content).await?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

impl Default for FsCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactCache for FsCache {
    async fn put_artifact(&self, key: &str, info: &ArtifactInfo) -> Result<(), CacheError> {
        self.write(ARTIFACT_BUCKET, key, info).await
    }

    async fn put_blob(&self, key: &str, info: &BlobInfo) -> Result<(), CacheError> {
        self.write(BLOB_BUCKET, key, info).await
    }

    async fn get_artifact(&self, key: &str) -> Result<ArtifactInfo, CacheError> {
        self.read(ARTIFACT_BUCKET, key)
            .await?
            .ok_or_else(|| CacheError::artifact_miss(key))
    }

    async fn get_blob(&self, key: &str) -> Result<BlobInfo, CacheError> {
        self.read(BLOB_BUCKET, key)
            .await?
            .ok_or_else(|| CacheError::blob_miss(key))
    }

    /// Removes every JSON entry. Unrelated files under the root are left alone.
    async fn clear(&self) -> Result<(), CacheError> {
        for bucket in [ARTIFACT_BUCKET, BLOB_BUCKET] {
            let dir = self.dir.join(bucket);
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    let _ = fs::remove_file(path).await;
                }
            }
        }
        Ok(())
    }
}
