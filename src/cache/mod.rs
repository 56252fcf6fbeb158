//! Content-addressed artifact cache shared by local and remote scanners.
//!
//! Keys are content identities (`sha256:<hex>`), so an entry never changes
//! once written. Two writers storing the same key store the same value,
//! which makes every `put_*` idempotent and leaves last-writer-wins safe.
//! Implementations only guarantee per-key atomicity.
//!
//! | Cache | Backing | Shared across |
//! |-------|---------|---------------|
//! | [`MemoryCache`] | `RwLock<HashMap>` | tasks in one process |
//! | [`FsCache`] | one JSON file per key | processes on one host |
//! | [`RemoteCache`](crate::rpc::RemoteCache) | scan server | hosts |

mod fs;
mod memory;

pub use fs::FsCache;
pub use memory::MemoryCache;

use crate::error::CacheError;
use crate::model::{OsIdentity, Package, Repository};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bumped whenever [`BlobInfo`] changes shape; older entries count as missing.
pub const BLOB_SCHEMA_VERSION: u32 = 2;
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Metadata extracted from one layer or filesystem snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub packages: Vec<Package>,
    /// Names of packages this layer removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_packages: Vec<String>,
}

impl BlobInfo {
    pub fn new(packages: Vec<Package>) -> Self {
        Self {
            schema_version: BLOB_SCHEMA_VERSION,
            digest: None,
            os: None,
            repository: None,
            packages,
            removed_packages: Vec::new(),
        }
    }

    pub fn with_os(mut self, os: OsIdentity) -> Self {
        self.os = Some(os);
        self
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_removed(mut self, names: Vec<String>) -> Self {
        self.removed_packages = names;
        self
    }
}

/// Artifact-level metadata (image config or filesystem root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

impl ArtifactInfo {
    pub fn new() -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            ..Default::default()
        }
    }
}

/// Result of a pre-flight check for what a client still has to upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingBlobs {
    pub missing_artifact: bool,
    pub missing_blob_ids: Vec<String>,
}

/// Key-value store from content identity to extracted metadata.
#[async_trait]
pub trait ArtifactCache: Send + Sync {
    async fn put_artifact(&self, key: &str, info: &ArtifactInfo) -> Result<(), CacheError>;

    async fn put_blob(&self, key: &str, info: &BlobInfo) -> Result<(), CacheError>;

    /// # Errors
    ///
    /// [`CacheError::Miss`] when the key is absent.
    async fn get_artifact(&self, key: &str) -> Result<ArtifactInfo, CacheError>;

    /// # Errors
    ///
    /// [`CacheError::Miss`] when the key is absent.
    async fn get_blob(&self, key: &str) -> Result<BlobInfo, CacheError>;

    /// Reports which of the given keys are absent or written with an outdated schema.
    async fn missing_blobs(
        &self,
        artifact_key: &str,
        blob_keys: &[String],
    ) -> Result<MissingBlobs, CacheError> {
        let missing_artifact = match self.get_artifact(artifact_key).await {
            Ok(info) => info.schema_version != ARTIFACT_SCHEMA_VERSION,
            Err(e) if e.is_miss() => true,
            Err(e) => return Err(e),
        };

        let mut missing_blob_ids = Vec::new();
        for key in blob_keys {
            let missing = match self.get_blob(key).await {
                Ok(info) => info.schema_version != BLOB_SCHEMA_VERSION,
                Err(e) if e.is_miss() => true,
                Err(e) => return Err(e),
            };
            if missing {
                missing_blob_ids.push(key.clone());
            }
        }

        Ok(MissingBlobs {
            missing_artifact,
            missing_blob_ids,
        })
    }

    async fn clear(&self) -> Result<(), CacheError>;
}

/// Content identity of a serializable value: `sha256:<hex>` of its JSON form.
pub fn content_key<T: Serialize>(value: &T) -> Result<String, CacheError> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_is_stable() {
        let blob = BlobInfo::new(vec![Package::new("zlib", "1.2.13-r0")])
            .with_os(OsIdentity::new("alpine", "3.19.1"));
        let a = content_key(&blob).unwrap();
        let b = content_key(&blob.clone()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("sha256:"));
        assert_eq!(a.len(), "sha256:".len() + 64);

        let other = BlobInfo::new(vec![Package::new("zlib", "1.2.13-r1")]);
        assert_ne!(content_key(&other).unwrap(), a);
    }

    #[tokio::test]
    async fn test_missing_blobs_reports_outdated_schema() {
        let cache = MemoryCache::new();
        let mut stale = BlobInfo::new(vec![]);
        stale.schema_version = 1;

        cache.put_artifact("sha256:art", &ArtifactInfo::new()).await.unwrap();
        cache.put_blob("sha256:fresh", &BlobInfo::new(vec![])).await.unwrap();
        cache.put_blob("sha256:stale", &stale).await.unwrap();

        let missing = cache
            .missing_blobs(
                "sha256:art",
                &[
                    "sha256:fresh".to_string(),
                    "sha256:stale".to_string(),
                    "sha256:absent".to_string(),
                ],
            )
            .await
            .unwrap();

        assert!(!missing.missing_artifact);
        assert_eq!(missing.missing_blob_ids, vec!["sha256:stale", "sha256:absent"]);
    }
}
