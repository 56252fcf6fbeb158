use super::{ArtifactCache, ArtifactInfo, BlobInfo};
use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process cache. Each map is guarded by its own lock.
#[derive(Debug, Default)]
pub struct MemoryCache {
    artifacts: RwLock<HashMap<String, ArtifactInfo>>,
    blobs: RwLock<HashMap<String, BlobInfo>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl ArtifactCache for MemoryCache {
    async fn put_artifact(&self, key: &str, info: &ArtifactInfo) -> Result<(), CacheError> {
        self.artifacts
            .write()
            .await
            .insert(key.to_string(), info.clone());
        Ok(())
    }

    async fn put_blob(&self, key: &str, info: &BlobInfo) -> Result<(), CacheError> {
        self.blobs.write().await.insert(key.to_string(), info.clone());
        Ok(())
    }

    async fn get_artifact(&self, key: &str) -> Result<ArtifactInfo, CacheError> {
        self.artifacts
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::artifact_miss(key))
    }

    async fn get_blob(&self, key: &str) -> Result<BlobInfo, CacheError> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::blob_miss(key))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.artifacts.write().await.clear();
        self.blobs.write().await.clear();
        Ok(())
    }
}
