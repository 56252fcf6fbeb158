use super::ArtifactReference;
use crate::cache::{content_key, ArtifactCache, ArtifactInfo, BlobInfo, BLOB_SCHEMA_VERSION};
use crate::model::{Artifact, ArtifactId, ArtifactKind, OsIdentity, Package, Repository};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Resolves an artifact to cache coordinates, populating the cache as needed.
#[async_trait]
pub trait Inspector: Send + Sync {
    async fn inspect(&self, artifact: &Artifact) -> Result<ArtifactReference>;
}

/// One layer of a pre-extracted inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_packages: Vec<String>,
}

impl From<Layer> for BlobInfo {
    fn from(layer: Layer) -> Self {
        BlobInfo {
            schema_version: BLOB_SCHEMA_VERSION,
            digest: layer.digest,
            os: layer.os,
            repository: layer.repository,
            packages: layer.packages,
            removed_packages: layer.removed_packages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub artifact: Artifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

/// Package inventories produced by the analysis layer, one per artifact.
///
/// ```json
/// {
///   "artifacts": [
///     {
///       "artifact": { "id": "debian:11", "type": "container_image", "image": "debian:11" },
///       "layers": [
///         { "os": { "family": "debian", "name": "11.7" },
///           "packages": [{ "name": "openssl", "version": "1.1.1k-1" }] }
///       ]
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub artifacts: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inventory {}", path.display()))
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.iter().map(|e| e.artifact.clone()).collect()
    }
}

/// Inspector over pre-extracted inventories.
///
/// Each layer is content-addressed, and only the blobs the cache reports
/// missing are uploaded, so re-inspecting an artifact costs one round trip.
pub struct InventoryInspector {
    cache: Arc<dyn ArtifactCache>,
    entries: HashMap<ArtifactId, InventoryEntry>,
}

impl InventoryInspector {
    pub fn new(cache: Arc<dyn ArtifactCache>, inventory: Inventory) -> Self {
        let entries = inventory
            .artifacts
            .into_iter()
            .map(|e| (e.artifact.id.clone(), e))
            .collect();
        Self { cache, entries }
    }

    /// Entry for `artifact`, falling back to its image for cluster resources.
    fn entry(&self, artifact: &Artifact) -> Option<&InventoryEntry> {
        self.entries.get(&artifact.id).or_else(|| match &artifact.kind {
            ArtifactKind::ClusterResource { image, .. } => {
                self.entries.get(&ArtifactId::from(image.as_str()))
            }
            _ => None,
        })
    }
}

#[async_trait]
impl Inspector for InventoryInspector {
    async fn inspect(&self, artifact: &Artifact) -> Result<ArtifactReference> {
        let entry = self
            .entry(artifact)
            .with_context(|| format!("no inventory for artifact {}", artifact.id))?;

        let blobs: Vec<BlobInfo> = entry.layers.iter().cloned().map(BlobInfo::from).collect();
        let blob_keys = blobs
            .iter()
            .map(content_key)
            .collect::<Result<Vec<_>, _>>()?;

        let info = ArtifactInfo {
            architecture: entry.architecture.clone(),
            ..ArtifactInfo::new()
        };
        let artifact_key = content_key(&(&info, &blob_keys))?;

        let missing = self.cache.missing_blobs(&artifact_key, &blob_keys).await?;
        debug!(
            artifact = %artifact.id,
            missing_artifact = missing.missing_artifact,
            missing_blobs = missing.missing_blob_ids.len(),
            "Inspected artifact"
        );

        for (key, blob) in blob_keys.iter().zip(&blobs) {
            if missing.missing_blob_ids.contains(key) {
                self.cache
                    .put_blob(key, blob)
                    .await
                    .with_context(|| format!("failed to store blob {}", key))?;
            }
        }
        if missing.missing_artifact {
            self.cache
                .put_artifact(&artifact_key, &info)
                .await
                .with_context(|| format!("failed to store artifact {}", artifact_key))?;
        }

        Ok(ArtifactReference {
            name: artifact.id.to_string(),
            artifact_key,
            blob_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn inventory() -> Inventory {
        Inventory {
            artifacts: vec![InventoryEntry {
                artifact: Artifact::image("debian:11"),
                architecture: Some("amd64".to_string()),
                layers: vec![Layer {
                    os: Some(OsIdentity::new("debian", "11.7")),
                    packages: vec![Package::new("openssl", "1.1.1k-1")],
                    ..Default::default()
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_inspect_populates_cache() {
        let cache = Arc::new(MemoryCache::new());
        let inspector = InventoryInspector::new(cache.clone(), inventory());

        let reference = inspector.inspect(&Artifact::image("debian:11")).await.unwrap();
        assert_eq!(reference.name, "debian:11");
        assert_eq!(reference.blob_keys.len(), 1);

        let blob = cache.get_blob(&reference.blob_keys[0]).await.unwrap();
        assert_eq!(blob.packages[0].name, "openssl");
        assert!(cache.get_artifact(&reference.artifact_key).await.is_ok());
    }

    #[tokio::test]
    async fn test_inspect_is_deterministic() {
        let cache = Arc::new(MemoryCache::new());
        let inspector = InventoryInspector::new(cache.clone(), inventory());

        let first = inspector.inspect(&Artifact::image("debian:11")).await.unwrap();
        let second = inspector.inspect(&Artifact::image("debian:11")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.blob_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_artifact() {
        let inspector = InventoryInspector::new(Arc::new(MemoryCache::new()), inventory());
        let err = inspector.inspect(&Artifact::image("ubuntu:22.04")).await.unwrap_err();
        assert!(err.to_string().contains("no inventory"));
    }

    #[tokio::test]
    async fn test_cluster_resource_uses_image_inventory() {
        let cache = Arc::new(MemoryCache::new());
        let inspector = InventoryInspector::new(cache.clone(), inventory());

        let workload = Artifact::cluster_resource("payments", "Deployment", "api", "debian:11");
        let reference = inspector.inspect(&workload).await.unwrap();
        assert_eq!(reference.name, "payments/Deployment/api@debian:11");

        let by_image = inspector.inspect(&Artifact::image("debian:11")).await.unwrap();
        assert_eq!(reference.artifact_key, by_image.artifact_key);
        assert_eq!(reference.blob_keys, by_image.blob_keys);

        let unknown = Artifact::cluster_resource("payments", "Deployment", "api", "ubuntu:22.04");
        assert!(inspector.inspect(&unknown).await.is_err());
    }

    #[test]
    fn test_inventory_json() {
        let json = r#"{"artifacts":[{"artifact":{"id":"debian:11","type":"container_image","image":"debian:11"},
            "layers":[{"os":{"family":"debian","name":"11.7"},"packages":[{"name":"openssl","version":"1.1.1k-1"}]}]}]}"#;
        let inventory: Inventory = serde_json::from_str(json).unwrap();

        let mut expected = self::inventory();
        expected.artifacts[0].architecture = None;
        assert_eq!(inventory, expected);
        assert_eq!(inventory.artifacts(), vec![Artifact::image("debian:11")]);
    }
}
