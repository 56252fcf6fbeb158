//! Artifact scanning: turning cached artifact metadata into findings.
//!
//! An [`Inspector`] resolves an [`Artifact`](crate::Artifact) to an
//! [`ArtifactReference`] and makes sure its blobs are cached. A
//! [`ScanDriver`] then runs detection for that reference:
//!
//! | Driver | Where detection runs |
//! |--------|----------------------|
//! | [`LocalScanner`] | in-process, against any [`ArtifactCache`](crate::cache::ArtifactCache) |
//! | [`RemoteScanner`](crate::rpc::RemoteScanner) | on a scan server sharing the cache |

mod applier;
mod inspect;
mod local;

pub use applier::{apply_layers, ArtifactDetail};
pub use inspect::{Inspector, Inventory, InventoryEntry, InventoryInspector, Layer};
pub use local::LocalScanner;

use crate::error::ScanFailure;
use crate::model::ScanResults;
use crate::options::ScanOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cache coordinates of an inspected artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    /// Human-readable target name, e.g. the image reference.
    pub name: String,
    pub artifact_key: String,
    /// Layer blobs in application order.
    pub blob_keys: Vec<String>,
}

/// One detection request against cached metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub target: String,
    pub artifact_key: String,
    pub blob_keys: Vec<String>,
    #[serde(default)]
    pub options: ScanOptions,
}

impl ScanRequest {
    pub fn new(reference: &ArtifactReference, options: ScanOptions) -> Self {
        Self {
            target: reference.name.clone(),
            artifact_key: reference.artifact_key.clone(),
            blob_keys: reference.blob_keys.clone(),
            options,
        }
    }
}

/// Runs detection for an artifact whose metadata is already cached.
#[async_trait]
pub trait ScanDriver: Send + Sync {
    /// # Errors
    ///
    /// A cache miss, unsupported OS, detection failure, or transport error.
    /// The caller records these against the artifact.
    async fn scan(&self, request: &ScanRequest) -> Result<ScanResults, ScanFailure>;
}
