//! Artifact source adapters.
//!
//! A source enumerates the artifacts of one environment. It yields
//! references only; package data is produced later by an
//! [`Inspector`](crate::scanner::Inspector).

mod cluster;

pub use cluster::{ClusterSource, ResourceLister, StaticLister, Workload};

use crate::model::Artifact;
use crate::scanner::Inventory;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Enumerates scannable artifacts for an environment.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Name of the environment, recorded on the report.
    fn context(&self) -> String;

    /// Lists the artifacts to scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be enumerated. The
    /// orchestrator aborts the run in that case.
    async fn list_artifacts(&self) -> Result<Vec<Artifact>>;
}

/// A fixed list of artifacts.
#[derive(Debug, Clone)]
pub struct StaticSource {
    context: String,
    artifacts: Vec<Artifact>,
}

impl StaticSource {
    pub fn new(context: impl Into<String>, artifacts: Vec<Artifact>) -> Self {
        Self {
            context: context.into(),
            artifacts,
        }
    }

    /// Uses every artifact listed in an inventory file.
    pub fn from_inventory(path: &Path) -> Result<Self> {
        let inventory = Inventory::load(path)?;
        Ok(Self::new(path.display().to_string(), inventory.artifacts()))
    }
}

#[async_trait]
impl ArtifactSource for StaticSource {
    fn context(&self) -> String {
        self.context.clone()
    }

    async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
        Ok(self.artifacts.clone())
    }
}
