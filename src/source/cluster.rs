use super::ArtifactSource;
use crate::model::Artifact;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// A workload as reported by the cluster: its coordinate and container images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub namespace: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Boundary to the cluster API.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    fn cluster_name(&self) -> String;

    async fn list_workloads(&self, namespace: Option<&str>) -> Result<Vec<Workload>>;
}

/// A lister over a fixed workload list, e.g. one exported to JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticLister {
    pub cluster: String,
    #[serde(default)]
    pub workloads: Vec<Workload>,
}

#[async_trait]
impl ResourceLister for StaticLister {
    fn cluster_name(&self) -> String {
        self.cluster.clone()
    }

    async fn list_workloads(&self, namespace: Option<&str>) -> Result<Vec<Workload>> {
        Ok(self
            .workloads
            .iter()
            .filter(|w| namespace.map_or(true, |ns| w.namespace == ns))
            .cloned()
            .collect())
    }
}

/// Flattens cluster workloads into one artifact per (resource, image).
pub struct ClusterSource<L> {
    lister: L,
    namespace: Option<String>,
}

impl<L: ResourceLister> ClusterSource<L> {
    pub fn new(lister: L) -> Self {
        Self {
            lister,
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[async_trait]
impl<L: ResourceLister> ArtifactSource for ClusterSource<L> {
    fn context(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", self.lister.cluster_name(), ns),
            None => self.lister.cluster_name(),
        }
    }

    async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
        let workloads = self
            .lister
            .list_workloads(self.namespace.as_deref())
            .await
            .with_context(|| format!("failed to list workloads in {}", self.context()))?;

        let mut artifacts = Vec::new();
        for workload in workloads {
            let images: BTreeSet<&String> = workload.images.iter().collect();
            if images.is_empty() {
                debug!(namespace = %workload.namespace, kind = %workload.kind, name = %workload.name, "Workload has no images");
            }
            for image in images {
                artifacts.push(Artifact::cluster_resource(
                    &workload.namespace,
                    &workload.kind,
                    &workload.name,
                    image,
                ));
            }
        }
        Ok(artifacts)
    }
}
