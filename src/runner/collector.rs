use crate::model::{ArtifactId, ArtifactResult, Report};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::warn;

/// Order-independent sink for per-artifact results.
///
/// Workers never share it; they send results over a channel and the
/// collector is the only owner of the map.
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: BTreeMap<ArtifactId, ArtifactResult>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a result. The first result for an artifact is kept.
    pub fn insert(&mut self, result: ArtifactResult) -> bool {
        let id = result.artifact.id.clone();
        if self.results.contains_key(&id) {
            warn!(artifact = %id, "Dropping duplicate result");
            return false;
        }
        self.results.insert(id, result);
        true
    }

    /// Receives until every sender has been dropped.
    pub async fn drain(mut self, mut rx: mpsc::Receiver<ArtifactResult>) -> Self {
        while let Some(result) = rx.recv().await {
            self.insert(result);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_report(self, context: impl Into<String>) -> Report {
        Report::new(context, self.results)
    }
}
