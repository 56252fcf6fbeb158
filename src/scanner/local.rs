use super::{apply_layers, ScanDriver, ScanRequest};
use crate::cache::ArtifactCache;
use crate::detector::Detector;
use crate::error::ScanFailure;
use crate::model::ScanResults;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs detection in-process against cached artifact metadata.
///
/// Holds no per-request state; any number of requests may run concurrently
/// against one instance.
#[derive(Clone)]
pub struct LocalScanner {
    cache: Arc<dyn ArtifactCache>,
    detector: Detector,
    scan_time: Option<DateTime<Utc>>,
}

impl LocalScanner {
    pub fn new(cache: Arc<dyn ArtifactCache>, detector: Detector) -> Self {
        Self {
            cache,
            detector,
            scan_time: None,
        }
    }

    /// Pins the time used for support-window checks instead of the wall clock.
    pub fn with_scan_time(mut self, at: DateTime<Utc>) -> Self {
        self.scan_time = Some(at);
        self
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}

#[async_trait]
impl ScanDriver for LocalScanner {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanResults, ScanFailure> {
        let options = &request.options;
        let info = self.cache.get_artifact(&request.artifact_key).await?;

        if let (Some(wanted), Some(arch)) = (&options.platform, &info.architecture) {
            if !wanted.split('/').nth(1).map(|a| a == arch).unwrap_or(true) {
                warn!(target_name = %request.target, platform = %wanted, architecture = %arch, "Artifact architecture does not match requested platform");
            }
        }

        let mut blobs = Vec::with_capacity(request.blob_keys.len());
        for key in &request.blob_keys {
            blobs.push(self.cache.get_blob(key).await?);
        }

        let detail = apply_layers(
            request.blob_keys.iter().map(String::as_str).zip(blobs.iter()),
            options.scan_removed_packages,
        );

        let mut results = ScanResults {
            os: detail.os.clone(),
            vulnerabilities: Vec::new(),
            packages: if options.list_all_packages {
                detail.packages.clone()
            } else {
                Vec::new()
            },
        };

        if !options.scans_os_packages() {
            return Ok(results);
        }

        let Some(os) = detail.os else {
            debug!(target_name = %request.target, "OS is not detected, skipping OS package detection");
            return Ok(results);
        };

        let detection = self
            .detector
            .detect(
                &request.target,
                &os.family,
                &os.name,
                detail.repository.as_ref(),
                self.scan_time.unwrap_or_else(Utc::now),
                &detail.packages,
            )
            .await?;

        results.vulnerabilities = detection.vulnerabilities;
        if let Some(os) = results.os.as_mut() {
            os.eosl = detection.eosl;
        }
        Ok(results)
    }
}
