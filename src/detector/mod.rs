//! OS package vulnerability detection.
//!
//! The [`Detector`] resolves a [`Driver`] for an OS family from a
//! [`DriverRegistry`], derives the end-of-support flag, and runs matching.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fleetscan::detector::{Detector, DriverRegistry, MemoryAdvisoryStore};
//! use fleetscan::Package;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryAdvisoryStore::new());
//! let detector = Detector::new(DriverRegistry::with_advisories(store).build());
//!
//! let detection = detector
//!     .detect("debian:11", "debian", "11", None, chrono::Utc::now(), &[Package::new("openssl", "1.1.1k-1")])
//!     .await?;
//! println!("{} findings, eosl={}", detection.vulnerabilities.len(), detection.eosl);
//! # Ok(())
//! # }
//! ```

mod advisory;
pub mod eol;
mod family;
mod registry;
pub mod version;

pub use advisory::{Advisory, AdvisoryDriver, AdvisorySnapshot, AdvisoryStore, MemoryAdvisoryStore};
pub use eol::SupportWindow;
pub use family::OsFamily;
pub use registry::{DriverRegistry, DriverRegistryBuilder};

use crate::error::DetectError;
use crate::model::{DetectedVulnerability, Package, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-family vulnerability matching and release-support classification.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Whether `os_name` of `family` still receives vendor updates at `at`.
    ///
    /// Must be total: unknown or malformed versions return `false`.
    fn is_supported_version(&self, family: &str, os_name: &str, at: DateTime<Utc>) -> bool;

    /// Matches `packages` against the family's vulnerability data.
    ///
    /// Must be deterministic for a fixed data snapshot and independent of
    /// the order of `packages`.
    async fn detect(
        &self,
        os_name: &str,
        repo: Option<&Repository>,
        packages: &[Package],
    ) -> anyhow::Result<Vec<DetectedVulnerability>>;
}

/// Output of one successful dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub vulnerabilities: Vec<DetectedVulnerability>,
    /// Informational: the release is past its support window.
    pub eosl: bool,
}

/// Dispatch facade over a read-only driver registry.
#[derive(Clone)]
pub struct Detector {
    registry: Arc<DriverRegistry>,
}

impl Detector {
    pub fn new(registry: DriverRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Detects vulnerabilities in an OS package set.
    ///
    /// An unsupported release only sets [`Detection::eosl`]; matching still
    /// runs so that end-of-life targets get best-effort results.
    ///
    /// # Errors
    ///
    /// [`DetectError::UnsupportedOs`] when no driver is registered for
    /// `family`, [`DetectError::DetectionFailure`] when the driver fails.
    pub async fn detect(
        &self,
        target: &str,
        family: &str,
        os_name: &str,
        repo: Option<&Repository>,
        scan_time: DateTime<Utc>,
        packages: &[Package],
    ) -> Result<Detection, DetectError> {
        let driver = self.driver(family)?;

        let eosl = !driver.is_supported_version(family, os_name, scan_time);
        if eosl {
            warn!(artifact = %target, family = %family, os = %os_name, "OS release is no longer supported by the vendor");
        }

        let vulnerabilities = driver
            .detect(os_name, repo, packages)
            .await
            .map_err(|source| DetectError::DetectionFailure {
                family: family.to_string(),
                os_name: os_name.to_string(),
                source,
            })?;

        debug!(
            artifact = %target,
            family = %family,
            packages = packages.len(),
            vulnerabilities = vulnerabilities.len(),
            "Detected OS package vulnerabilities"
        );

        Ok(Detection {
            vulnerabilities,
            eosl,
        })
    }

    fn driver(&self, family: &str) -> Result<Arc<dyn Driver>, DetectError> {
        if let Some(driver) = self.registry.get(family) {
            return Ok(driver);
        }

        let reason = if family.parse::<OsFamily>().is_ok() {
            "known family without a registered driver"
        } else {
            "unrecognized family"
        };
        warn!(family = %family, reason, "Unsupported OS");

        Err(DetectError::UnsupportedOs {
            family: family.to_string(),
        })
    }
}
